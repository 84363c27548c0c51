use tickload_common::LoadTestError;

#[test]
fn test_invalid_stage_display() {
    let err = LoadTestError::InvalidStage("5y60".to_string());
    assert_eq!(
        err.to_string(),
        "Invalid ramp stage \"5y60\": expected RATExSECONDS with a non-zero duration"
    );
}

#[test]
fn test_error_equality() {
    let err1 = LoadTestError::HttpError(500);
    let err2 = LoadTestError::HttpError(500);
    let err3 = LoadTestError::HttpError(503);

    assert_eq!(err1, err2);
    assert_ne!(err1, err3);
}

#[test]
fn test_network_error() {
    let err = LoadTestError::NetworkError("connection refused".to_string());
    assert_eq!(err.to_string(), "Network error: connection refused");
}

#[test]
fn test_http_error() {
    let err = LoadTestError::HttpError(429);
    assert_eq!(err.to_string(), "HTTP 429");
}

#[test]
fn test_timeout_and_empty_ramp() {
    assert_eq!(LoadTestError::Timeout.to_string(), "Request timed out");
    assert_eq!(
        LoadTestError::EmptyRamp.to_string(),
        "Ramp profile must contain at least one stage"
    );
}

#[test]
fn test_invalid_config() {
    let err = LoadTestError::InvalidConfig("timeout must be greater than zero".to_string());
    assert_eq!(err.to_string(), "Invalid configuration: timeout must be greater than zero");
}
