use axum::http::StatusCode;
use std::time::Duration;

/// Status returned for every ticket unless overridden.
pub const DEFAULT_STATUS: StatusCode = StatusCode::CREATED;

/// Artificial processing time applied before each response.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);
