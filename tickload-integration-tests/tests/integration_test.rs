use axum::http::StatusCode;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tickload_client::{ClientConfig, TicketClient};
use tickload_common::{LoadTestError, RampProfile, RampStage};
use tickload_runner::config::LoadConfig;
use tickload_runner::driver;
use tickload_runner::report::TextReporter;
use tickload_runner::stage::run_stage;
use tickload_stub::{AppState, Server, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

const SERVER_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Spawn a stub answering every ticket with `status` after `delay`.
async fn start_stub(status: StatusCode, delay: Duration) -> (SocketAddr, AppState) {
    let (ready_tx, ready_rx) = oneshot::channel();

    let server = Server::new(ServerConfig {
        address: "127.0.0.1:0".parse().unwrap(),
        status,
        delay,
    });
    let state = server.state();

    tokio::spawn(async move {
        server.run(ready_tx).await.expect("server failed");
    });

    let addr = timeout(SERVER_READY_TIMEOUT, ready_rx)
        .await
        .expect("server did not start within 60 seconds")
        .expect("server ready signal dropped");

    (addr, state)
}

/// Spawn a bare HTTP/1.1 keep-alive endpoint that sends the response body
/// `body_delay` after the headers. Returns its address and an accept counter.
async fn start_keep_alive_endpoint(body_delay: Duration) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_connection(socket, body_delay));
        }
    });

    (addr, accepts)
}

/// Answer requests on one connection until the client closes it.
async fn serve_connection(socket: TcpStream, body_delay: Duration) {
    const BODY: &[u8] = br#"{"id":1}"#;
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);
    let mut line = String::new();

    loop {
        // Request line, then headers up to the blank line.
        let mut content_length = 0;
        let mut in_headers = false;
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let header = line.trim_end();
            if in_headers && header.is_empty() {
                break;
            }
            in_headers = true;
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }
        let mut body = vec![0; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let head = format!(
            "HTTP/1.1 201 Created\r\n\
             content-type: application/json\r\n\
             content-length: {}\r\n\r\n",
            BODY.len()
        );
        if write.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        tokio::time::sleep(body_delay).await;
        if write.write_all(BODY).await.is_err() {
            return;
        }
    }
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("http://{addr}"), "mineiro")
}

#[tokio::test]
async fn test_client_against_stub() {
    let (addr, state) = start_stub(StatusCode::CREATED, Duration::ZERO).await;
    let client = TicketClient::new(client_config(addr)).unwrap();

    assert_eq!(client.create_ticket().await, Ok(reqwest::StatusCode::CREATED));
    assert_eq!(client.create_ticket().await, Ok(reqwest::StatusCode::CREATED));

    let stats = state.stats().await;
    assert_eq!(stats.received, 2);
    assert_eq!(stats.distinct_customers, 2);
}

#[tokio::test]
async fn test_client_reuses_connection_and_times_full_body() {
    let body_delay = Duration::from_millis(100);
    let (addr, accepts) = start_keep_alive_endpoint(body_delay).await;
    let client = TicketClient::new(client_config(addr)).unwrap();

    for _ in 0..5 {
        let start = Instant::now();
        assert_eq!(client.create_ticket().await, Ok(reqwest::StatusCode::CREATED));
        assert!(start.elapsed() >= body_delay);
        // Give the pool a moment to take the idle connection back.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_wrong_shop_path_is_error() {
    let (addr, _) = start_stub(StatusCode::OK, Duration::ZERO).await;
    let mut config = client_config(addr);
    config.shop_slug = "a/b".to_string();
    let client = TicketClient::new(config).unwrap();

    assert_eq!(client.create_ticket().await, Err(LoadTestError::HttpError(404)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stage_against_healthy_endpoint() {
    let (addr, _) = start_stub(StatusCode::OK, Duration::from_millis(10)).await;

    let run = run_stage(&client_config(addr), RampStage::new(2, 1).unwrap())
        .await
        .unwrap();
    let summary = run.stats.summary();

    assert_eq!(run.workers, 2);
    assert!((1..=4).contains(&summary.total), "total = {}", summary.total);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.success, summary.total);
    for p in [summary.p50, summary.p95, summary.p99] {
        let p = p.expect("percentile present");
        assert!(p >= Duration::from_millis(10), "{p:?} below stub delay");
        assert!(p < Duration::from_millis(500), "{p:?} far above stub delay");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stage_against_failing_endpoint() {
    let (addr, state) =
        start_stub(StatusCode::INTERNAL_SERVER_ERROR, Duration::from_millis(10)).await;

    let run = run_stage(&client_config(addr), RampStage::new(2, 1).unwrap())
        .await
        .unwrap();
    let summary = run.stats.summary();

    assert!(summary.total >= 1);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.errors, summary.total);
    assert_eq!(summary.p50, None);
    assert_eq!(state.stats().await.received, summary.total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unpaced_stage_fires_back_to_back() {
    let (addr, state) = start_stub(StatusCode::OK, Duration::ZERO).await;

    let run = run_stage(&client_config(addr), RampStage::new(0, 1).unwrap())
        .await
        .unwrap();

    assert_eq!(run.workers, 1);
    // A single paced worker at rate 1 would send exactly one request; unpaced it
    // keeps the connection busy for the whole second.
    assert!(run.stats.total() > 20, "only {} requests", run.stats.total());
    assert_eq!(state.stats().await.peak_in_flight, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_high_rate_caps_workers_at_fifty() {
    let (addr, state) = start_stub(StatusCode::OK, Duration::from_millis(200)).await;

    let run = run_stage(&client_config(addr), RampStage::new(200, 1).unwrap())
        .await
        .unwrap();

    assert_eq!(run.workers, 50);
    let stats = state.stats().await;
    assert!(stats.peak_in_flight <= 50, "peak in flight {}", stats.peak_in_flight);
    assert!(stats.peak_in_flight > 1);
    assert_eq!(stats.received, run.stats.total());
    assert_eq!(stats.distinct_customers, stats.received);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_request_completes_after_deadline() {
    // Each request outlives the whole stage; it must still be recorded.
    let (addr, _) = start_stub(StatusCode::OK, Duration::from_millis(1_500)).await;

    let run = run_stage(&client_config(addr), RampStage::new(1, 1).unwrap())
        .await
        .unwrap();

    assert_eq!(run.stats.total(), 1);
    assert_eq!(run.stats.success(), 1);
    assert!(run.elapsed >= Duration::from_millis(1_500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_endpoint_times_out_as_error() {
    let (addr, _) = start_stub(StatusCode::OK, Duration::from_secs(2)).await;
    let mut config = client_config(addr);
    config.timeout = Duration::from_millis(200);

    let run = run_stage(&config, RampStage::new(1, 1).unwrap()).await.unwrap();
    let summary = run.stats.summary();

    assert!(summary.total >= 1);
    assert_eq!(summary.errors, summary.total);
    assert_eq!(summary.p50, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_driver_runs_ramp_against_stub() {
    let (addr, state) = start_stub(StatusCode::CREATED, Duration::from_millis(5)).await;
    let config = LoadConfig {
        client: client_config(addr),
        ramp: RampProfile::parse("1x1,2x1").unwrap(),
        max_error_rate: Some(0.0),
    };

    let mut reporter = TextReporter::new(Vec::new());
    let report = driver::run(&config, &mut reporter).await.unwrap();

    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.overall.errors, 0);
    assert_eq!(
        report.overall.total,
        report.stages.iter().map(|s| s.summary.total).sum::<u64>()
    );
    assert_eq!(report.overall.total, state.stats().await.received);
    assert!(report.overall.p99.is_some());

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(text.starts_with("Stage: 1 rps for 1s\n"));
    assert!(text.contains("Stage: 2 rps for 1s\n"));
    assert!(text.lines().last().unwrap().starts_with("Overall: "));
}
