use std::sync::Arc;
use std::time::{Duration, Instant};
use tickload_client::{is_success, ClientConfig, TicketClient};
use tickload_common::{RampStage, Result};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::stats::StatsAccumulator;

/// Upper bound on concurrent workers in a single stage.
pub const MAX_WORKERS: u32 = 50;

/// Outcome of one finished stage.
#[derive(Debug, Clone)]
pub struct StageRun {
    pub stage: RampStage,
    pub workers: u32,
    /// Wall time from launch until the last worker joined; may exceed the
    /// stage duration by the last in-flight request.
    pub elapsed: Duration,
    pub stats: StatsAccumulator,
}

/// Number of workers for `rate`: one per requested request/sec, at least one,
/// never more than [`MAX_WORKERS`].
pub fn worker_count(rate: u32) -> u32 {
    rate.clamp(1, MAX_WORKERS)
}

/// Gap each worker aims for between request starts. `None` for rate 0 (unpaced).
///
/// Every worker paces at the full rate rather than `rate / workers`, so the
/// pool as a whole offers up to `rate * worker_count(rate)` requests/sec.
pub fn pacing_interval(rate: u32) -> Option<Duration> {
    (rate > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(rate)))
}

/// Sleep owed after a request that took `latency`. Slow requests eat into the
/// gap; the result is `None` once nothing is left.
pub fn pacing_sleep(interval: Option<Duration>, latency: Duration) -> Option<Duration> {
    interval?.checked_sub(latency).filter(|d| !d.is_zero())
}

/// Run one stage to completion: launch the worker pool against a fresh client,
/// wait for every worker to finish its last request, and return the stats.
#[instrument(
    name = "stage",
    skip_all,
    fields(rate = stage.rate, duration_secs = stage.duration_secs)
)]
pub async fn run_stage(client_config: &ClientConfig, stage: RampStage) -> Result<StageRun> {
    let client = TicketClient::new(client_config.clone())?;
    let stats = Arc::new(Mutex::new(StatsAccumulator::new()));

    let started = Instant::now();
    let stop = started + stage.duration();
    let workers = worker_count(stage.rate);
    let interval = pacing_interval(stage.rate);

    if stage.rate > MAX_WORKERS {
        warn!(requested = stage.rate, workers, "worker pool capped");
    }
    info!(workers, "stage started");

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        pool.spawn(worker(client.clone(), Arc::clone(&stats), stop, interval));
    }
    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "worker task failed");
        }
    }
    drop(client);

    let elapsed = started.elapsed();
    let stats = match Arc::try_unwrap(stats) {
        Ok(stats) => stats.into_inner(),
        Err(shared) => shared.lock().await.clone(),
    };

    info!(
        total = stats.total(),
        errors = stats.errors(),
        elapsed_ms = elapsed.as_millis() as u64,
        "stage finished"
    );

    Ok(StageRun { stage, workers, elapsed, stats })
}

/// Issue requests until `stop`. The deadline is only checked between requests.
async fn worker(
    client: TicketClient,
    stats: Arc<Mutex<StatsAccumulator>>,
    stop: Instant,
    interval: Option<Duration>,
) {
    while Instant::now() < stop {
        let request_start = Instant::now();
        let outcome = client.create_ticket().await;
        let latency = request_start.elapsed();

        if let Err(e) = &outcome {
            debug!(error = %e, latency_ms = latency.as_millis() as u64, "request failed");
        }
        stats.lock().await.record(is_success(&outcome), latency);

        if let Some(pause) = pacing_sleep(interval, latency) {
            tokio::time::sleep(pause).await;
        }
    }
}
