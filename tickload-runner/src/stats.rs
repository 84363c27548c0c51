use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Running tally of request outcomes.
///
/// After every `record`, `total == success + errors` and
/// `latencies().len() == success`. Only successful requests keep a latency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsAccumulator {
    total: u64,
    success: u64,
    errors: u64,
    latencies: Vec<Duration>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, success: bool, latency: Duration) {
        self.total += 1;
        if success {
            self.success += 1;
            self.latencies.push(latency);
        } else {
            self.errors += 1;
        }
    }

    /// Fold a finished accumulator into this one.
    pub fn merge(&mut self, other: StatsAccumulator) {
        self.total += other.total;
        self.success += other.success;
        self.errors += other.errors;
        self.latencies.extend(other.latencies);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn success(&self) -> u64 {
        self.success
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Latencies of successful requests, in insertion order (unsorted).
    pub fn latencies(&self) -> &[Duration] {
        &self.latencies
    }

    pub fn summary(&self) -> Summary {
        if self.latencies.is_empty() {
            return Summary {
                total: self.total,
                success: self.success,
                errors: self.errors,
                p50: None,
                p95: None,
                p99: None,
            };
        }

        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();

        Summary {
            total: self.total,
            success: self.success,
            errors: self.errors,
            p50: Some(percentile(&sorted, 0.50)),
            p95: Some(percentile(&sorted, 0.95)),
            p99: Some(percentile(&sorted, 0.99)),
        }
    }
}

/// Return the element of non-empty, ascending `sorted` at index `floor(p * n)`,
/// clamped to the last element.
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let idx = (p * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Read-only view of a [`StatsAccumulator`]. Percentiles are `None` when no
/// request succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    #[serde(rename = "p50_ms", serialize_with = "serialize_ms")]
    pub p50: Option<Duration>,
    #[serde(rename = "p95_ms", serialize_with = "serialize_ms")]
    pub p95: Option<Duration>,
    #[serde(rename = "p99_ms", serialize_with = "serialize_ms")]
    pub p99: Option<Duration>,
}

impl Summary {
    /// Fraction of requests that failed; 0 when nothing was sent.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.errors as f64 / self.total as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} success={} errors={} p50={} p95={} p99={}",
            self.total,
            self.success,
            self.errors,
            format_latency(self.p50),
            format_latency(self.p95),
            format_latency(self.p99),
        )
    }
}

fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(d) => format!("{:.1}ms", duration_ms(d)),
        None => "-".to_string(),
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

fn serialize_ms<S: Serializer>(
    latency: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match latency {
        Some(d) => serializer.serialize_some(&duration_ms(*d)),
        None => serializer.serialize_none(),
    }
}
