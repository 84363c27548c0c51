use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://eutonafila.com.br";
pub const DEFAULT_SHOP_SLUG: &str = "mineiro";
pub const DEFAULT_SERVICE_ID: u64 = 1;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Prefix of every generated `customerName`.
pub const CUSTOMER_NAME_PREFIX: &str = "LoadTest-";

/// Error types for tickload operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadTestError {
    #[error("Invalid ramp stage {0:?}: expected RATExSECONDS with a non-zero duration")]
    InvalidStage(String),

    #[error("Ramp profile must contain at least one stage")]
    EmptyRamp,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    HttpError(u16),
}

/// Result type for tickload operations
pub type Result<T> = std::result::Result<T, LoadTestError>;

/// JSON body of `POST /api/shops/{shop}/tickets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub service_id: u64,
    pub customer_name: String,
}

/// One time-boxed period of load at a fixed target rate.
///
/// A `rate` of 0 means workers fire back-to-back with no pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampStage {
    pub rate: u32,
    pub duration_secs: u64,
}

impl RampStage {
    pub fn new(rate: u32, duration_secs: u64) -> Result<Self> {
        if duration_secs == 0 {
            return Err(LoadTestError::InvalidStage(format!("{rate}x{duration_secs}")));
        }
        Ok(Self { rate, duration_secs })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl FromStr for RampStage {
    type Err = LoadTestError;

    /// Parse `RATExSECONDS`, e.g. `10x60`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LoadTestError::InvalidStage(s.to_string());
        let (rate, duration) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let rate = rate.trim().parse::<u32>().map_err(|_| invalid())?;
        let duration = duration.trim().parse::<u64>().map_err(|_| invalid())?;
        RampStage::new(rate, duration).map_err(|_| invalid())
    }
}

impl fmt::Display for RampStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rate, self.duration_secs)
    }
}

/// Ordered list of stages defining how offered load increases over the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RampStage>", into = "Vec<RampStage>")]
pub struct RampProfile(Vec<RampStage>);

impl RampProfile {
    pub fn new(stages: Vec<RampStage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(LoadTestError::EmptyRamp);
        }
        if let Some(bad) = stages.iter().find(|s| s.duration_secs == 0) {
            return Err(LoadTestError::InvalidStage(bad.to_string()));
        }
        Ok(Self(stages))
    }

    /// Parse a comma-separated list such as `2x30,5x60`.
    pub fn parse(s: &str) -> Result<Self> {
        let stages = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(RampStage::from_str)
            .collect::<Result<Vec<_>>>()?;
        Self::new(stages)
    }

    pub fn stages(&self) -> &[RampStage] {
        &self.0
    }

    pub fn total_duration(&self) -> Duration {
        self.0.iter().map(RampStage::duration).sum()
    }
}

impl Default for RampProfile {
    fn default() -> Self {
        Self(vec![
            RampStage { rate: 2, duration_secs: 30 },
            RampStage { rate: 5, duration_secs: 60 },
            RampStage { rate: 10, duration_secs: 60 },
            RampStage { rate: 20, duration_secs: 60 },
            RampStage { rate: 40, duration_secs: 60 },
        ])
    }
}

impl TryFrom<Vec<RampStage>> for RampProfile {
    type Error = LoadTestError;

    fn try_from(stages: Vec<RampStage>) -> Result<Self> {
        Self::new(stages)
    }
}

impl From<RampProfile> for Vec<RampStage> {
    fn from(profile: RampProfile) -> Self {
        profile.0
    }
}

impl fmt::Display for RampProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
