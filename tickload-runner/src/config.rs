use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tickload_client::ClientConfig;
use tickload_common::{
    LoadTestError, RampProfile, Result, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SERVICE_ID, DEFAULT_SHOP_SLUG,
};

/// Settings read from a JSON config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub shop_slug: Option<String>,
    pub service_id: Option<u64>,
    pub ramp: Option<RampProfile>,
    pub timeout_ms: Option<u64>,
    pub max_error_rate: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoadTestError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            LoadTestError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub shop_slug: Option<String>,
    pub service_id: Option<u64>,
    /// Comma-separated `RATExSECONDS` list.
    pub ramp: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_error_rate: Option<f64>,
}

/// Immutable run configuration, built once before the first stage.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub client: ClientConfig,
    pub ramp: RampProfile,
    /// Fail the run when the overall error rate exceeds this fraction.
    pub max_error_rate: Option<f64>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::new(DEFAULT_BASE_URL, DEFAULT_SHOP_SLUG),
            ramp: RampProfile::default(),
            max_error_rate: None,
        }
    }
}

impl LoadConfig {
    /// Layer defaults, then `file`, then `overrides`, and validate the result.
    pub fn resolve(file: Option<FileConfig>, overrides: ConfigOverrides) -> Result<Self> {
        let file = file.unwrap_or_default();

        let ramp = match overrides.ramp {
            Some(spec) => RampProfile::parse(&spec)?,
            None => file.ramp.unwrap_or_default(),
        };

        let timeout = overrides
            .timeout_ms
            .or(file.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let client = ClientConfig {
            base_url: overrides
                .base_url
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            shop_slug: overrides
                .shop_slug
                .or(file.shop_slug)
                .unwrap_or_else(|| DEFAULT_SHOP_SLUG.to_string()),
            service_id: overrides.service_id.or(file.service_id).unwrap_or(DEFAULT_SERVICE_ID),
            timeout,
        };

        let config = Self {
            client,
            ramp,
            max_error_rate: overrides.max_error_rate.or(file.max_error_rate),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = &self.client.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LoadTestError::InvalidConfig(format!(
                "base URL {base_url:?} must start with http:// or https://"
            )));
        }
        let shop = self.client.shop_slug.trim();
        if shop.is_empty() || shop.contains('/') {
            return Err(LoadTestError::InvalidConfig(format!(
                "shop slug {:?} must be a non-empty path segment",
                self.client.shop_slug
            )));
        }
        if self.client.timeout.is_zero() {
            return Err(LoadTestError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(rate) = self.max_error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(LoadTestError::InvalidConfig(format!(
                    "max error rate {rate} must be between 0 and 1"
                )));
            }
        }
        Ok(())
    }
}
