//! Ingestion configuration
//!
//! Configuration for the Open Charge Map poller.

use chargesquare_common::env;
use std::time::Duration;

pub const DEFAULT_OCM_API_BASE_URL: &str = "https://api.openchargemap.io/v3";

pub const DEFAULT_OCM_COUNTRY_CODE: &str = "TR";

/// Page size requested per fetch (the directory caps it at 100)
pub const DEFAULT_OCM_MAX_RESULTS: u32 = 100;

pub const DEFAULT_OCM_FETCH_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_OCM_TIMEOUT_SECS: u64 = 30;

/// Main ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Whether the poller runs at all
    pub enabled: bool,
    pub open_charge_map: OpenChargeMapConfig,
}

#[derive(Clone)]
pub struct OpenChargeMapConfig {
    pub base_url: String,
    pub api_key: String,
    pub country_code: String,
    pub max_results: u32,
    pub fetch_interval_secs: u64,
    pub timeout_secs: u64,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for OpenChargeMapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenChargeMapConfig")
            .field("base_url", &self.base_url)
            .field("api_key_len", &self.api_key.len())
            .field("country_code", &self.country_code)
            .field("max_results", &self.max_results)
            .field("fetch_interval_secs", &self.fetch_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for OpenChargeMapConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OCM_API_BASE_URL.to_string(),
            api_key: String::new(),
            country_code: DEFAULT_OCM_COUNTRY_CODE.to_string(),
            max_results: DEFAULT_OCM_MAX_RESULTS,
            fetch_interval_secs: DEFAULT_OCM_FETCH_INTERVAL_SECS,
            timeout_secs: DEFAULT_OCM_TIMEOUT_SECS,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            open_charge_map: OpenChargeMapConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            enabled: env::parse_or("INGEST_ENABLED", false)?,
            open_charge_map: OpenChargeMapConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled {
            self.open_charge_map.validate()?;
        }
        Ok(())
    }
}

impl OpenChargeMapConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            base_url: env::string_or("OCM_API_BASE_URL", DEFAULT_OCM_API_BASE_URL),
            api_key: env::optional("OCM_API_KEY").unwrap_or_default(),
            country_code: env::string_or("OCM_COUNTRY_CODE", DEFAULT_OCM_COUNTRY_CODE),
            max_results: env::parse_or("OCM_MAX_RESULTS", DEFAULT_OCM_MAX_RESULTS)?,
            fetch_interval_secs: env::parse_or(
                "OCM_FETCH_INTERVAL_SECS",
                DEFAULT_OCM_FETCH_INTERVAL_SECS,
            )?,
            timeout_secs: env::parse_or("OCM_TIMEOUT_SECS", DEFAULT_OCM_TIMEOUT_SECS)?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("OCM_API_KEY is required when ingestion is enabled");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("OCM_API_BASE_URL must be an http(s) URL, got '{}'", self.base_url);
        }
        if self.country_code.is_empty() {
            anyhow::bail!("OCM_COUNTRY_CODE cannot be empty");
        }
        if !(1..=100).contains(&self.max_results) {
            anyhow::bail!("OCM_MAX_RESULTS must be between 1 and 100");
        }
        if self.fetch_interval_secs == 0 {
            anyhow::bail!("OCM_FETCH_INTERVAL_SECS must be greater than 0");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("OCM_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
