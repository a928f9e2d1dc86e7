//! Open Charge Map HTTP client

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::config::OpenChargeMapConfig;
use super::{IngestError, IngestResult};

const API_KEY_HEADER: &str = "X-API-Key";

pub struct OpenChargeMapClient {
    client: Client,
    base_url: String,
    country_code: String,
    max_results: u32,
}

impl OpenChargeMapClient {
    pub fn new(config: &OpenChargeMapConfig) -> IngestResult<Self> {
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| IngestError::Client(format!("invalid API key header: {}", e)))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("ChargeSquare-Ingester/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        info!(
            base_url = %base_url,
            api_key_len = config.api_key.len(),
            "Initialized Open Charge Map client"
        );

        Ok(Self {
            client,
            base_url,
            country_code: config.country_code.clone(),
            max_results: config.max_results,
        })
    }

    pub fn poi_url(&self) -> String {
        format!("{}/poi", self.base_url)
    }

    /// Fetch one page of raw POI records.
    ///
    /// Every call issues a fresh request; nothing is retried.
    pub async fn fetch(&self) -> IngestResult<Vec<Value>> {
        let url = self.poi_url();
        debug!(url = %url, country_code = %self.country_code, "Fetching stations");

        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("maxresults", max_results.as_str()),
                ("compact", "true"),
                ("verbose", "false"),
                ("countrycode", self.country_code.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IngestError::Fetch(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Fetch(format!("HTTP error: {} from {}", status, url)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IngestError::Decode(e.to_string()))?;

        match body {
            Value::Array(records) => {
                debug!(record_count = records.len(), "Fetched station records");
                Ok(records)
            },
            other => Err(IngestError::Decode(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
