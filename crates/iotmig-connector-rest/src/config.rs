//! HTTP client configuration
//!
//! Shared by the source registry and destination platform clients.

use reqwest::Client;
use std::time::Duration;

use iotmig_connector::error::{ConnectorError, ConnectorResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for one HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Base URL without trailing slash (e.g., "https://iot.example.com").
    pub base_url: String,

    /// Whole-request timeout. Bounds how long one device can hold a worker.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout.
    pub connect_timeout_secs: u64,
}

impl RestConfig {
    /// Create a new config with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Same timeouts, different host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base(base_url.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.base_url.is_empty() {
            return Err(ConnectorError::invalid_configuration("base URL is required"));
        }

        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            ConnectorError::invalid_configuration(format!(
                "invalid base URL '{}': {e}",
                self.base_url
            ))
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConnectorError::invalid_configuration(format!(
                    "unsupported URL scheme: {other}"
                )))
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConnectorError::invalid_configuration(
                "request timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Build the reqwest client with configuration.
    pub(crate) fn build_client(&self) -> ConnectorResult<Client> {
        self.validate()?;

        Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(concat!("iotmig/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConnectorError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })
    }

    /// Join a path onto the base URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
