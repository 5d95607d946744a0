//! Client configuration
//!
//! ```toml
//! timeout_secs = 30
//! proxy = "http://proxy.internal:3128"
//! user_agent = "my-tool/1.0"
//!
//! [default_headers]
//! Accept = "application/json"
//! ```

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::errors::{PulseError, Result};

pub const USER_AGENT_STRING: &str = concat!("pulsecall/", env!("CARGO_PKG_VERSION"));

/// Proxy schemes accepted by the transport
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Client-level settings shared by every request of one executor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: Option<f64>,
    /// Proxy URL applied to all traffic
    pub proxy: Option<String>,
    /// Headers added to requests that do not already set them
    pub default_headers: IndexMap<String, String>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            proxy: None,
            default_headers: IndexMap::new(),
            user_agent: USER_AGENT_STRING.to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PulseError::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Default headers as a validated [`HeaderMap`]
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PulseError::Validation(format!("Invalid default header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| PulseError::Validation(format!("Invalid value for default header '{}': {}", name, e)))?;
            headers.append(header_name, header_value);
        }
        Ok(headers)
    }

    /// Validated proxy, if one is configured
    pub fn proxy(&self) -> Result<Option<reqwest::Proxy>> {
        let Some(ref raw) = self.proxy else {
            return Ok(None);
        };

        let url = url::Url::parse(raw)
            .map_err(|e| PulseError::Validation(format!("Malformed proxy URL '{}': {}", raw, e)))?;
        if !PROXY_SCHEMES.contains(&url.scheme()) {
            return Err(PulseError::Validation(format!(
                "Unsupported proxy scheme '{}' in '{}'",
                url.scheme(),
                raw
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(PulseError::Validation(format!("Proxy URL '{}' has no host", raw)));
        }

        reqwest::Proxy::all(url.as_str())
            .map(Some)
            .map_err(|e| PulseError::Validation(format!("Malformed proxy URL '{}': {}", raw, e)))
    }
}
