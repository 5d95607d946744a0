//! Error types for pulsecall

use thiserror::Error;

/// Boxed source error carried by [`PulseError::Request`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for pulsecall
#[derive(Error, Debug)]
pub enum PulseError {
    /// Rejected input, reported before any network attempt
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure while building, sending or reading a request
    #[error("Request error: {operation} {method} {url}: {source}")]
    Request {
        operation: &'static str,
        method: String,
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl PulseError {
    /// Wrap a request failure with the operation, method and URL it happened on
    pub fn request(
        operation: &'static str,
        method: &reqwest::Method,
        url: &str,
        source: impl Into<BoxError>,
    ) -> Self {
        PulseError::Request {
            operation,
            method: method.to_string(),
            url: url.to_string(),
            source: source.into(),
        }
    }

    /// Whether the error came from the cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PulseError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
