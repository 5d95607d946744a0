//! Core data types
//!
//! `Request` and `Response` are the values exchanged with callers of the
//! executor. Header lookups are case-insensitive.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{PulseError, Result};

// =============================================================================
// REQUEST
// =============================================================================

/// Request body
///
/// A request carries exactly one body kind, so the assembly priority
/// (multipart, then text, then bytes) is fixed by the variant itself.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Raw text body
    Text(String),
    /// Generic byte payload, re-sent as-is on replay
    Bytes(Bytes),
    /// multipart/form-data, regenerated from these descriptors on every dispatch
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Bytes hashed as the payload when signing
    ///
    /// Multipart bodies hash as empty.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Text(text) => text.as_bytes(),
            RequestBody::Bytes(bytes) => &bytes[..],
            RequestBody::Empty | RequestBody::Multipart(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Text(text) => text.is_empty(),
            RequestBody::Bytes(bytes) => bytes.is_empty(),
            RequestBody::Multipart(parts) => parts.is_empty(),
        }
    }
}

/// Multipart value type
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    /// Text field
    Text(String),
    /// File upload, re-opened every time the form is generated
    File {
        path: PathBuf,
        filename: Option<String>,
        content_type: Option<String>,
    },
}

/// A single multipart/form-data field
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub value: MultipartValue,
}

impl MultipartPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File {
                path: path.into(),
                filename: None,
                content_type: None,
            },
        }
    }

    /// Override the filename sent for a file part (ignored for text parts)
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let MultipartValue::File { ref mut filename, .. } = self.value {
            *filename = Some(name.into());
        }
        self
    }

    /// Override the content type sent for a file part (ignored for text parts)
    pub fn with_content_type(mut self, mime: impl Into<String>) -> Self {
        if let MultipartValue::File { ref mut content_type, .. } = self.value {
            *content_type = Some(mime.into());
        }
        self
    }
}

/// An outgoing HTTP request
///
/// `url` is kept exactly as supplied: the Digest credential cache is keyed by this
/// string.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a header, replacing any previous value with the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Set a header in place
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| PulseError::Validation(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| PulseError::Validation(format!("Invalid value for header '{}': {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Shorthand for setting the `Authorization` directive
    pub fn with_authorization(self, directive: &str) -> Result<Self> {
        self.with_header(AUTHORIZATION.as_str(), directive)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = RequestBody::Text(text.into());
        self
    }

    pub fn with_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(bytes.into());
        self
    }

    pub fn with_multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn authorization(&self) -> Option<&str> {
        self.header(AUTHORIZATION.as_str())
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Which executor state produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// First dispatch
    Initial,
    /// The single Digest challenge retry
    Retrying,
}

/// A terminal response, with the body already read and decoded
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Body bytes after gzip decoding
    pub body: Bytes,
    /// Wall-clock time of the network call that produced this response
    pub elapsed: Duration,
    /// Final URL as reported by the transport
    pub url: String,
    pub attempt: Attempt,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Whether this response came from the Digest retry
    pub fn was_retried(&self) -> bool {
        self.attempt == Attempt::Retrying
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = Request::get("http://example.org")
            .with_header("X-Custom-Header", "value")
            .unwrap();
        assert_eq!(request.header("x-custom-header"), Some("value"));
        assert_eq!(request.header("X-CUSTOM-HEADER"), Some("value"));
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let result = Request::get("http://example.org").with_header("bad header", "v");
        assert!(matches!(result, Err(PulseError::Validation(_))));
    }

    #[test]
    fn test_raw_bytes_per_body_kind() {
        assert_eq!(RequestBody::Empty.raw_bytes(), b"");
        assert_eq!(RequestBody::Text("abc".into()).raw_bytes(), b"abc");
        assert_eq!(RequestBody::Bytes(Bytes::from_static(b"\x00\x01")).raw_bytes(), b"\x00\x01");
        let multipart = RequestBody::Multipart(vec![MultipartPart::text("a", "b")]);
        assert_eq!(multipart.raw_bytes(), b"");
    }

    #[test]
    fn test_file_part_overrides() {
        let part = MultipartPart::file("upload", "/tmp/report.csv")
            .with_filename("renamed.csv")
            .with_content_type("text/csv");
        assert_eq!(
            part.value,
            MultipartValue::File {
                path: PathBuf::from("/tmp/report.csv"),
                filename: Some("renamed.csv".to_string()),
                content_type: Some("text/csv".to_string()),
            }
        );

        // Overrides do not turn a text part into a file part
        let text = MultipartPart::text("field", "value").with_filename("ignored");
        assert_eq!(text.value, MultipartValue::Text("value".to_string()));
    }

    #[test]
    fn test_response_json() {
        let response = Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"ok":true}"#),
            elapsed: Duration::from_millis(5),
            url: "http://example.org".to_string(),
            attempt: Attempt::Initial,
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
        assert!(!response.was_retried());
    }
}
