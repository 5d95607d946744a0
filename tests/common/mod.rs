//! Common test utilities for pulsecall integration tests
//!
//! This module provides shared test infrastructure including:
//! - Executor construction against wiremock servers
//! - Request matchers for authorization schemes
//! - Test fixture management

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;
use pulsecall::{ClientConfig, Executor};
use tempfile::TempDir;
use wiremock::{Match, Request as ReceivedRequest};

/// Realm and nonce used by the Digest-protected mocks
pub const REALM: &str = "testrealm@host.com";
pub const NONCE: &str = "dcd98b7102dd2f0e8b11d0f600bfb0c093";
pub const OPAQUE: &str = "5ccc069c403ebaf9f0171e9517f40e41";

/// Executor with default configuration
pub fn executor() -> Executor {
    Executor::new(&ClientConfig::default()).expect("Failed to build executor")
}

/// Executor with a custom configuration
pub fn executor_with(config: ClientConfig) -> Executor {
    Executor::new(&config).expect("Failed to build executor")
}

/// `WWW-Authenticate` value for a qop=auth Digest challenge
pub fn digest_challenge() -> String {
    format!(
        r#"Digest realm="{}", qop="auth", nonce="{}", opaque="{}""#,
        REALM, NONCE, OPAQUE
    )
}

/// Matches requests carrying a Digest `Authorization` header
pub struct DigestAuthorization;

impl Match for DigestAuthorization {
    fn matches(&self, request: &ReceivedRequest) -> bool {
        authorization_of(request).is_some_and(|v| v.starts_with("Digest "))
    }
}

/// Matches requests whose `Authorization` header starts with a prefix
pub struct AuthorizationPrefix(pub String);

impl Match for AuthorizationPrefix {
    fn matches(&self, request: &ReceivedRequest) -> bool {
        authorization_of(request).is_some_and(|v| v.starts_with(&self.0))
    }
}

/// `Authorization` header of a received request
pub fn authorization_of(request: &ReceivedRequest) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Gzip-compress a payload
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("Failed to compress");
    encoder.finish().expect("Failed to finish gzip stream")
}

/// Create a temporary file with content
pub fn create_temp_file(name: &str, content: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write temp file");
    (dir, path)
}
