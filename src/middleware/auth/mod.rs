//! Authentication middleware
//!
//! An `Authorization` value is read as a directive: a scheme token followed by
//! whitespace-separated arguments. Each [`AuthScheme`] maps to one handler.

pub mod basic;
pub mod digest;

pub use basic::BasicAuth;
pub use digest::{DigestChallenge, DigestCredentials};

/// Scheme token of an `Authorization` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Basic <base64> | Basic <user:pass> | Basic <user> <pass...>`
    Basic,
    /// `Digest <user> <pass...>`, answered after the server challenge
    Digest,
    /// `AWS <accessKeyId> <secretAccessKey> [token:T] [region:R] [service:S]`
    Aws,
    /// Anything else passes through untouched
    Unknown,
}

impl AuthScheme {
    /// Look up a scheme token (case-insensitive)
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "basic" => AuthScheme::Basic,
            "digest" => AuthScheme::Digest,
            "aws" => AuthScheme::Aws,
            _ => AuthScheme::Unknown,
        }
    }

    /// Scheme name for display/debugging
    pub fn type_name(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "basic",
            AuthScheme::Digest => "digest",
            AuthScheme::Aws => "aws",
            AuthScheme::Unknown => "unknown",
        }
    }
}

/// A directive split into its scheme and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
    pub scheme: AuthScheme,
    pub args: Vec<&'a str>,
}

impl<'a> Directive<'a> {
    /// Split a header value on whitespace. Values with fewer than two tokens
    /// are not directives.
    pub fn parse(value: &'a str) -> Option<Self> {
        let mut tokens = value.split_whitespace();
        let scheme = AuthScheme::from_token(tokens.next()?);
        let args: Vec<&str> = tokens.collect();
        if args.is_empty() {
            return None;
        }
        Some(Self { scheme, args })
    }
}
