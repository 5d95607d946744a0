//! HTTP Digest Authentication (RFC 2617 / RFC 7616, MD5 family)
//!
//! Parses `WWW-Authenticate: Digest ...` challenges and builds the matching
//! `Authorization` directive. The nonce count is always `00000001`: every
//! challenge is answered exactly once.

use md5_digest::{Digest, Md5};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nonce count sent with every qop response
pub const NONCE_COUNT: &str = "00000001";

/// Credentials registered by a `Digest <user> <pass...>` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCredentials {
    pub username: String,
    pub password: String,
}

impl DigestCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build from directive arguments: first is the user, the rest is the password.
    /// Returns `None` with fewer than two arguments, and for an already built
    /// response (`Digest username="...", ...`) left on a resent request.
    pub fn from_args(args: &[&str]) -> Option<Self> {
        match args {
            [username, ..] if is_built_response(username) => None,
            [username, rest @ ..] if !rest.is_empty() => Some(Self::new(*username, rest.join(" "))),
            _ => None,
        }
    }
}

fn is_built_response(first_arg: &str) -> bool {
    first_arg
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("username="))
}

/// Parsed digest challenge from a WWW-Authenticate header
///
/// Missing parameters are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: String,
    pub qop: String,
    pub algorithm: String,
}

impl DigestChallenge {
    /// Parse a WWW-Authenticate header value. Never fails: malformed input
    /// simply yields empty fields.
    pub fn parse(header: &str) -> Self {
        let params_str = strip_scheme(header.trim());
        let mut challenge = DigestChallenge::default();

        for part in split_digest_params(params_str) {
            if let Some((key, value)) = parse_param(&part) {
                match key.to_ascii_lowercase().as_str() {
                    "realm" => challenge.realm = value,
                    "nonce" => challenge.nonce = value,
                    "opaque" => challenge.opaque = value,
                    "qop" => challenge.qop = value,
                    "algorithm" => challenge.algorithm = value,
                    _ => {}
                }
            }
        }

        challenge
    }

    fn is_session_algorithm(&self) -> bool {
        self.algorithm.eq_ignore_ascii_case("md5-sess")
    }

    fn uses_qop(&self) -> bool {
        self.qop.contains("auth")
    }
}

/// Whether a WWW-Authenticate value announces the Digest scheme
pub fn is_digest_challenge(header: &str) -> bool {
    header
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("digest "))
}

/// Build the `Authorization` value answering `challenge`, with a fresh cnonce
pub fn build_response(
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    challenge: &DigestChallenge,
) -> String {
    build_response_with_cnonce(username, password, method, uri, challenge, &generate_nonce())
}

/// Same as [`build_response`] with a caller-chosen cnonce
pub fn build_response_with_cnonce(
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    challenge: &DigestChallenge,
    cnonce: &str,
) -> String {
    let mut ha1 = md5_hex(&format!("{}:{}:{}", username, challenge.realm, password));
    if challenge.is_session_algorithm() {
        ha1 = md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, cnonce));
    }
    let ha2 = md5_hex(&format!("{}:{}", method, uri));

    let mut directives = vec![
        quoted("username", username),
        quoted("realm", &challenge.realm),
        quoted("nonce", &challenge.nonce),
        quoted("uri", uri),
    ];

    if challenge.uses_qop() {
        let response = md5_hex(&format!(
            "{}:{}:{}:{}:auth:{}",
            ha1, challenge.nonce, NONCE_COUNT, cnonce, ha2
        ));
        directives.push("qop=auth".to_string());
        directives.push(format!("nc={}", NONCE_COUNT));
        directives.push(quoted("cnonce", cnonce));
        directives.push(quoted("response", &response));
    } else {
        let response = md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2));
        directives.push(quoted("response", &response));
    }

    if !challenge.opaque.is_empty() {
        directives.push(quoted("opaque", &challenge.opaque));
    }
    if !challenge.algorithm.is_empty() {
        directives.push(format!("algorithm={}", challenge.algorithm));
    }

    format!("Digest {}", directives.join(", "))
}

/// 16 random bytes, hex-encoded
///
/// Uses the OS generator and only falls back to a time-seeded LCG when the OS
/// source reports an error.
pub fn generate_nonce() -> String {
    use rand::rngs::OsRng;
    use rand::TryRngCore;

    let mut bytes = [0u8; 16];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        fill_lcg(&mut bytes);
    }
    hex::encode(bytes)
}

fn fill_lcg(bytes: &mut [u8]) {
    let mut state = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9e37_79b9_7f4a_7c15);
    for byte in bytes.iter_mut() {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        *byte = (state >> 33) as u8;
    }
}

fn md5_hex(data: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

fn quoted(key: &str, value: &str) -> String {
    format!("{}=\"{}\"", key, value)
}

/// Drop a leading `Digest` token if present
fn strip_scheme(header: &str) -> &str {
    match header.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => rest,
        _ => header,
    }
}

/// Split digest parameters, handling quoted values with commas
fn split_digest_params(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current = String::new();
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

/// Parse a single key=value or key="value" parameter
fn parse_param(s: &str) -> Option<(String, String)> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}
