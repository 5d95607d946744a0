//! AWS Signature Version 4 authentication
//!
//! Signs requests for API Gateway, S3 and other AWS-compatible APIs. The
//! canonical request is built by hand so the output is byte-exact and a pure
//! function of the request and the signing instant.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

use crate::errors::{PulseError, Result};
use crate::models::Request;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SERVICE: &str = "execute-api";

const AMZ_DATE: HeaderName = HeaderName::from_static("x-amz-date");
const AMZ_SECURITY_TOKEN: HeaderName = HeaderName::from_static("x-amz-security-token");

/// Credentials and scope for one signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSigningContext {
    /// AWS access key ID
    pub access_key_id: String,
    /// AWS secret access key
    pub secret_access_key: String,
    /// AWS session token (optional, for temporary credentials)
    pub session_token: Option<String>,
    /// AWS region (e.g., "us-east-1")
    pub region: String,
    /// AWS service name (e.g., "execute-api", "s3")
    pub service: String,
}

impl AwsSigningContext {
    /// Build from directive arguments: `<key> <secret> [token:T] [region:R] [service:S]`
    ///
    /// Region and service fall back to the host (`service.region.domain.tld`),
    /// then to `us-east-1` / `execute-api`.
    pub fn from_args(args: &[&str], url: &Url) -> Result<Self> {
        let (access_key_id, secret_access_key, options) = match args {
            [key, secret, options @ ..] => (key, secret, options),
            _ => {
                return Err(PulseError::Validation(
                    "AWS auth requires an access key ID and a secret access key".to_string(),
                ))
            }
        };

        let mut session_token = None;
        let mut region = None;
        let mut service = None;
        for option in options {
            if let Some(value) = option.strip_prefix("token:") {
                session_token = Some(value.to_string());
            } else if let Some(value) = option.strip_prefix("region:") {
                region = Some(value.to_string());
            } else if let Some(value) = option.strip_prefix("service:") {
                service = Some(value.to_string());
            }
        }

        if region.is_none() || service.is_none() {
            if let Some((host_service, host_region)) = url.host_str().and_then(infer_from_host) {
                service.get_or_insert(host_service);
                region.get_or_insert(host_region);
            }
        }

        Ok(Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token,
            region: region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            service: service.unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
        })
    }

    /// `dateStamp/region/service/aws4_request`
    pub fn credential_scope(&self, date_stamp: &str) -> String {
        format!("{}/{}/{}/aws4_request", date_stamp, self.region, self.service)
    }
}

/// `(service, region)` from the first two labels of a host with at least four labels
fn infer_from_host(host: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() >= 4 {
        Some((parts[0].to_string(), parts[1].to_string()))
    } else {
        None
    }
}

/// Sign `request` in place at instant `now`
///
/// Sets `X-Amz-Date` (and `X-Amz-Security-Token` when present) and replaces
/// `Authorization` with the signature. Headers are only written back once every
/// step has succeeded.
///
/// The payload hash covers text and byte bodies. Multipart bodies are generated
/// by the transport after signing and hash as the empty payload, so services
/// that verify the payload hash (S3 uploads, for one) reject signed multipart
/// requests.
pub fn sign_request(request: &mut Request, ctx: &AwsSigningContext, now: DateTime<Utc>) -> Result<()> {
    let url = Url::parse(&request.url)?;
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut headers = request.headers.clone();
    headers.insert(AMZ_DATE, header_value(&amz_date)?);
    if let Some(ref token) = ctx.session_token {
        headers.insert(AMZ_SECURITY_TOKEN, header_value(token)?);
    }
    headers.remove(AUTHORIZATION);

    let host = host_header(&url)
        .ok_or_else(|| PulseError::Auth(format!("Cannot sign a URL without host: {}", url)))?;
    let (canonical_headers, signed_headers) = canonical_headers(&headers, &host);
    let payload_hash = sha256_hex(request.body.raw_bytes());

    let canonical = canonical_request(
        request.method.as_str(),
        &url,
        &canonical_headers,
        &signed_headers,
        &payload_hash,
    );
    let scope = ctx.credential_scope(&date_stamp);
    let to_sign = string_to_sign(&amz_date, &scope, &canonical);

    let key = signing_key(&ctx.secret_access_key, &date_stamp, &ctx.region, &ctx.service)?;
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, ctx.access_key_id, scope, signed_headers, signature
    );
    headers.insert(AUTHORIZATION, header_value(&authorization)?);

    request.headers = headers;
    Ok(())
}

/// `METHOD\nURI\nQUERY\nHEADERS\nSIGNEDHEADERS\nPAYLOADHASH`
///
/// The query string is used exactly as it appears in the URL.
pub fn canonical_request(
    method: &str,
    url: &Url,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let path = url.path();
    let uri = if path.is_empty() { "/" } else { path };
    let query = url.query().unwrap_or("");

    [method, uri, query, canonical_headers, signed_headers, payload_hash].join("\n")
}

/// Lower-cased, sorted `name:value\n` lines plus the `;`-joined name list
///
/// `host` always comes from the URL; repeated headers are joined with `,`.
pub fn canonical_headers(headers: &HeaderMap, host: &str) -> (String, String) {
    let mut entries: BTreeMap<String, String> = BTreeMap::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
            .collect();
        entries.insert(name.as_str().to_ascii_lowercase(), values.join(","));
    }
    entries.insert("host".to_string(), host.trim().to_string());

    let canonical: String = entries
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed = entries.keys().cloned().collect::<Vec<_>>().join(";");
    (canonical, signed)
}

/// `AWS4-HMAC-SHA256\namzDate\nscope\nhex(SHA-256(canonicalRequest))`
pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    )
}

/// HMAC chain over `"AWS4" + secret`, date, region, service, `aws4_request`
pub fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// Host header value used for signing: host, plus the port when the URL carries
/// a non-default one
fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| PulseError::Auth(format!("Invalid AWS header value: {}", e)))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| PulseError::Auth(format!("HMAC error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compute SHA256 hash of data, hex-encoded
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
