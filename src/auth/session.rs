//! Authorization directive processing
//!
//! [`AuthSession`] rewrites the `Authorization` header of outgoing requests and
//! owns the Digest credential cache. One session lives as long as the executor
//! that owns it; cached credentials are never evicted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::aws::{sign_request, AwsSigningContext};
use crate::errors::{PulseError, Result};
use crate::middleware::auth::{basic, AuthScheme, Directive, DigestCredentials};
use crate::models::Request;

/// Source of the signing instant
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Authorization processor with its Digest credential cache
///
/// The cache is keyed by the exact request URL string. Entries are inserted and
/// read whole; a later directive for the same URL replaces the earlier one.
pub struct AuthSession {
    digest_credentials: DashMap<String, DigestCredentials>,
    clock: Clock,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("digest_credentials", &self.digest_credentials.len())
            .finish()
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self {
            digest_credentials: DashMap::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for AWS signing
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Rewrite the request's `Authorization` directive for its scheme
    ///
    /// Requests without a directive, and unknown schemes, are left untouched.
    pub fn process_auth(&self, request: &mut Request) -> Result<()> {
        let Some(value) = request.authorization().map(str::to_owned) else {
            return Ok(());
        };
        let Some(directive) = Directive::parse(&value) else {
            return Ok(());
        };

        debug!(scheme = directive.scheme.type_name(), url = %request.url, "Processing authorization directive");

        match directive.scheme {
            AuthScheme::Basic => apply_basic(request, &directive.args),
            AuthScheme::Digest => {
                self.register_digest(request, &directive.args);
                Ok(())
            }
            AuthScheme::Aws => self.apply_aws(request, &directive.args),
            AuthScheme::Unknown => Ok(()),
        }
    }

    /// Credentials cached for exactly this URL
    pub fn digest_credentials(&self, url: &str) -> Option<DigestCredentials> {
        self.digest_credentials.get(url).map(|entry| entry.value().clone())
    }

    /// Number of URLs with cached Digest credentials
    pub fn digest_credential_count(&self) -> usize {
        self.digest_credentials.len()
    }

    /// Store the credentials and strip the header until the server challenges.
    /// Fewer than two arguments, or a response built for an earlier challenge,
    /// leaves the directive as it is.
    fn register_digest(&self, request: &mut Request, args: &[&str]) {
        let Some(credentials) = DigestCredentials::from_args(args) else {
            return;
        };
        self.digest_credentials.insert(request.url.clone(), credentials);
        request.headers.remove(AUTHORIZATION);
    }

    fn apply_aws(&self, request: &mut Request, args: &[&str]) -> Result<()> {
        if args.len() < 2 {
            return Err(PulseError::Validation(
                "AWS auth requires an access key ID and a secret access key".to_string(),
            ));
        }
        let url = Url::parse(&request.url)?;
        let ctx = AwsSigningContext::from_args(args, &url)?;
        sign_request(request, &ctx, (self.clock)())
    }
}

fn apply_basic(request: &mut Request, args: &[&str]) -> Result<()> {
    let value = HeaderValue::from_str(&basic::encode_directive(args))
        .map_err(|e| PulseError::Auth(format!("Invalid Basic auth header: {}", e)))?;
    request.headers.insert(AUTHORIZATION, value);
    Ok(())
}
