//! HTTP request execution
//!
//! [`Executor::send`] runs one request through authorization, body assembly and
//! dispatch. A Digest challenge is answered by at most one retry:
//!
//! ```text
//! Initial --(401 + Digest challenge + cached credentials)--> Retrying
//! ```
//!
//! A failed retry is logged and the original 401 is returned instead.

use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::header::{
    HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_ENCODING, COOKIE, SET_COOKIE, WWW_AUTHENTICATE,
};
use reqwest::StatusCode;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::transport::{ReqwestTransport, Transport};
use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::cookies::{cookie_header, parse_set_cookie_header, CookieStore, MemoryCookieStore};
use crate::errors::{PulseError, Result};
use crate::middleware::auth::digest::{self, is_digest_challenge, DigestChallenge};
use crate::models::{Attempt, Request, RequestBody, Response};
use crate::uploads::build_multipart_form_async;

/// A dispatched request whose body has not been read yet
struct Dispatched {
    response: reqwest::Response,
    elapsed: Duration,
    attempt: Attempt,
}

/// Request executor
///
/// Owns the [`AuthSession`] (and with it the Digest credential cache) and the
/// cookie store. Share it behind an `Arc` to issue concurrent requests.
pub struct Executor<T: Transport = ReqwestTransport> {
    transport: T,
    auth: Arc<AuthSession>,
    cookies: Arc<dyn CookieStore>,
    default_headers: HeaderMap,
}

impl Executor<ReqwestTransport> {
    /// Executor over a reqwest client built from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Executor<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self> {
        Ok(Self {
            transport,
            auth: Arc::new(AuthSession::new()),
            cookies: Arc::new(MemoryCookieStore::new()),
            default_headers: config.header_map()?,
        })
    }

    pub fn with_auth_session(mut self, session: Arc<AuthSession>) -> Self {
        self.auth = session;
        self
    }

    pub fn with_cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookies = store;
        self
    }

    pub fn auth_session(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    pub fn cookie_store(&self) -> &Arc<dyn CookieStore> {
        &self.cookies
    }

    /// Send without an external cancellation token
    pub async fn execute(&self, request: &mut Request) -> Result<Response> {
        self.send(request, &CancellationToken::new()).await
    }

    /// Send a request, answering a Digest challenge with at most one retry
    ///
    /// `request` is updated in place: processed `Authorization`, merged default
    /// headers, cookies, and the Digest response when a retry happened.
    pub async fn send(&self, request: &mut Request, cancel: &CancellationToken) -> Result<Response> {
        self.auth.process_auth(request)?;
        merge_default_headers(&mut request.headers, &self.default_headers);

        let url = Url::parse(&request.url)
            .map_err(|e| PulseError::request("parse url", &request.method, &request.url, e))?;
        self.attach_cookies(&url, &mut request.headers);

        let initial = self.dispatch(request, &url, Attempt::Initial, cancel).await?;

        let challenge_response = self.challenge_response(request, &url, &initial);
        let terminal = match challenge_response {
            None => initial,
            Some(_) if cancel.is_cancelled() => return Err(PulseError::Cancelled),
            Some(authorization) => match self.retry(request, &url, &authorization, cancel).await {
                Ok(retried) => retried,
                Err(PulseError::Cancelled) => return Err(PulseError::Cancelled),
                Err(e) => {
                    warn!(
                        error = %e,
                        method = %request.method,
                        url = %request.url,
                        "Digest retry failed, returning the original challenge response"
                    );
                    initial
                }
            },
        };

        self.finish(request, terminal, cancel).await
    }

    /// Digest `Authorization` value for a challenged response, if this URL has
    /// cached credentials
    fn challenge_response(&self, request: &Request, url: &Url, dispatched: &Dispatched) -> Option<String> {
        if dispatched.response.status() != StatusCode::UNAUTHORIZED {
            return None;
        }

        let header = dispatched
            .response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| is_digest_challenge(v))?;

        let Some(credentials) = self.auth.digest_credentials(&request.url) else {
            debug!(url = %request.url, "Digest challenge without cached credentials");
            return None;
        };

        let challenge = DigestChallenge::parse(header);
        Some(digest::build_response(
            &credentials.username,
            &credentials.password,
            request.method.as_str(),
            &request_uri(url),
            &challenge,
        ))
    }

    async fn retry(
        &self,
        request: &mut Request,
        url: &Url,
        authorization: &str,
        cancel: &CancellationToken,
    ) -> Result<Dispatched> {
        debug!(url = %request.url, "Answering Digest challenge");
        let value = HeaderValue::from_str(authorization)
            .map_err(|e| PulseError::Auth(format!("Invalid Digest authorization header: {}", e)))?;
        request.headers.insert(AUTHORIZATION, value);
        self.dispatch(request, url, Attempt::Retrying, cancel).await
    }

    async fn dispatch(
        &self,
        request: &Request,
        url: &Url,
        attempt: Attempt,
        cancel: &CancellationToken,
    ) -> Result<Dispatched> {
        if cancel.is_cancelled() {
            return Err(PulseError::Cancelled);
        }

        let built = self.build(request, url).await?;
        debug!(method = %request.method, url = %request.url, ?attempt, "Dispatching request");

        let started = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PulseError::Cancelled),
            result = self.transport.execute(built) => {
                result.map_err(|e| PulseError::request("send", &request.method, &request.url, e))?
            }
        };

        Ok(Dispatched {
            response,
            elapsed: started.elapsed(),
            attempt,
        })
    }

    /// Build the transport request, generating the body from its descriptors
    async fn build(&self, request: &Request, url: &Url) -> Result<reqwest::Request> {
        let mut builder = self
            .transport
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());

        builder = match &request.body {
            RequestBody::Multipart(parts) => {
                let form = build_multipart_form_async(parts.clone())
                    .await
                    .map_err(|e| PulseError::request("build body", &request.method, &request.url, e))?;
                builder.multipart(form)
            }
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Bytes(bytes) => builder.body(bytes.clone()),
            RequestBody::Empty => builder,
        };

        builder
            .build()
            .map_err(|e| PulseError::request("build", &request.method, &request.url, e))
    }

    /// Read the terminal response, storing cookies and decoding gzip
    async fn finish(&self, request: &Request, dispatched: Dispatched, cancel: &CancellationToken) -> Result<Response> {
        let Dispatched { response, elapsed, attempt } = dispatched;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();

        self.store_cookies(&final_url, &headers);

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PulseError::Cancelled),
            body = response.bytes() => {
                body.map_err(|e| PulseError::request("read", &request.method, &request.url, e))?
            }
        };

        let body = if is_gzip(&headers) {
            decode_gzip(&raw).map_err(|e| PulseError::request("decode", &request.method, &request.url, e))?
        } else {
            raw
        };

        debug!(status = status.as_u16(), ?attempt, elapsed_ms = elapsed.as_millis() as u64, "Response received");

        Ok(Response {
            status,
            headers,
            body,
            elapsed,
            url: final_url.to_string(),
            attempt,
        })
    }

    fn attach_cookies(&self, url: &Url, headers: &mut HeaderMap) {
        if headers.contains_key(COOKIE) {
            return;
        }
        let cookies = self.cookies.cookies_for(url);
        if let Some(value) = cookie_header(&cookies).and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(COOKIE, value);
        }
    }

    fn store_cookies(&self, url: &Url, headers: &HeaderMap) {
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_set_cookie_header)
            .collect();
        if !cookies.is_empty() {
            self.cookies.store(url, cookies);
        }
    }
}

/// Add client defaults for header names the request does not set itself
fn merge_default_headers(headers: &mut HeaderMap, defaults: &HeaderMap) {
    for name in defaults.keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in defaults.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
}

/// Request-URI used in the Digest response: path plus query
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

fn decode_gzip(raw: &[u8]) -> std::io::Result<Bytes> {
    let mut decoded = Vec::new();
    GzDecoder::new(raw).read_to_end(&mut decoded)?;
    Ok(Bytes::from(decoded))
}
