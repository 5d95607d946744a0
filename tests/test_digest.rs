//! Digest challenge/retry tests
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pulsecall::auth::AuthSession;
use pulsecall::client::{ReqwestTransport, Transport};
use pulsecall::middleware::auth::DigestCredentials;
use pulsecall::{Attempt, CancellationToken, ClientConfig, Executor, PulseError, Request};
use reqwest::{Method, RequestBuilder};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{authorization_of, digest_challenge, executor, DigestAuthorization, NONCE, OPAQUE, REALM};

async fn mount_digest_protected(server: &MockServer, route: &str) {
    // First registered mock wins when both match
    Mock::given(method("GET"))
        .and(path(route))
        .and(DigestAuthorization)
        .respond_with(ResponseTemplate::new(200).set_body_string("secret content"))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// Challenge answered
// ============================================================================

#[tokio::test]
async fn test_digest_retry_exactly_once() {
    let server = MockServer::start().await;
    mount_digest_protected(&server, "/protected").await;

    let executor = executor();
    let mut request = Request::get(format!("{}/protected", server.uri()))
        .with_authorization("Digest user passwd")
        .unwrap();

    let response = executor.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.attempt, Attempt::Retrying);
    assert!(response.was_retried());
    assert_eq!(response.text(), "secret content");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    assert!(authorization_of(&received[0]).is_none());

    let authorization = authorization_of(&received[1]).unwrap();
    assert!(authorization.starts_with("Digest "));
    assert!(authorization.contains(r#"username="user""#));
    assert!(authorization.contains(&format!(r#"realm="{}""#, REALM)));
    assert!(authorization.contains(&format!(r#"nonce="{}""#, NONCE)));
    assert!(authorization.contains(r#"uri="/protected""#));
    assert!(authorization.contains("qop=auth"));
    assert!(authorization.contains("nc=00000001"));
    assert!(authorization.contains(r#"response=""#));
    assert!(authorization.contains(&format!(r#"opaque="{}""#, OPAQUE)));

    // The retried header is left on the request
    assert_eq!(request.authorization(), Some(authorization.as_str()));
}

#[tokio::test]
async fn test_digest_uri_includes_query() {
    let server = MockServer::start().await;
    mount_digest_protected(&server, "/search").await;

    let executor = executor();
    let mut request = Request::get(format!("{}/search?q=rust&page=2", server.uri()))
        .with_authorization("Digest user passwd")
        .unwrap();

    let response = executor.execute(&mut request).await.unwrap();
    assert_eq!(response.status, 200);

    let received = server.received_requests().await.unwrap();
    let authorization = authorization_of(&received[1]).unwrap();
    assert!(authorization.contains(r#"uri="/search?q=rust&page=2""#));
}

#[tokio::test]
async fn test_retry_rejected_again_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/locked"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .expect(2)
        .mount(&server)
        .await;

    let executor = executor();
    let mut request = Request::get(format!("{}/locked", server.uri()))
        .with_authorization("Digest user wrong")
        .unwrap();

    let response = executor.execute(&mut request).await.unwrap();
    assert_eq!(response.status, 401);
    assert_eq!(response.attempt, Attempt::Retrying);
}

#[tokio::test]
async fn test_resending_answered_request_keeps_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(DigestAuthorization)
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor();
    let url = format!("{}/protected", server.uri());
    let mut request = Request::get(url.clone()).with_authorization("Digest user passwd").unwrap();

    assert_eq!(executor.execute(&mut request).await.unwrap().status, 200);
    assert_eq!(executor.execute(&mut request).await.unwrap().status, 200);

    assert_eq!(
        executor.auth_session().digest_credentials(&url),
        Some(DigestCredentials::new("user", "passwd"))
    );
}

// ============================================================================
// No retry
// ============================================================================

#[tokio::test]
async fn test_no_retry_without_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor();
    let mut request = Request::get(format!("{}/protected", server.uri()));
    let response = executor.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(response.attempt, Attempt::Initial);
    assert!(response.header("www-authenticate").unwrap().starts_with("Digest "));
}

#[tokio::test]
async fn test_credentials_cached_for_other_url_do_not_apply() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(AuthSession::new());
    let mut registration = Request::get(format!("{}/a", server.uri()))
        .with_authorization("Digest user passwd")
        .unwrap();
    session.process_auth(&mut registration).unwrap();
    assert_eq!(session.digest_credential_count(), 1);

    let executor = executor().with_auth_session(session);
    let mut request = Request::get(format!("{}/b", server.uri()));
    let response = executor.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(response.attempt, Attempt::Initial);
}

#[tokio::test]
async fn test_basic_challenge_not_answered() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", r#"Basic realm="api""#))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor();
    let mut request = Request::get(format!("{}/basic", server.uri()))
        .with_authorization("Digest user passwd")
        .unwrap();
    let response = executor.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(response.attempt, Attempt::Initial);
}

#[tokio::test]
async fn test_cached_credentials_reused_by_later_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(DigestAuthorization)
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .expect(2)
        .mount(&server)
        .await;

    let executor = executor();
    let url = format!("{}/protected", server.uri());

    let mut first = Request::get(url.clone()).with_authorization("Digest user passwd").unwrap();
    assert_eq!(executor.execute(&mut first).await.unwrap().status, 200);

    // No Authorization this time: the cached credentials answer the challenge
    let mut second = Request::get(url);
    let response = executor.execute(&mut second).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.attempt, Attempt::Retrying);
}

// ============================================================================
// Failed retry
// ============================================================================

/// Sends every request after the first to a closed port
struct FailingRetryTransport {
    inner: ReqwestTransport,
    calls: AtomicUsize,
}

impl Transport for FailingRetryTransport {
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.request(method, url)
    }

    fn execute(
        &self,
        mut request: reqwest::Request,
    ) -> impl std::future::Future<Output = reqwest::Result<reqwest::Response>> + Send {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            *request.url_mut() = Url::parse("http://127.0.0.1:1/").unwrap();
        }
        self.inner.execute(request)
    }
}

#[tokio::test]
async fn test_failed_retry_returns_original_challenge() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("WWW-Authenticate", digest_challenge().as_str())
                .set_body_string("challenge body"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::default();
    let transport = FailingRetryTransport {
        inner: ReqwestTransport::new(&config).unwrap(),
        calls: AtomicUsize::new(0),
    };
    let executor = Executor::with_transport(&config, transport).unwrap();

    let mut request = Request::get(format!("{}/protected", server.uri()))
        .with_authorization("Digest user passwd")
        .unwrap();
    let response = executor.execute(&mut request).await.unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(response.attempt, Attempt::Initial);
    assert_eq!(response.text(), "challenge body");
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cancels the token as soon as the first response arrives
struct CancelOnResponseTransport {
    inner: ReqwestTransport,
    token: CancellationToken,
}

impl Transport for CancelOnResponseTransport {
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.request(method, url)
    }

    fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl std::future::Future<Output = reqwest::Result<reqwest::Response>> + Send {
        let pending = self.inner.execute(request);
        let token = self.token.clone();
        async move {
            let response = pending.await;
            token.cancel();
            response
        }
    }
}

#[tokio::test]
async fn test_cancel_after_challenge_suppresses_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", digest_challenge().as_str()))
        .mount(&server)
        .await;

    let config = ClientConfig::default();
    let token = CancellationToken::new();
    let transport = CancelOnResponseTransport {
        inner: ReqwestTransport::new(&config).unwrap(),
        token: token.clone(),
    };
    let executor = Executor::with_transport(&config, transport).unwrap();

    let mut request = Request::get(format!("{}/protected", server.uri()))
        .with_authorization("Digest user passwd")
        .unwrap();
    let err = executor.send(&mut request, &token).await.unwrap_err();

    assert!(matches!(err, PulseError::Cancelled));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
