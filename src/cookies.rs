//! Cookie handling
//!
//! The executor talks to cookies through the [`CookieStore`] trait. The default
//! [`MemoryCookieStore`] keeps cookies per host for the lifetime of the executor.

use cookie::Cookie;
use dashmap::DashMap;
use time::OffsetDateTime;
use url::Url;

/// Cookie collaborator, keyed by host
pub trait CookieStore: Send + Sync {
    /// Cookies to send with a request to `url`
    fn cookies_for(&self, url: &Url) -> Vec<Cookie<'static>>;

    /// Remember cookies set by a response from `url`
    fn store(&self, url: &Url, cookies: Vec<Cookie<'static>>);
}

#[derive(Debug, Clone)]
struct StoredCookie {
    cookie: Cookie<'static>,
    expires_at: Option<OffsetDateTime>,
}

impl StoredCookie {
    fn new(cookie: Cookie<'static>, now: OffsetDateTime) -> Self {
        // Max-Age takes precedence over Expires (RFC 6265 §5.3)
        let expires_at = match cookie.max_age() {
            Some(max_age) => Some(now + max_age),
            None => cookie.expires_datetime(),
        };
        Self { cookie, expires_at }
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn path(&self) -> &str {
        self.cookie.path().unwrap_or("/")
    }

    fn matches(&self, url: &Url) -> bool {
        if self.cookie.secure().unwrap_or(false) && url.scheme() != "https" {
            return false;
        }
        path_matches(url.path(), self.path())
    }
}

/// In-memory cookie store
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    hosts: DashMap<String, Vec<StoredCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live cookies held for `host`
    pub fn len_for_host(&self, host: &str) -> usize {
        let now = OffsetDateTime::now_utc();
        self.hosts
            .get(host)
            .map(|jar| jar.iter().filter(|c| !c.is_expired(now)).count())
            .unwrap_or(0)
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookies_for(&self, url: &Url) -> Vec<Cookie<'static>> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let now = OffsetDateTime::now_utc();
        self.hosts
            .get(host)
            .map(|jar| {
                jar.iter()
                    .filter(|c| !c.is_expired(now) && c.matches(url))
                    .map(|c| c.cookie.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn store(&self, url: &Url, cookies: Vec<Cookie<'static>>) {
        let Some(host) = url.host_str() else {
            return;
        };
        if cookies.is_empty() {
            return;
        }
        let now = OffsetDateTime::now_utc();
        let mut jar = self.hosts.entry(host.to_string()).or_default();
        for cookie in cookies {
            let stored = StoredCookie::new(cookie, now);
            jar.retain(|existing| {
                existing.cookie.name() != stored.cookie.name() || existing.path() != stored.path()
            });
            if !stored.is_expired(now) {
                jar.push(stored);
            }
        }
        jar.retain(|c| !c.is_expired(now));
    }
}

/// `Cookie` header value: `name=value` pairs joined by `; `
pub fn cookie_header(cookies: &[Cookie<'_>]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// RFC 6265 path-match
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Split Set-Cookie header value into individual cookies
///
/// Handles the tricky case where cookie values may contain commas
/// (e.g., in Expires date), but cookies are separated by ", name=".
pub fn split_cookies(cookies: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    let mut rest = cookies;
    while let Some(c) = rest.chars().next() {
        if let Some(next) = rest.strip_prefix(", ") {
            if looks_like_cookie_start(next) {
                result.push(current.trim().to_string());
                current.clear();
                rest = next;
                continue;
            }
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if !current.trim().is_empty() {
        result.push(current.trim().to_string());
    }

    result
}

/// Parse a Set-Cookie header into typed Cookie structs
pub fn parse_set_cookie_header(header: &str) -> Vec<Cookie<'static>> {
    split_cookies(header)
        .into_iter()
        .filter_map(|s| Cookie::parse(s).ok())
        .map(|c| c.into_owned())
        .collect()
}

/// Check if string starts with a cookie name pattern (token=)
fn looks_like_cookie_start(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {}
        _ => return false,
    }

    for c in chars {
        if c == '=' {
            return true;
        }
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return false;
        }
    }

    false
}
