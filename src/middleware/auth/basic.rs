//! HTTP Basic Authentication (RFC 7617)

use base64::Engine;

/// HTTP Basic Authentication credentials
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Create new Basic auth with username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse credentials from "username:password" format (split at the first colon)
    pub fn from_credentials(creds: &str) -> Self {
        match creds.split_once(':') {
            Some((username, password)) => Self::new(username, password),
            None => Self::new(creds, ""),
        }
    }

    /// Header value: `Basic base64(user:password)`
    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        format!("Basic {}", encoded)
    }
}

/// Turn the arguments of a `Basic ...` directive into a header value
///
/// - a single argument that already is base64 is used verbatim
/// - a single argument containing `:` is `user:pass`
/// - otherwise the first argument is the user and the rest is the password
pub fn encode_directive(args: &[&str]) -> String {
    if let [single] = args {
        if is_base64(single) {
            return format!("Basic {}", single);
        }
        if single.contains(':') {
            return BasicAuth::from_credentials(single).header_value();
        }
    }

    match args.split_first() {
        Some((username, rest)) => BasicAuth::new(*username, rest.join(" ")).header_value(),
        None => BasicAuth::new("", "").header_value(),
    }
}

fn is_base64(candidate: &str) -> bool {
    base64::engine::general_purpose::STANDARD.decode(candidate).is_ok()
}
