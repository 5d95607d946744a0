//! Network transport
//!
//! The executor never touches sockets itself. Pooling, TLS, proxying and
//! redirects belong to the transport; the default one is a configured
//! [`reqwest::Client`].

use reqwest::{Client, Method, RequestBuilder};
use std::future::Future;
use url::Url;

use crate::config::ClientConfig;
use crate::errors::{PulseError, Result};

/// Transport collaborator
pub trait Transport: Send + Sync {
    /// Start a request builder bound to this transport
    fn request(&self, method: Method, url: Url) -> RequestBuilder;

    /// Execute a built request
    fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = reqwest::Result<reqwest::Response>> + Send;
}

/// Transport backed by a [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the HTTP client from configuration
    ///
    /// A malformed proxy is rejected here, before any request is made.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());

        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy) = config.proxy()? {
            builder = builder.proxy(proxy);
        }

        // Disable automatic Referer header on redirects
        builder = builder.referer(false);

        let client = builder
            .build()
            .map_err(|e| PulseError::Validation(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Transport for ReqwestTransport {
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = reqwest::Result<reqwest::Response>> + Send {
        self.client.execute(request)
    }
}
