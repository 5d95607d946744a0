//! pulsecall library interface
//!
//! Authentication and request execution for an HTTP API client.
//!
//! # Module Organization
//!
//! - [`middleware::auth`] - Basic and Digest directives, `Authorization` parsing
//! - [`auth`] - SigV4 signing and the per-session [`AuthSession`]
//! - [`client`] - The [`Executor`] and its transport
//! - [`models`] - Request and response types
//! - [`uploads`] - Multipart form generation
//! - [`cookies`] - Cookie store
//! - [`config`] - Client configuration
//! - [`errors`] - Error types (PulseError, Result)
//! - [`logging`] - Subscriber setup

pub mod auth;
pub mod client;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod uploads;

pub use auth::AuthSession;
pub use client::Executor;
pub use config::ClientConfig;
pub use errors::{PulseError, Result};
pub use models::{Attempt, MultipartPart, MultipartValue, Request, RequestBody, Response};
pub use tokio_util::sync::CancellationToken;
