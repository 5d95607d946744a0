//! HTTP client functionality

pub mod http;
pub mod transport;

// Re-exports
pub use http::Executor;
pub use transport::{ReqwestTransport, Transport};
