//! Authentication handling
//!
//! - [`session`] - directive processing and the Digest credential cache
//! - [`aws`] - AWS Signature Version 4 request signing
//!
//! Basic and Digest encoders live in [`crate::middleware::auth`].

pub mod aws;
pub mod session;

pub use aws::{sign_request, sha256_hex, AwsSigningContext};
pub use session::{AuthSession, Clock};
