//! Request middleware
//!
//! Composable pieces applied to a request before it is dispatched.

pub mod auth;

pub use auth::{AuthScheme, Directive};
