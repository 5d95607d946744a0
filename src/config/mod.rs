//! Configuration

#[allow(clippy::module_inception)]
pub mod config;

pub use config::{ClientConfig, USER_AGENT_STRING};
