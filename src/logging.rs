//! Structured logging setup
//!
//! Library code only emits `tracing` events. Binaries and tests that want to
//! see them call [`init`].

use tracing_subscriber::EnvFilter;

use crate::errors::{PulseError, Result};

/// Install a global `fmt` subscriber
///
/// `RUST_LOG` wins over `level` when set. Calling this again once a global
/// subscriber exists does nothing.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| PulseError::Config(format!("Invalid log filter '{}': {}", level, e)))?;

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
    Ok(())
}
