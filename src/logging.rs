//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::{RelayError, Result};

/// Parse a filter directive such as `info` or `pcd_relay=debug,warn`.
pub fn filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| RelayError::Config {
        reason: format!("invalid log level '{}'", level),
        source: Some(Box::new(e)),
    })
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; `default_level` is used when it is unset or invalid.
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| filter(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
