//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over [`LoggingConfig::level`] when set. JSON output
//! flattens event fields and includes the current span so auth and sync
//! spans (`auth.initialize`, `sync.full`, ...) stay attached to their events.

use chatlab_domain::{ChatLabError, LoggingConfig, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Filter from `RUST_LOG`, else `config.level`
///
/// # Errors
/// Returns `ChatLabError::Config` if `config.level` is not a valid directive.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ChatLabError::Config(format!("Invalid log level '{}': {e}", config.level)))
}

/// Install the global subscriber
///
/// # Errors
/// Returns `ChatLabError::Config` for an invalid filter, or
/// `ChatLabError::Internal` if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = Registry::default().with(filter);

    let installed = if config.json {
        let json =
            fmt::layer().json().with_target(false).with_current_span(true).flatten_event(true);
        registry.with(json).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|e| ChatLabError::Internal(format!("Tracing already initialised: {e}")))
}
