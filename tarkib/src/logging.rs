//! Tracing setup for applications embedding the container.
//!
//! The container only emits `tracing` events; installing a subscriber is up
//! to the binary. This helper installs a fmt subscriber filtered by the
//! `TARKIB_LOG` environment variable.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "TARKIB_LOG";

/// Builds the filter from `TARKIB_LOG`, or `default_filter` when unset or
/// invalid.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs a global fmt subscriber.
///
/// ```rust,no_run
/// tarkib::logging::init_tracing("tarkib_container=debug").ok();
/// ```
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(fmt::layer().with_target(true))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        let _ = init_tracing("warn");
        assert!(init_tracing("warn").is_err());
    }
}
