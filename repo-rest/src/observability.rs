//! Tracing setup

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Build the filter from `service.log_level`, falling back to `info`
///
/// The level string accepts full `EnvFilter` directives such as
/// `info,repo_rest::dispatch=debug`.
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|e| {
        eprintln!(
            "invalid log level '{}' ({e}), using info",
            config.service.log_level
        );
        EnvFilter::new("info")
    })
}

/// Install the global JSON subscriber
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(config))
        .try_init()
        .map_err(|e| crate::error::Error::Internal(format!("failed to install tracing: {e}")))?;

    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        "Tracing initialized"
    );

    Ok(())
}
