//! Global tracing subscriber setup.

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{AppError, Result, config::LogConfig};

/// Install the global subscriber. `RUST_LOG` wins over `config.level`.
///
/// Fails if a subscriber is already installed or the level directive
/// does not parse.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = env_filter(config)?;

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::ConfigError(format!("failed to install tracing subscriber: {e}")))
}

fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| AppError::ConfigError(format!("invalid log level \"{}\": {e}", config.level)))
}
