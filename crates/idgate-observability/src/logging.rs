//! Structured logging setup
//!
//! Installs a global `tracing` subscriber. The filter comes from
//! [`LoggingConfig::level`], falling back to `IDGATE_LOG_LEVEL` and then
//! `info`. Host processes that install their own subscriber can skip this.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variable consulted when no level is configured
pub const LOG_LEVEL_ENV: &str = "IDGATE_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `debug`, `idgate_egress=trace,info`, ...)
    #[serde(default)]
    pub level: Option<String>,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Include the module path of each event
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

fn default_with_target() -> bool {
    true
}

impl LoggingConfig {
    /// Filter directive after applying the env fallback
    pub fn resolved_level(&self) -> String {
        self.level
            .clone()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| {
                std::env::var(LOG_LEVEL_ENV)
                    .ok()
                    .filter(|l| !l.trim().is_empty())
            })
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn build_filter(&self) -> Result<EnvFilter, LoggingError> {
        let directive = self.resolved_level();
        EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
            filter: directive,
            message: e.to_string(),
        })
    }
}

/// Install the global subscriber.
///
/// Calling this twice returns [`LoggingError::AlreadyInitialized`]; the
/// first subscriber stays in place.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.build_filter()?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    installed.map_err(|_| LoggingError::AlreadyInitialized)
}
