//! Configuration of the root binary: the shared stage configuration plus
//! operator-facing logging knobs.

use std::env;

use shared::config::{AppConfig, ConfigError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Stage configuration shared with the library crates.
    pub app: AppConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter when RUST_LOG is unset (default: info)
    pub level: String,

    /// Output format: "json" (default), "compact" or "pretty"
    pub format: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            app: AppConfig::from_env(),
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                format: env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.app.validate()
    }
}
