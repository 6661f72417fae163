// Structured logging setup
use serde::{Serialize, Deserialize};
use tracing::info;
use tracing_subscriber::{
    fmt::time::UtcTime,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Registry,
};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub enable_colors: bool,
    pub enable_timestamps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            enable_colors: true,
            enable_timestamps: true,
        }
    }
}

/// Logging manager
pub struct LoggingManager {
    config: LoggingConfig,
}

impl LoggingManager {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Install the global subscriber. `RUST_LOG` overrides the configured level.
    ///
    /// Fails if a global subscriber is already set.
    pub fn initialize(&self) -> Result<(), TryInitError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        match self.config.format {
            LogFormat::Json => {
                Registry::default()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer()
                        .json()
                        .with_timer(UtcTime::rfc_3339()))
                    .try_init()?;
            },
            LogFormat::Compact => {
                Registry::default()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer()
                        .compact()
                        .with_ansi(self.config.enable_colors)
                        .with_timer(UtcTime::rfc_3339()))
                    .try_init()?;
            },
            LogFormat::Text => {
                if self.config.enable_timestamps {
                    Registry::default()
                        .with(filter)
                        .with(tracing_subscriber::fmt::layer()
                            .with_ansi(self.config.enable_colors)
                            .with_timer(UtcTime::rfc_3339()))
                        .try_init()?;
                } else {
                    Registry::default()
                        .with(filter)
                        .with(tracing_subscriber::fmt::layer()
                            .with_ansi(self.config.enable_colors)
                            .without_time())
                        .try_init()?;
                }
            }
        }

        info!("Logging system initialized with level: {}", self.config.level);
        Ok(())
    }
}
