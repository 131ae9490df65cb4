//! Logging setup
//!
//! Structured logging via `tracing`. Library code only emits events; a
//! hosting process picks the subscriber by calling [`init`] once.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter: trace, debug, info, warn, error, off
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format: json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// Colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            color: default_true(),
        }
    }
}

/// Install the global subscriber. Returns quietly if one is already set so
/// tests can call it repeatedly.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.format == "json" {
        let _ = Registry::default()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = Registry::default()
            .with(filter)
            .with(fmt::layer().with_ansi(config.color))
            .try_init();
    }
}

/// Initialize with defaults, honoring `RUST_LOG` when present.
pub fn init_default() {
    init(&LoggingConfig::default());
}
