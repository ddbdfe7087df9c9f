//! Structured logging setup
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the configured level.
//!
//! ```no_run
//! use buildinit::logging::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::default());
//! tracing::info!(build = ":", "Build started");
//! ```

use std::env;
use std::io;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::LoggingSection;

static INIT: Once = Once::new();

/// Configuration for logging initialization
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Minimum level for this crate's events
    pub level: Level,

    /// Emit JSON lines instead of human-readable output
    pub use_json: bool,

    /// Include the module target in each line
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            use_json: false,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Builds the configuration from the `[logging]` config section
    ///
    /// Each `--verbose` raises the level by one step; two or more also turn on
    /// module targets.
    pub fn from_section(section: &LoggingSection, verbose: u8) -> Self {
        let base = parse_level(&section.level);
        let level = match verbose {
            0 => base,
            1 => raise(base),
            _ => Level::TRACE,
        };
        Self {
            level,
            use_json: section.json,
            include_target: verbose >= 2,
        }
    }
}

fn raise(level: Level) -> Level {
    match level {
        Level::ERROR => Level::WARN,
        Level::WARN => Level::INFO,
        Level::INFO => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Parses a log level, case-insensitively
///
/// Unknown names fall back to WARN.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to WARN. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::WARN
        }
    }
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(format!("warn,buildinit={}", config.level))
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = env_filter(&config);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_target(config.include_target),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(config.include_target),
                )
                .init();
        }
    });
}
