//! # Structured Logging
//!
//! Initialises the global `tracing` subscriber for the console. Output is either
//! JSON lines or human readable text, filtered by the configured level and any
//! `RUST_LOG` directives.

use tracing::{info, warn, Level};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::observability::config::{LogConfig, LogFormat};

/// Parse a configured level, falling back to `INFO` for unknown values
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the tracing subscriber
///
/// A second call is tolerated: the existing subscriber is kept and a warning is logged.
pub fn init_logging(config: &LogConfig) {
    let level = parse_level(&config.level);
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
        return;
    }

    info!(level = %level, format = ?config.format, "Structured logging initialized");
}
