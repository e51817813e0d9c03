// Logging configuration
pub mod config;

// Structured logging
pub mod logging;

// Session metrics
pub mod metrics;

pub use config::{LogConfig, LogFormat};
pub use logging::init_logging;
