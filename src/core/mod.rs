//! Core functionality: error types and console configuration.

pub mod config;
pub mod error;

pub use config::{ApiVersion, DebugConsoleConfig, ManagementConfig, PollingConfig};
pub use error::{DebugError, DebugResult};
