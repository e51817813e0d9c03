//! # Error Handling Module
//!
//! This module provides the error type shared by the debug pipeline, the management
//! API client and the session orchestrator, built on the `thiserror` crate.
//!
//! ## Error Categories
//! - Configuration errors raised while loading or validating the console config
//! - Transport and backend errors raised by the management API client
//! - Payload errors raised when a debug event cannot be decoded
//! - Session outcomes that end a debug run without a result (failed, timed out, cancelled)
//!
//! Transport and backend failures are never fatal to a session: they are mapped to a
//! transient user-facing message through [`DebugError::user_message`] and the session
//! resets to an empty response.

use thiserror::Error;

/// Main result type used throughout the debugger
pub type DebugResult<T> = Result<T, DebugError>;

/// Notification shown when the debug request could not be sent or polled
pub const UNABLE_TO_TRY_MESSAGE: &str = "Unable to try the request, please try again";

/// Notification shown when the gateway reports the debug event as failed
pub const DEBUG_EVENT_FAILED_MESSAGE: &str = "Debug request failed, please check the gateway logs";

/// Notification shown when no result arrived within the polling window
pub const DEBUG_TIMEOUT_MESSAGE: &str =
    "The debug request timed out before the gateway returned a result";

/// Error types for the policy debugger
#[derive(Debug, Error, Clone)]
pub enum DebugError {
    /// Configuration-related errors (invalid config, missing files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The management API could not be reached
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The management API answered with a non-success status
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// The debug event payload could not be decoded
    #[error("Invalid debug payload: {message}")]
    InvalidPayload { message: String },

    /// The gateway reported the debug event as failed
    #[error("Debug event {event_id} failed")]
    EventFailed { event_id: String },

    /// No successful debug event was observed within the polling window
    #[error("Debug event not available after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// The session was cancelled by the user or superseded by a new request
    #[error("Debug session cancelled")]
    Cancelled,

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// I/O errors (file operations)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Internal errors for unexpected failures
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DebugError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a transport error with a custom message
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a backend error from a response status and body
    pub fn backend<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid payload error with a custom message
    pub fn invalid_payload<S: Into<String>>(message: S) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Transient notification text for this error
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EventFailed { .. } => DEBUG_EVENT_FAILED_MESSAGE,
            Self::Timeout { .. } => DEBUG_TIMEOUT_MESSAGE,
            _ => UNABLE_TO_TRY_MESSAGE,
        }
    }

    /// Get a string representation of the error type, used as a metrics label
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Transport { .. } => "transport_error",
            Self::Backend { .. } => "backend_error",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::EventFailed { .. } => "event_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Io { .. } => "io_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<std::io::Error> for DebugError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DebugError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for DebugError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for DebugError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Backend {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Transport {
                message: err.to_string(),
            },
        }
    }
}
