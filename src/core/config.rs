//! # Configuration Module
//!
//! Configuration for the debug console: where the management API lives, how the
//! debug event is polled, and how logs are emitted.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Human readable durations (`1s`, `500ms`) through `humantime-serde`
//! - Environment variable override support (`DEBUG_CONSOLE_*`)
//! - Validation that reports every problem at once

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::error::{DebugError, DebugResult};
use crate::observability::config::LogConfig;

/// Main console configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConsoleConfig {
    /// Management API connection settings
    pub management: ManagementConfig,

    /// Debug event polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,
}

impl DebugConsoleConfig {
    /// Build a configuration pointing at `base_url` with default polling and logging
    pub fn new<S: Into<String>>(base_url: S, api_version: ApiVersion) -> Self {
        Self {
            management: ManagementConfig {
                base_url: base_url.into(),
                api_version,
                token: None,
                request_timeout: default_request_timeout(),
            },
            polling: PollingConfig::default(),
            logging: LogConfig::default(),
        }
    }

    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> DebugResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DebugError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: DebugConsoleConfig = serde_yaml::from_str(&content)
            .map_err(|e| DebugError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> DebugResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DebugError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: DebugConsoleConfig = serde_json::from_str(&content)
            .map_err(|e| DebugError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern `DEBUG_CONSOLE_<FIELD>`, for example
    /// `DEBUG_CONSOLE_POLL_TIMEOUT=30s`.
    pub fn apply_env_overrides(&mut self) -> DebugResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> DebugResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DEBUG_CONSOLE_BASE_URL") {
            self.management.base_url = url;
        }

        if let Some(version) = lookup("DEBUG_CONSOLE_API_VERSION") {
            self.management.api_version = version.parse()?;
        }

        if let Some(token) = lookup("DEBUG_CONSOLE_TOKEN") {
            self.management.token = Some(token);
        }

        if let Some(interval) = lookup("DEBUG_CONSOLE_POLL_INTERVAL") {
            self.polling.interval = humantime::parse_duration(&interval).map_err(|e| {
                DebugError::config(format!("Invalid DEBUG_CONSOLE_POLL_INTERVAL: {}", e))
            })?;
        }

        if let Some(timeout) = lookup("DEBUG_CONSOLE_POLL_TIMEOUT") {
            self.polling.timeout = humantime::parse_duration(&timeout).map_err(|e| {
                DebugError::config(format!("Invalid DEBUG_CONSOLE_POLL_TIMEOUT: {}", e))
            })?;
        }

        if let Some(level) = lookup("DEBUG_CONSOLE_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Configuration validation with detailed error messages
    pub fn validate(&self) -> DebugResult<()> {
        let mut errors = Vec::new();

        match Url::parse(&self.management.base_url) {
            Ok(url) if url.cannot_be_a_base() => {
                errors.push(format!(
                    "management.base_url cannot be used as a base URL: {}",
                    self.management.base_url
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!(
                "management.base_url is not a valid URL ({}): {}",
                self.management.base_url, e
            )),
        }

        if let Some(token) = &self.management.token {
            if token.trim().is_empty() {
                errors.push("management.token cannot be blank".to_string());
            }
        }

        if self.management.request_timeout.is_zero() {
            errors.push("management.request_timeout must be greater than 0".to_string());
        }

        if self.polling.interval.is_zero() {
            errors.push("polling.interval must be greater than 0".to_string());
        }

        if self.polling.timeout.is_zero() {
            errors.push("polling.timeout must be greater than 0".to_string());
        }

        if self.polling.interval > self.polling.timeout {
            errors.push(format!(
                "polling.interval ({}) cannot exceed polling.timeout ({})",
                humantime::format_duration(self.polling.interval),
                humantime::format_duration(self.polling.timeout)
            ));
        }

        if let Some(warning) = self.polling.slow_request_warning {
            if warning.is_zero() {
                errors.push("polling.slow_request_warning must be greater than 0".to_string());
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        if !errors.is_empty() {
            return Err(DebugError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}

/// Management API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementConfig {
    /// Environment base URL, e.g. `https://apim.example.com/management/organizations/DEFAULT/environments/DEFAULT`
    pub base_url: String,

    /// API definition version, which decides the debug submission endpoint
    #[serde(default)]
    pub api_version: ApiVersion,

    /// Optional bearer token sent with every call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Timeout applied to each HTTP call
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

/// API definition version of the debugged API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V2,
    V4,
}

impl std::str::FromStr for ApiVersion {
    type Err = DebugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v2" | "2" => Ok(ApiVersion::V2),
            "v4" | "4" => Ok(ApiVersion::V4),
            other => Err(DebugError::config(format!("Unknown API version: {}", other))),
        }
    }
}

/// Debug event polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between two reads of the debug event
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub interval: Duration,

    /// Maximum wait before the session is reported as timed out
    #[serde(with = "humantime_serde", default = "default_poll_timeout")]
    pub timeout: Duration,

    /// Elapsed time after which the session is flagged as slow (null disables it)
    #[serde(with = "humantime_serde", default = "default_slow_request_warning")]
    pub slow_request_warning: Option<Duration>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
            slow_request_warning: default_slow_request_warning(),
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_slow_request_warning() -> Option<Duration> {
    Some(Duration::from_secs(20))
}
