//! # Configuration Loading Tests

use std::io::Write;
use std::time::Duration;

use policy_debugger::core::config::{ApiVersion, DebugConsoleConfig};
use policy_debugger::observability::LogFormat;
use policy_debugger::DebugError;
use tempfile::NamedTempFile;

fn write_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_load_yaml_config() {
    let file = write_config(
        ".yaml",
        r#"
management:
  base_url: "https://apim.example.com/management/organizations/DEFAULT/environments/DEFAULT"
  api_version: v4
  token: "secret"
  request_timeout: 5s
polling:
  interval: 500ms
  timeout: 20s
logging:
  level: debug
  format: json
"#,
    );

    let config = DebugConsoleConfig::load_from_file(file.path()).await.unwrap();
    assert_eq!(config.management.api_version, ApiVersion::V4);
    assert_eq!(config.management.token.as_deref(), Some("secret"));
    assert_eq!(config.management.request_timeout, Duration::from_secs(5));
    assert_eq!(config.polling.interval, Duration::from_millis(500));
    assert_eq!(config.polling.timeout, Duration::from_secs(20));
    assert_eq!(
        config.polling.slow_request_warning,
        Some(Duration::from_secs(20))
    );
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[tokio::test]
async fn test_load_json_config() {
    let file = write_config(
        ".json",
        r#"{
            "management": { "base_url": "http://localhost:8083/management" },
            "polling": { "slow_request_warning": null }
        }"#,
    );

    let config = DebugConsoleConfig::load_from_json(file.path()).await.unwrap();
    assert_eq!(config.management.api_version, ApiVersion::V2);
    assert_eq!(config.polling.interval, Duration::from_secs(1));
    assert_eq!(config.polling.slow_request_warning, None);
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let file = write_config(
        ".yaml",
        r#"
management:
  base_url: "http://localhost:8083/management"
polling:
  interval: 0s
"#,
    );

    let error = DebugConsoleConfig::load_from_file(file.path())
        .await
        .unwrap_err();
    assert!(matches!(error, DebugError::Configuration { .. }));
    assert!(error.to_string().contains("polling.interval must be greater than 0"));
}

#[tokio::test]
async fn test_missing_file() {
    let error = DebugConsoleConfig::load_from_file("/nonexistent/console.yaml")
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Failed to read config file"));
}
