/*!
 * Tests for configuration loading
 */

use std::time::Duration;

use anyhow::Result;
use book_translator::app_config::{Config, LogLevel, MAX_RETRY_COUNT, NotificationMethod};
use log::LevelFilter;

#[test]
fn test_loadOrCreate_withExistingPartialFile_shouldKeepValuesAndFillDefaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{
            "queue": { "visibility_timeout_secs": 90, "database_path": "/var/lib/bt/queue.db" },
            "storage": { "link_expiry_days": 2 },
            "notification": { "method": "webhook", "webhook_url": "https://hooks.example.com/n" }
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.queue.visibility_timeout(), Duration::from_secs(90));
    assert_eq!(config.queue.max_receive_count, 5);
    assert_eq!(config.queue_database_path()?, std::path::PathBuf::from("/var/lib/bt/queue.db"));
    assert_eq!(config.storage.link_expiry(), Duration::from_secs(2 * 24 * 60 * 60));
    assert_eq!(config.storage.default_bucket, "books");
    assert_eq!(config.notification.method, NotificationMethod::Webhook);
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}

#[test]
fn test_validate_withUnknownSupportedLanguage_shouldFail() {
    let mut config = Config::default();
    config.models.supported_languages.push("xx".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withZeroVisibilityTimeout_shouldFail() {
    let mut config = Config::default();
    config.queue.visibility_timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_withExcessiveRetryCount_shouldFail() {
    let mut config = Config::default();
    config.translation.retry_count = MAX_RETRY_COUNT;
    assert!(config.validate().is_ok());

    config.translation.retry_count = 100;
    assert!(config.validate().is_err());
}

#[test]
fn test_logLevel_shouldMapToLevelFilter() {
    assert_eq!(LevelFilter::from(&LogLevel::Error), LevelFilter::Error);
    assert_eq!(LevelFilter::from(&LogLevel::Info), LevelFilter::Info);
    assert_eq!(LevelFilter::from(&LogLevel::Trace), LevelFilter::Trace);
}
