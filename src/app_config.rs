use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::language_utils;

/// Highest accepted `translation.retry_count`
pub const MAX_RETRY_COUNT: u32 = 10;

/// Application configuration module
/// This module handles the worker configuration including loading,
/// validating and saving configuration settings.
/// Represents the worker configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Queue polling settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Chunking and dispatch settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Model catalog settings
    #[serde(default)]
    pub models: ModelsConfig,

    /// Artifact storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Queue consumer configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// SQLite queue database path; the user data directory is used when empty
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Seconds a received message stays hidden from other consumers
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Maximum seconds a single poll waits for a message
    #[serde(default = "default_poll_wait_secs")]
    pub poll_wait_secs: u64,

    /// Seconds to sleep after an empty poll
    #[serde(default = "default_idle_backoff_secs")]
    pub idle_backoff_secs: u64,

    /// Receives after which a message is dead-lettered
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            visibility_timeout_secs: default_visibility_timeout_secs(),
            poll_wait_secs: default_poll_wait_secs(),
            idle_backoff_secs: default_idle_backoff_secs(),
            max_receive_count: default_max_receive_count(),
        }
    }
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.poll_wait_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_secs(self.idle_backoff_secs)
    }
}

/// Chunking and translation dispatch configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Inference server base URL
    #[serde(default = "default_inference_endpoint")]
    pub inference_endpoint: String,

    /// Maximum tokens per chunk
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,

    /// Maximum concurrent translation calls per job
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Timeout for a single model call, in seconds
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,

    /// Retry count for transient backend failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Join hard-wrapped lines into paragraphs before chunking
    #[serde(default = "default_true")]
    pub unwrap_paragraphs: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            inference_endpoint: default_inference_endpoint(),
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            concurrent_requests: default_concurrent_requests(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            unwrap_paragraphs: true,
        }
    }
}

impl TranslationConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}

/// Model catalog configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelsConfig {
    /// File with `pair=model-name` lines
    #[serde(default = "default_model_names_path")]
    pub model_names_path: PathBuf,

    /// Directory holding converted model weights
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    /// Prefix added to every model name from the mapping file
    #[serde(default = "default_model_prefix")]
    pub model_prefix: String,

    /// Identifier of the any-to-any multilingual model
    #[serde(default = "default_multilingual_model")]
    pub multilingual_model: String,

    /// Pairs that always use the multilingual model
    #[serde(default = "default_multilingual_overrides")]
    pub multilingual_overrides: Vec<String>,

    /// Languages offered to clients and eligible for pivoting
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            model_names_path: default_model_names_path(),
            model_dir: default_model_dir(),
            model_prefix: default_model_prefix(),
            multilingual_model: default_multilingual_model(),
            multilingual_overrides: default_multilingual_overrides(),
            supported_languages: default_supported_languages(),
        }
    }
}

/// Artifact storage configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the local object store
    #[serde(default = "default_storage_root")]
    pub root_dir: PathBuf,

    /// Bucket used when a message names none
    #[serde(default = "default_bucket")]
    pub default_bucket: String,

    /// Base URL download links are built on
    #[serde(default = "default_link_base_url")]
    pub link_base_url: String,

    /// Secret used to sign download links
    #[serde(default = "String::new")]
    pub link_secret: String,

    /// Days a download link stays valid
    #[serde(default = "default_link_expiry_days")]
    pub link_expiry_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
            default_bucket: default_bucket(),
            link_base_url: default_link_base_url(),
            link_secret: String::new(),
            link_expiry_days: default_link_expiry_days(),
        }
    }
}

impl StorageConfig {
    pub fn link_expiry(&self) -> Duration {
        Duration::from_secs(u64::from(self.link_expiry_days) * 24 * 60 * 60)
    }
}

/// How notifications leave the worker
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    // @method: Write .eml files into an outbox directory for a mail relay
    #[default]
    Outbox,
    // @method: POST JSON to a webhook
    Webhook,
}

/// Notification configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Delivery method
    #[serde(default)]
    pub method: NotificationMethod,

    /// Outbox directory for the outbox method
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    /// Webhook URL for the webhook method
    #[serde(default = "String::new")]
    pub webhook_url: String,

    /// Sender address
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Tell the recipient when their job failed for good
    #[serde(default = "default_true")]
    pub notify_on_failure: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            method: NotificationMethod::default(),
            outbox_dir: default_outbox_dir(),
            webhook_url: String::new(),
            sender: default_sender(),
            notify_on_failure: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_poll_wait_secs() -> u64 {
    1
}

fn default_idle_backoff_secs() -> u64 {
    2
}

fn default_max_receive_count() -> u32 {
    5
}

fn default_inference_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_max_tokens_per_chunk() -> usize {
    512
}

fn default_concurrent_requests() -> usize {
    8
}

fn default_chunk_timeout_secs() -> u64 {
    120
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_true() -> bool {
    true
}

fn default_model_names_path() -> PathBuf {
    PathBuf::from("model_names.cfg")
}

fn default_model_dir() -> String {
    "models".to_string()
}

fn default_model_prefix() -> String {
    "ct2fast-".to_string()
}

fn default_multilingual_model() -> String {
    "michaelfeil/ct2fast-m2m100_1.2B".to_string()
}

fn default_multilingual_overrides() -> Vec<String> {
    ["en-ko", "en-th", "en-ja"].iter().map(|s| s.to_string()).collect()
}

fn default_supported_languages() -> Vec<String> {
    language_utils::SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, _)| code.to_string())
        .collect()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

fn default_bucket() -> String {
    "books".to_string()
}

fn default_link_base_url() -> String {
    "http://localhost:8080/download".to_string()
}

fn default_link_expiry_days() -> u32 {
    7
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

fn default_sender() -> String {
    "noreply@booktranslate.local".to_string()
}

impl Config {
    /// Load the configuration from a JSON file, writing defaults when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        log::warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.queue.visibility_timeout_secs == 0 {
            return Err(anyhow!("queue.visibility_timeout_secs must be greater than zero"));
        }
        if self.queue.max_receive_count == 0 {
            return Err(anyhow!("queue.max_receive_count must be greater than zero"));
        }
        if self.translation.max_tokens_per_chunk == 0 {
            return Err(anyhow!("translation.max_tokens_per_chunk must be greater than zero"));
        }
        if self.translation.concurrent_requests == 0 {
            return Err(anyhow!("translation.concurrent_requests must be greater than zero"));
        }
        if self.translation.retry_count > MAX_RETRY_COUNT {
            return Err(anyhow!(
                "translation.retry_count must be at most {}, got {}",
                MAX_RETRY_COUNT,
                self.translation.retry_count
            ));
        }
        if self.translation.chunk_timeout_secs == 0 {
            return Err(anyhow!("translation.chunk_timeout_secs must be greater than zero"));
        }
        Url::parse(&self.translation.inference_endpoint)
            .with_context(|| format!("Invalid inference endpoint: {}", self.translation.inference_endpoint))?;

        if self.models.supported_languages.is_empty() {
            return Err(anyhow!("models.supported_languages must not be empty"));
        }
        for code in &self.models.supported_languages {
            language_utils::get_language_name(code)
                .with_context(|| format!("Unsupported language in models.supported_languages: {}", code))?;
        }
        for pair in &self.models.multilingual_overrides {
            let (source, target) = pair
                .split_once('-')
                .ok_or_else(|| anyhow!("Override '{}' is not of the form 'xx-yy'", pair))?;
            language_utils::get_language_name(source)?;
            language_utils::get_language_name(target)?;
        }

        if self.storage.default_bucket.trim().is_empty() {
            return Err(anyhow!("storage.default_bucket must not be empty"));
        }
        if self.storage.link_expiry_days == 0 {
            return Err(anyhow!("storage.link_expiry_days must be greater than zero"));
        }
        Url::parse(&self.storage.link_base_url)
            .with_context(|| format!("Invalid link base URL: {}", self.storage.link_base_url))?;

        if self.notification.method == NotificationMethod::Webhook {
            Url::parse(&self.notification.webhook_url)
                .with_context(|| format!("Invalid webhook URL: '{}'", self.notification.webhook_url))?;
        }

        Ok(())
    }

    /// Resolve the queue database path, falling back to the user data directory
    pub fn queue_database_path(&self) -> Result<PathBuf> {
        match &self.queue.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::database::DatabaseConnection::default_database_path(),
        }
    }
}
