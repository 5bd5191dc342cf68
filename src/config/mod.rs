//! Configuration management.
//!
//! Settings come from, in increasing priority: built-in defaults, an optional
//! TOML file, and `AUTOBOOK_*` environment variables (`__` separates the
//! section from the key, e.g. `AUTOBOOK_RETRY__MAX_RETRIES=3`).

mod file_config;

pub use file_config::{default_config_path, find_config_file, load_config, ConfigError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::AuthorMatch;
use crate::sources::Timeouts;
use crate::utils::{RetryConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "AUTOBOOK";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub mirrors: MirrorConfig,

    #[serde(default)]
    pub downloads: DownloadConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Catalogue search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Fiction catalogue base URL
    #[serde(default = "default_fiction_url")]
    pub fiction_url: String,

    /// Sci-tech catalogue base URL
    #[serde(default = "default_scitech_url")]
    pub scitech_url: String,

    /// Language filter sent with every search
    #[serde(default = "default_language")]
    pub language: String,

    /// Optional file format filter
    #[serde(default)]
    pub format: Option<String>,

    /// Strip `ISBN:` suffixes from titles
    #[serde(default = "default_true")]
    pub normalize_titles: bool,

    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fiction_url: default_fiction_url(),
            scitech_url: default_scitech_url(),
            language: default_language(),
            format: None,
            normalize_titles: true,
            timeout_seconds: default_search_timeout(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_fiction_url() -> String {
    crate::sources::LIBGEN_FICTION_URL.to_string()
}

fn default_scitech_url() -> String {
    crate::sources::LIBGEN_SCITECH_URL.to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_true() -> bool {
    true
}

fn default_search_timeout() -> u64 {
    30
}

/// Mirror resolution and probing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Mirror-metadata host
    #[serde(default = "default_mirror_url")]
    pub base_url: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: default_mirror_url(),
            connect_timeout_seconds: default_connect_timeout(),
            read_timeout_seconds: default_read_timeout(),
            probe_timeout_seconds: default_probe_timeout(),
        }
    }
}

impl MirrorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Timeouts for mirror-metadata lookups
    pub fn timeouts(&self) -> Timeouts {
        Timeouts::new(self.connect_timeout(), self.read_timeout())
    }
}

fn default_mirror_url() -> String {
    crate::sources::LIBGEN_MIRROR_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_probe_timeout() -> u64 {
    5
}

/// Download settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Where finished books end up
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Where downloads are written before being moved to `destination`
    #[serde(default = "default_staging")]
    pub staging: PathBuf,

    /// Compare the downloaded file's MD5 with the record's content id
    #[serde(default)]
    pub verify_checksum: bool,

    /// Upper bound for a single file transfer
    #[serde(default = "default_download_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            staging: default_staging(),
            verify_checksum: false,
            timeout_seconds: default_download_timeout(),
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_destination() -> PathBuf {
    PathBuf::from("./books")
}

fn default_staging() -> PathBuf {
    PathBuf::from("./books/.staging")
}

fn default_download_timeout() -> u64 {
    600
}

/// Retry settings for the acquisition loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_seconds: default_delay_seconds(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .max_retries(self.max_retries)
            .delay(Duration::from_secs(self.delay_seconds))
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_delay_seconds() -> u64 {
    DEFAULT_RETRY_DELAY.as_secs()
}

/// Candidate matching settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub author_policy: AuthorMatch,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
