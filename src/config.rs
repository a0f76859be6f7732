//! Configuration file parser for ~/.config/newsfeed/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use crate::news::{
    FetchSettings, OrderBy, ParsePolicy, PipelineOptions, SearchQuery, DEFAULT_BASE_URL,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_SHOW_FIELDS,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `api_key` from the file.
pub const API_KEY_ENV: &str = "GUARDIAN_API_KEY";

/// Key used when none is configured; the API serves a rate-limited developer tier for it.
const FALLBACK_API_KEY: &str = "test";

/// Largest page the search endpoint accepts.
const MAX_PAGE_SIZE: u32 = 200;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The `Debug` impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search endpoint.
    pub base_url: String,

    /// API key (the `GUARDIAN_API_KEY` env var takes precedence).
    pub api_key: Option<String>,

    /// Topic searched when no search text is given.
    pub topic: String,

    /// Results per request (1-200).
    pub page_size: u32,

    pub order_by: OrderBy,

    /// Comma-separated `show-fields` value.
    pub show_fields: String,

    pub connect_timeout_ms: u64,

    pub read_timeout_ms: u64,

    /// `"strict"` aborts on a malformed result; `"skip-invalid"` drops it.
    pub parse_policy: ParsePolicy,

    /// Thumbnails downloaded at once. 1 = one after another.
    pub thumbnail_concurrency: usize,

    /// Whether to download thumbnails at all.
    pub fetch_thumbnails: bool,

    /// Re-run the search every N seconds. 0 = load once.
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            topic: "technology".to_string(),
            page_size: 10,
            order_by: OrderBy::Newest,
            show_fields: DEFAULT_SHOW_FIELDS.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            parse_policy: ParsePolicy::Strict,
            thumbnail_concurrency: 4,
            fetch_thumbnails: true,
            refresh_interval_secs: 0,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("topic", &self.topic)
            .field("page_size", &self.page_size)
            .field("order_by", &self.order_by)
            .field("show_fields", &self.show_fields)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("parse_policy", &self.parse_policy)
            .field("thumbnail_concurrency", &self.thumbnail_concurrency)
            .field("fetch_thumbnails", &self.fetch_thumbnails)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 12] = [
        "base_url",
        "api_key",
        "topic",
        "page_size",
        "order_by",
        "show_fields",
        "connect_timeout_ms",
        "read_timeout_ms",
        "parse_policy",
        "thumbnail_concurrency",
        "fetch_thumbnails",
        "refresh_interval_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), topic = %config.topic, "Loaded configuration");
        Ok(config)
    }

    /// Checks values serde cannot range-check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.thumbnail_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "thumbnail_concurrency must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// API key to send: `env_key` if set and non-empty, else the file's, else the developer key.
    pub fn api_key_with_env(&self, env_key: Option<String>) -> SecretString {
        env_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .map(SecretString::from)
            .unwrap_or_else(|| SecretString::from(FALLBACK_API_KEY))
    }

    /// API key with the `GUARDIAN_API_KEY` override applied.
    pub fn resolved_api_key(&self) -> SecretString {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            ..FetchSettings::default()
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            parse_policy: self.parse_policy,
            thumbnail_concurrency: self.thumbnail_concurrency,
            resolve_thumbnails: self.fetch_thumbnails,
        }
    }

    pub fn search_query(&self, api_key: SecretString, search: Option<String>) -> SearchQuery {
        SearchQuery {
            api_key,
            page_size: self.page_size,
            order_by: self.order_by,
            show_fields: self.show_fields.clone(),
            topic: self.topic.clone(),
            search,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
