use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::retry::DEFAULT_MAX_RETRIES;
use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_ANALYTICS_BASE_URL: &str = "https://e.trysheetsai.com";
const DEFAULT_BATCH_SIZE: usize = 20;
const DEFAULT_FLUSH_DELAY_SECS: u64 = 20;
const DEFAULT_QUEUE_TTL_SECS: u64 = 21600;
const DEFAULT_LOCK_TTL_SECS: u64 = 60;
const DEFAULT_ANALYTICS_MAX_RETRIES: u32 = 1;
const DEFAULT_DATA_DIR: &str = ".sheets-ai";
const DEFAULT_LOG_DIR: &str = "logs";

/// How a delayed flush runs once the flush lock is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// The tracking call sleeps for the delay, then flushes before returning
    #[default]
    Inline,
    /// A spawned task sleeps, then flushes
    Background,
}

impl FromStr for FlushMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(FlushMode::Inline),
            "background" => Ok(FlushMode::Background),
            other => Err(ConfigError::InvalidFlushMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// Fallback key when the user has not stored one
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub max_retries: u32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    pub base_url: String,
    /// Batch ingestion key; flushes are skipped without it
    pub project_key: Option<String>,
    /// Queue length that triggers an immediate flush
    pub batch_size: usize,
    pub flush_delay: Duration,
    /// Always longer than `flush_delay`
    pub lock_ttl: Duration,
    pub queue_ttl: Duration,
    pub flush_mode: FlushMode,
    pub max_retries: u32,
    pub user_email: Option<String>,
}

impl AnalyticsSettings {
    /// Lock expiry for a given flush delay, saturating at `Duration::MAX`
    pub fn lock_ttl_for(flush_delay: Duration) -> Duration {
        let doubled = flush_delay.checked_mul(2).unwrap_or(Duration::MAX);
        Duration::from_secs(DEFAULT_LOCK_TTL_SECS).max(doubled)
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        let flush_delay = Duration::from_secs(DEFAULT_FLUSH_DELAY_SECS);
        Self {
            base_url: DEFAULT_ANALYTICS_BASE_URL.to_string(),
            project_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_delay,
            lock_ttl: Self::lock_ttl_for(flush_delay),
            queue_ttl: Duration::from_secs(DEFAULT_QUEUE_TTL_SECS),
            flush_mode: FlushMode::default(),
            max_retries: DEFAULT_ANALYTICS_MAX_RETRIES,
            user_email: None,
        }
    }
}

/// Application settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAiSettings,
    pub analytics: AnalyticsSettings,
    /// Root for the file-backed stores
    pub data_dir: PathBuf,
    pub log_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiSettings::default(),
            analytics: AnalyticsSettings::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            log_dir: DEFAULT_LOG_DIR.to_string(),
        }
    }
}

impl AppConfig {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = AppConfig::default();

        let openai = OpenAiSettings {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
            default_model: var("OPENAI_DEFAULT_MODEL").unwrap_or(defaults.openai.default_model),
            max_retries: parse_var("HTTP_MAX_RETRIES", var("HTTP_MAX_RETRIES"), DEFAULT_MAX_RETRIES)?,
        };
        if openai.api_key.is_none() {
            tracing::debug!("OPENAI_API_KEY not set, a stored user key is required");
        }

        let batch_size = parse_var(
            "ANALYTICS_BATCH_SIZE",
            var("ANALYTICS_BATCH_SIZE"),
            DEFAULT_BATCH_SIZE,
        )?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidNumber {
                name: "ANALYTICS_BATCH_SIZE".to_string(),
                value: "0".to_string(),
            });
        }
        let flush_delay = Duration::from_secs(parse_var(
            "ANALYTICS_FLUSH_DELAY_SECS",
            var("ANALYTICS_FLUSH_DELAY_SECS"),
            DEFAULT_FLUSH_DELAY_SECS,
        )?);
        let queue_ttl = Duration::from_secs(parse_var(
            "ANALYTICS_QUEUE_TTL_SECS",
            var("ANALYTICS_QUEUE_TTL_SECS"),
            DEFAULT_QUEUE_TTL_SECS,
        )?);
        let flush_mode = match var("ANALYTICS_FLUSH_MODE") {
            Some(mode) => mode.parse()?,
            None => FlushMode::default(),
        };

        let analytics = AnalyticsSettings {
            base_url: var("ANALYTICS_BASE_URL").unwrap_or(defaults.analytics.base_url),
            project_key: var("PH_PROJECT_KEY"),
            batch_size,
            flush_delay,
            lock_ttl: AnalyticsSettings::lock_ttl_for(flush_delay),
            queue_ttl,
            flush_mode,
            max_retries: defaults.analytics.max_retries,
            user_email: var("SHEETS_AI_USER_EMAIL"),
        };

        Ok(Self {
            openai,
            analytics,
            data_dir: var("SHEETS_AI_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            log_dir: var("LOG_DIR").unwrap_or(defaults.log_dir),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: String, value: String },
    #[error("ANALYTICS_FLUSH_MODE must be inline or background, got {0:?}")]
    InvalidFlushMode(String),
}
