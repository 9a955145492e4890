pub mod app_config;

pub use app_config::{AnalyticsSettings, AppConfig, ConfigError, FlushMode, OpenAiSettings};
