pub mod analytics;
pub mod api;
pub mod config;
pub mod llm;
pub mod sheets;
pub mod storage;
pub mod utils;
