//! Event names and storage keys shared with the ingestion backend

/// Event names
pub mod events {
    pub const ADDON_OPENED: &str = "addon_opened";
    pub const ADDON_INSTALLED: &str = "addon_installed";
    pub const SIDEBAR_OPENED: &str = "sidebar_opened";
    pub const MENU_ACTION: &str = "menu_action";
    pub const API_KEY_SET: &str = "api_key_set";
    pub const FUNCTION_CALL: &str = "function_call";
    pub const ERROR: &str = "error";
    pub const ANALYTICS_OPT_CHANGE: &str = "analytics_opt_change";
}

/// User property holding the persistent distinct id
pub const USER_UUID_PROPERTY: &str = "sheetsai_user_uuid";
/// User property holding `"true"` when the user opted out
pub const OPT_OUT_PROPERTY: &str = "analytics_opt_out";

pub const QUEUE_CACHE_KEY: &str = "analytics_queue";
pub const FLUSH_LOCK_KEY: &str = "analytics_flush_lock";

pub const BATCH_ENDPOINT: &str = "/batch/";

pub const LIB_NAME: &str = "sheets-ai-addon";
pub const LIB_VERSION: &str = "1.0";
