use tracing::error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A required API key or project key is absent
    #[error("{0} is not configured")]
    MissingCredential(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("tool error: {0}")]
    ToolError(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Message shown to the end user (returned to the cell)
    pub fn message(&self) -> String {
        match self {
            AppError::Api(ApiError::RequestFailed { attempts, .. }) => {
                format!("the remote API did not respond after {} attempts", attempts)
            }
            AppError::Api(e) => e.to_string(),
            AppError::Storage(_) => "settings could not be saved".to_string(),
            AppError::MissingCredential(name) => {
                format!("please configure your {} first", name)
            }
            AppError::InvalidResponse(msg) => format!("unexpected API response: {}", msg),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::ToolError(msg) => format!("tool call failed: {}", msg),
            AppError::InternalError(_) => "something went wrong, please try again".to_string(),
        }
    }

    /// Error code attached to telemetry records
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Api(ApiError::RequestFailed { .. }) => "API_001",
            AppError::Api(_) => "API_002",
            AppError::Storage(_) => "STORE_001",
            AppError::MissingCredential(_) => "AUTH_001",
            AppError::InvalidResponse(_) => "LLM_001",
            AppError::ValidationError(_) => "COMMON400",
            AppError::ToolError(_) => "LLM_002",
            AppError::InternalError(_) => "COMMON500",
        }
    }

    /// Log the error with its code, then return it
    pub fn logged(self) -> Self {
        error!(code = self.error_code(), error = %self, "Operation failed");
        self
    }
}

/// Convenience constructors
impl AppError {
    pub fn missing_credential(name: impl Into<String>) -> Self {
        AppError::MissingCredential(name.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        AppError::InvalidResponse(msg.into())
    }

    pub fn validation_error(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidResponse(e.to_string())
    }
}
