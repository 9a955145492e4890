/// Maximum number of response body characters kept in an error
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Failure of a single HTTP attempt before a response was received
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Why one attempt was counted as failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
}

impl AttemptError {
    pub fn status(status: u16, body: &str) -> Self {
        let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{}...", truncated)
        } else {
            body.to_string()
        };
        AttemptError::Status { status, body }
    }

    /// Status code when the attempt got a response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AttemptError::Status { status, .. } => Some(*status),
            AttemptError::Transport(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Every attempt failed; carries the last failure
    #[error("request to {endpoint} failed after {attempts} attempts: {last_error}")]
    RequestFailed {
        endpoint: String,
        attempts: u32,
        last_error: AttemptError,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_truncate_long_error_bodies() {
        let body = "e".repeat(2000);

        let error = AttemptError::status(500, &body);

        match error {
            AttemptError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS + 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn should_render_endpoint_and_attempts() {
        let error = ApiError::RequestFailed {
            endpoint: "/batch/".to_string(),
            attempts: 3,
            last_error: TransportError::Timeout("deadline".to_string()).into(),
        };

        let rendered = error.to_string();

        assert!(rendered.contains("/batch/"));
        assert!(rendered.contains("3 attempts"));
        assert!(rendered.contains("timed out"));
    }
}
