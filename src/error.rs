use thiserror::Error;

/// Main error type for the status adapter
#[derive(Error, Debug)]
pub enum StatusError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The status API answered with an error document or a non-2xx status
    #[error("NGINX API error on {path}: status={status} {text}")]
    Api {
        path: String,
        status: u16,
        text: String,
    },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Push transport errors
    #[error("Sender error: {0}")]
    Sender(String),

    #[error("Sender timeout after {elapsed_ms}ms")]
    SenderTimeout { elapsed_ms: u64 },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StatusError {
    /// True when the target answered but refused the resource, as opposed to
    /// an unreachable target or an undecodable body.
    pub fn is_api_error(&self) -> bool {
        matches!(self, StatusError::Api { .. })
    }
}

/// Result type alias for StatusError
pub type Result<T> = std::result::Result<T, StatusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = StatusError::Api {
            path: "api/3/stream/upstreams".to_string(),
            status: 404,
            text: "unknown key \"stream\"".to_string(),
        };
        assert!(err.is_api_error());
        assert_eq!(
            err.to_string(),
            "NGINX API error on api/3/stream/upstreams: status=404 unknown key \"stream\""
        );
    }

    #[test]
    fn test_io_error_is_not_api_error() {
        let err: StatusError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(!err.is_api_error());
    }
}
