//! Error types for the cloud adapter.

use thiserror::Error;

use orrery_hal::TransportError;

/// Result type for cloud API operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur when talking to the cloud API.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Token cannot be sent as an HTTP header.
    #[error("Invalid API token")]
    InvalidToken,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error status.
    #[error("Cloud API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Authentication was rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The service reported a job status this client does not know.
    #[error("Unknown job status: {0}")]
    UnknownStatus(String),
}

impl From<CloudError> for TransportError {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::InvalidToken => TransportError::Unauthorized(e.to_string()),
            CloudError::HttpError(err) if err.is_decode() => TransportError::Decode(err.to_string()),
            CloudError::HttpError(err) => TransportError::Http(err.to_string()),
            CloudError::ApiError { status, message } => TransportError::Api { status, message },
            CloudError::Unauthorized(msg) => TransportError::Unauthorized(msg),
            CloudError::NotFound(what) => TransportError::NotFound(what),
            CloudError::Unavailable(msg) => TransportError::Unavailable(msg),
            CloudError::JsonError(_) | CloudError::UnknownStatus(_) => {
                TransportError::Decode(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = CloudError::ApiError {
            status: 400,
            message: "shots out of range".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("shots out of range"));
    }

    #[test]
    fn test_invalid_token_to_unauthorized() {
        let t: TransportError = CloudError::InvalidToken.into();
        assert!(matches!(t, TransportError::Unauthorized(_)));
    }

    #[test]
    fn test_api_error_keeps_status() {
        let t: TransportError = CloudError::ApiError {
            status: 503,
            message: "busy".into(),
        }
        .into();
        assert!(matches!(t, TransportError::Api { status: 503, .. }));
        assert!(t.is_transient());
    }

    #[test]
    fn test_not_found_to_transport() {
        let t: TransportError = CloudError::NotFound("job j1".into()).into();
        assert!(matches!(t, TransportError::NotFound(what) if what == "job j1"));
    }

    #[test]
    fn test_unknown_status_to_decode() {
        let t: TransportError = CloudError::UnknownStatus("PAUSED".into()).into();
        assert!(matches!(t, TransportError::Decode(msg) if msg.contains("PAUSED")));
    }

    #[test]
    fn test_json_error_to_decode() {
        let json_err = serde_json::from_str::<u32>("{").unwrap_err();
        let t: TransportError = CloudError::from(json_err).into();
        assert!(matches!(t, TransportError::Decode(_)));
    }

    #[test]
    fn test_unavailable_is_transient() {
        let t: TransportError = CloudError::Unavailable("maintenance".into()).into();
        assert!(t.is_transient());
    }
}
