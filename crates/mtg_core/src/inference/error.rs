//! Inference error types.

use crate::orchestrator::ErrorKind;

/// Errors from the vision/text model service.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Could not connect, or the request timed out.
    #[error("Inference service unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("Inference service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response could not be understood.
    #[error("Malformed inference response: {0}")]
    Malformed(String),

    /// The model returned no content.
    #[error("Model '{0}' returned an empty response")]
    EmptyResponse(String),

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl InferenceError {
    /// Whether a retry may succeed (network, timeout, rate limit, 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Unreachable { .. } => true,
            InferenceError::Status { status, .. } => *status == 429 || *status >= 500,
            InferenceError::EmptyResponse(_) => true,
            InferenceError::Malformed(_) | InferenceError::Client(_) => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::Client(_) => ErrorKind::Internal,
            _ => ErrorKind::Service,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            InferenceError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            InferenceError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            InferenceError::Malformed(err.to_string())
        } else {
            InferenceError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let status = |s| InferenceError::Status {
            status: s,
            message: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!InferenceError::Malformed("no choices".into()).is_retryable());
    }

    #[test]
    fn maps_to_service_kind() {
        let err = InferenceError::Unreachable {
            url: "http://localhost:1234/v1".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Service);
        assert!(err.to_string().contains("localhost:1234"));
    }
}
