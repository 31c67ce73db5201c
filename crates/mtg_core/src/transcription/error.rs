//! Transcription error types.

use std::path::PathBuf;

use crate::inference::Retryable;
use crate::orchestrator::ErrorKind;

/// Errors from audio extraction and speech-to-text.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// A required executable is missing.
    #[error("{0} not found or not executable")]
    ToolMissing(&'static str),

    /// Source media does not exist.
    #[error("Media file not found: {0}")]
    InputNotFound(PathBuf),

    /// The audio track could not be decoded (or there is none).
    #[error("Audio extraction failed: {0}")]
    DecodeFailure(String),

    /// Could not connect to the speech-to-text service, or it timed out.
    #[error("Transcription service unreachable at {url}: {message}")]
    ServiceUnreachable { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("Transcription service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    /// The service response could not be understood.
    #[error("Malformed transcription response: {0}")]
    MalformedResponse(String),

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// Reading or writing a working file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TranscriptionError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify for the run summary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscriptionError::ToolMissing(_) => ErrorKind::ToolUnavailable,
            TranscriptionError::InputNotFound(_) => ErrorKind::Input,
            TranscriptionError::DecodeFailure(_) => ErrorKind::Decode,
            TranscriptionError::ServiceUnreachable { .. }
            | TranscriptionError::Service { .. }
            | TranscriptionError::MalformedResponse(_) => ErrorKind::Service,
            TranscriptionError::Client(_) | TranscriptionError::Io { .. } => ErrorKind::Internal,
        }
    }
}

impl Retryable for TranscriptionError {
    fn is_retryable(&self) -> bool {
        match self {
            TranscriptionError::ServiceUnreachable { .. } => true,
            TranscriptionError::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
