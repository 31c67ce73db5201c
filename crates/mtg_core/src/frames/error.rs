//! Frame error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::ErrorKind;

/// Errors that can occur while probing, decoding, or selecting frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Source video does not exist.
    #[error("Video file not found: {0}")]
    InputNotFound(PathBuf),

    /// Source video has no usable duration.
    #[error("Video '{0}' reports zero duration")]
    ZeroDuration(PathBuf),

    /// Source has no video stream.
    #[error("No video stream found in '{0}'")]
    NoVideoStream(PathBuf),

    /// The decoder produced no frames at all.
    #[error("Video produced no frames")]
    EmptyInput,

    /// The stream could not be decoded.
    #[error("Decode failed{}: {message}", format_last(.last_timestamp))]
    Decode {
        last_timestamp: Option<Duration>,
        message: String,
    },

    /// FFmpeg/FFprobe not available.
    #[error("{0} not found or not executable")]
    ToolNotFound(&'static str),

    /// Video properties detection failed.
    #[error("Failed to detect video properties: {0}")]
    PropertiesFailed(String),

    /// Invalid frame data.
    #[error("Invalid frame data: {0}")]
    InvalidData(String),

    /// Failed to write a frame image.
    #[error("Failed to write frame '{path}': {message}")]
    WriteFailed { path: PathBuf, message: String },
}

fn format_last(last: &Option<Duration>) -> String {
    match last {
        Some(ts) => format!(" after {:.2}s", ts.as_secs_f64()),
        None => " before the first frame".to_string(),
    }
}

impl FrameError {
    /// Create a decode error.
    pub fn decode(last_timestamp: Option<Duration>, message: impl Into<String>) -> Self {
        Self::Decode {
            last_timestamp,
            message: message.into(),
        }
    }

    /// Classify for the run summary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::InputNotFound(_)
            | FrameError::ZeroDuration(_)
            | FrameError::NoVideoStream(_) => ErrorKind::Input,
            FrameError::EmptyInput | FrameError::Decode { .. } | FrameError::InvalidData(_) => {
                ErrorKind::Decode
            }
            FrameError::ToolNotFound(_) => ErrorKind::ToolUnavailable,
            FrameError::PropertiesFailed(_) => ErrorKind::Decode,
            FrameError::WriteFailed { .. } => ErrorKind::Internal,
        }
    }
}
