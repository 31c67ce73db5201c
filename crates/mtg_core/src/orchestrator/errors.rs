//! Error types for the analysis pipeline.
//!
//! Errors carry context that chains through layers:
//! Run → Stage → Collaborator → Detail
//!
//! Every collaborator error collapses onto an [`ErrorKind`] so the run
//! summary can report a stable classification per stage.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Classification of a stage failure, shared by all collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing source video, zero duration.
    Input,
    /// Corrupt or unsupported stream.
    Decode,
    /// A required external utility is not reachable.
    ToolUnavailable,
    /// Transcription/inference call failed (network, quota, malformed response).
    Service,
    /// Stage completed with degraded data.
    PartialResult,
    /// Run was cancelled.
    Cancelled,
    /// Unexpected fault inside a stage (including a panic).
    Internal,
}

impl ErrorKind {
    /// Stable display name used in summaries and progress events.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Input => "InputError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::ToolUnavailable => "ToolUnavailable",
            ErrorKind::Service => "ServiceError",
            ErrorKind::PartialResult => "PartialResult",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classified error from a single stage.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("[{kind}] {message}")]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    /// Create a stage error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Top-level error raised before a run can start.
///
/// Stage failures never surface as `PipelineError`; they are recorded in
/// the pipeline state and reported through the run summary instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Failed to set up the run (create directories, open the log, etc.).
    #[error("Run '{project}' setup failed in {operation}: {source}")]
    SetupFailed {
        project: String,
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The run configuration is unusable.
    #[error("Run '{project}' has invalid configuration: {message}")]
    InvalidConfig { project: String, message: String },

    /// A collaborator (decoder, transcriber, inference client) could not be built.
    #[error("Failed to set up {collaborator}: {message}")]
    CollaboratorSetup {
        collaborator: &'static str,
        message: String,
    },
}

impl PipelineError {
    /// Create a setup failed error.
    pub fn setup_failed(
        project: impl Into<String>,
        operation: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::SetupFailed {
            project: project.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a collaborator setup error.
    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::CollaboratorSetup {
            collaborator,
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(project: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            project: project.into(),
            message: message.into(),
        }
    }
}

/// Result type for run setup.
pub type PipelineResult<T> = Result<T, PipelineError>;
