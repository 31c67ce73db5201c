//! Core types for the analysis pipeline.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use super::errors::{ErrorKind, StageError};
use super::stage::Stage;
use crate::document::DegradedNote;
use crate::frames::{DecodeFailure, FrameMode, KeyFrameSet, MediaInfo, SavedFrame};
use crate::requirements::Requirements;
use crate::transcription::Transcript;

/// Tagged outcome of one stage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult {
    Success {
        output: StageOutput,
    },
    /// `partial` lets later stages continue in degraded mode; without it
    /// the run stops here.
    Failure {
        kind: ErrorKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        partial: Option<StageOutput>,
    },
}

impl StageResult {
    pub fn success(output: StageOutput) -> Self {
        StageResult::Success { output }
    }

    /// Failure that downstream stages can work around.
    pub fn degraded(kind: ErrorKind, message: impl Into<String>, partial: StageOutput) -> Self {
        StageResult::Failure {
            kind,
            message: message.into(),
            partial: Some(partial),
        }
    }

    /// Failure that ends the run.
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        StageResult::Failure {
            kind,
            message: message.into(),
            partial: None,
        }
    }

    /// Output later stages should read: the success payload or the partial.
    pub fn usable_output(&self) -> Option<&StageOutput> {
        match self {
            StageResult::Success { output } => Some(output),
            StageResult::Failure { partial, .. } => partial.as_ref(),
        }
    }

    pub fn error(&self) -> Option<StageError> {
        match self {
            StageResult::Success { .. } => None,
            StageResult::Failure { kind, message, .. } => Some(StageError::new(*kind, message.clone())),
        }
    }

    pub fn outcome(&self) -> StageOutcome {
        match self {
            StageResult::Success { .. } => StageOutcome::Success,
            StageResult::Failure {
                partial: Some(_), ..
            } => StageOutcome::Degraded,
            StageResult::Failure { partial: None, .. } => StageOutcome::Failed,
        }
    }
}

/// Payload produced by a stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutput {
    Frames(FramesOutput),
    Transcript(Transcript),
    Visual(VisualOutput),
    Text(TextOutput),
    Requirements(Requirements),
    Documents(DocumentsOutput),
}

/// Output of frame extraction.
#[derive(Debug, Clone, Serialize)]
pub struct FramesOutput {
    pub media: MediaInfo,
    pub mode: FrameMode,
    /// Selected frames with their rasters; not written to the results file.
    #[serde(skip)]
    pub key_frames: KeyFrameSet,
    pub saved: Vec<SavedFrame>,
    pub frames_scanned: u64,
    pub fell_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<DecodeFailure>,
}

/// One item of a batch that failed and was excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Vision model description of one key frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAnalysis {
    pub index: u64,
    pub timestamp: String,
    pub timestamp_secs: f64,
    pub path: PathBuf,
    pub description: String,
}

/// Output of visual analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VisualOutput {
    pub analyses: Vec<FrameAnalysis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<ItemFailure>,
}

/// Text model summary of one transcript chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkAnalysis {
    pub index: usize,
    pub span: String,
    pub points: String,
}

/// Output of transcript analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextOutput {
    /// Number of chunks the transcript was split into.
    pub chunk_count: usize,
    pub analyses: Vec<ChunkAnalysis>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<ItemFailure>,
}

/// Output of document generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentsOutput {
    pub files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<ItemFailure>,
}

/// Run-level state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running(Stage),
    Degraded(Stage),
    Failed(Stage),
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Aborted)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        match (*self, next) {
            (Pending, Running(stage)) => stage == Stage::first(),
            (Pending, Aborted) => true,
            (Running(a), Running(b)) | (Degraded(a), Running(b)) => a.next() == Some(b),
            (Running(a), Degraded(b)) | (Running(a), Failed(b)) => a == b,
            (Running(a), Completed) | (Degraded(a), Completed) => a.next().is_none(),
            (Running(_), Aborted) | (Degraded(_), Aborted) | (Failed(_), Aborted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => f.write_str("Pending"),
            RunStatus::Running(s) => write!(f, "Running({})", s.name()),
            RunStatus::Degraded(s) => write!(f, "Degraded({})", s.name()),
            RunStatus::Failed(s) => write!(f, "Failed({})", s.name()),
            RunStatus::Completed => f.write_str("Completed"),
            RunStatus::Aborted => f.write_str("Aborted"),
        }
    }
}

/// Accumulated results of a run.
///
/// Owned by the orchestrator. Stages get a shared reference and return a
/// [`StageResult`] that the orchestrator records.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub project_name: String,
    pub media_path: PathBuf,
    pub output_dir: PathBuf,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub status: RunStatus,
    /// Set when the run stopped because cancellation was requested.
    pub cancelled: bool,
    pub stages: BTreeMap<Stage, StageResult>,
}

impl PipelineState {
    pub fn new(
        project_name: impl Into<String>,
        media_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            media_path: media_path.into(),
            output_dir: output_dir.into(),
            started_at: chrono::Local::now().to_rfc3339(),
            finished_at: None,
            status: RunStatus::Pending,
            cancelled: false,
            stages: BTreeMap::new(),
        }
    }

    pub fn result(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.get(&stage)
    }

    pub(crate) fn record(&mut self, stage: Stage, result: StageResult) {
        self.stages.insert(stage, result);
    }

    fn output(&self, stage: Stage) -> Option<&StageOutput> {
        self.result(stage).and_then(StageResult::usable_output)
    }

    pub fn frames(&self) -> Option<&FramesOutput> {
        match self.output(Stage::ExtractFrames) {
            Some(StageOutput::Frames(out)) => Some(out),
            _ => None,
        }
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        match self.output(Stage::Transcribe) {
            Some(StageOutput::Transcript(t)) => Some(t),
            _ => None,
        }
    }

    pub fn visual(&self) -> Option<&VisualOutput> {
        match self.output(Stage::AnalyzeVisuals) {
            Some(StageOutput::Visual(out)) => Some(out),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&TextOutput> {
        match self.output(Stage::AnalyzeText) {
            Some(StageOutput::Text(out)) => Some(out),
            _ => None,
        }
    }

    pub fn requirements(&self) -> Option<&Requirements> {
        match self.output(Stage::SynthesizeRequirements) {
            Some(StageOutput::Requirements(r)) => Some(r),
            _ => None,
        }
    }

    pub fn documents(&self) -> Option<&DocumentsOutput> {
        match self.output(Stage::GenerateDocuments) {
            Some(StageOutput::Documents(out)) => Some(out),
            _ => None,
        }
    }

    /// Stages that finished with a failure but handed on partial data.
    pub fn degraded_notes(&self) -> Vec<DegradedNote> {
        self.stages
            .iter()
            .filter_map(|(stage, result)| match result {
                StageResult::Failure {
                    kind,
                    message,
                    partial: Some(_),
                } => Some(DegradedNote {
                    stage: stage.label().to_string(),
                    kind: *kind,
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Per-stage outcome shown in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageOutcome {
    Success,
    Degraded,
    Failed,
    /// Not reached because the run stopped earlier.
    NotRun,
}

impl StageOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            StageOutcome::Success => "Success",
            StageOutcome::Degraded => "Degraded",
            StageOutcome::Failed => "Failed",
            StageOutcome::NotRun => "Not run",
        }
    }
}

/// One row of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// User-facing summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub cancelled: bool,
    pub stages: Vec<StageReport>,
    pub files: Vec<PathBuf>,
}

impl RunSummary {
    pub fn from_state(state: &PipelineState) -> Self {
        let stages = Stage::ALL
            .iter()
            .map(|&stage| match state.result(stage) {
                Some(result) => {
                    let error = result.error();
                    StageReport {
                        stage,
                        outcome: result.outcome(),
                        kind: error.as_ref().map(|e| e.kind),
                        message: error.map(|e| e.message),
                    }
                }
                None => StageReport {
                    stage,
                    outcome: StageOutcome::NotRun,
                    kind: None,
                    message: None,
                },
            })
            .collect();

        Self {
            status: state.status,
            cancelled: state.cancelled,
            stages,
            files: state
                .documents()
                .map(|d| d.files.clone())
                .unwrap_or_default(),
        }
    }

    /// Completed, with at least one degraded stage.
    pub fn has_degraded(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.outcome == StageOutcome::Degraded)
    }

    /// Per-stage table for the console.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let headline = match (self.status, self.cancelled) {
            (RunStatus::Aborted, true) => "Run cancelled".to_string(),
            (RunStatus::Completed, _) if self.has_degraded() => {
                "Run completed with DEGRADED stages".to_string()
            }
            (status, _) => format!("Run {}", status),
        };
        let _ = writeln!(out, "{}", headline);

        let total = Stage::ALL.len();
        for report in &self.stages {
            let marker = match report.outcome {
                StageOutcome::Success => "  ",
                StageOutcome::Degraded => "!!",
                StageOutcome::Failed => "XX",
                StageOutcome::NotRun => "--",
            };
            let _ = write!(
                out,
                "{} [{}/{}] {:<34} {}",
                marker,
                report.stage.ordinal(),
                total,
                report.stage.label(),
                report.outcome.name()
            );
            if let (Some(kind), Some(message)) = (report.kind, report.message.as_deref()) {
                let _ = write!(out, " ({}: {})", kind, message);
            }
            out.push('\n');
        }
        out
    }
}
