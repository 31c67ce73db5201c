//! Pipeline orchestrator for turning a meeting recording into documents.
//!
//! A run executes a fixed sequence of stages. Each stage reads the state
//! accumulated so far and returns a [`StageResult`]; a failure that still
//! carries partial data marks the stage degraded and the run continues,
//! anything else aborts the run.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!     ├── Stage 1: ExtractFrames
//!     ├── Stage 2: Transcribe
//!     ├── Stage 3: AnalyzeVisuals
//!     ├── Stage 4: AnalyzeText
//!     ├── Stage 5: SynthesizeRequirements
//!     └── Stage 6: GenerateDocuments
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mtg_core::orchestrator::{Orchestrator, RunContext, Services};
//!
//! let services = Services::from_settings(&settings)?;
//! let ctx = RunContext::new(settings, "Portal Kickoff", "meeting.mp4", services)?;
//!
//! let mut orchestrator = Orchestrator::new();
//! let progress = orchestrator.subscribe(64);
//! let outcome = orchestrator.run(&ctx);
//! println!("{}", outcome.summary.render());
//! ```

mod context;
mod errors;
mod pipeline;
mod progress;
mod stage;
mod steps;
mod types;

#[cfg(test)]
mod fakes;
#[cfg(test)]
mod scenarios;

pub use context::{renderers_for, RunContext, Services};
pub use errors::{ErrorKind, PipelineError, PipelineResult, StageError};
pub use pipeline::{CancelHandle, Orchestrator, RunOutcome, RESULTS_FILE};
pub use progress::{
    CallbackSubscription, ProgressChannel, ProgressEvent, ProgressPhase, ProgressReceiver,
    DEFAULT_CAPACITY,
};
pub use stage::Stage;
pub use types::{
    ChunkAnalysis, DocumentsOutput, FrameAnalysis, FramesOutput, ItemFailure, PipelineState,
    RunStatus, RunSummary, StageOutcome, StageOutput, StageReport, StageResult, TextOutput,
    VisualOutput,
};
