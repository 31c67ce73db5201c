//! Orchestrator that runs the stages in sequence.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::context::RunContext;
use super::errors::{ErrorKind, StageError};
use super::progress::{
    CallbackSubscription, ProgressChannel, ProgressEvent, ProgressPhase, ProgressReceiver,
};
use super::stage::Stage;
use super::types::{PipelineState, RunStatus, RunSummary, StageOutcome, StageResult};

/// Results file written into the output directory at the end of a run.
pub const RESULTS_FILE: &str = "analysis_results.json";

/// Runs the fixed stage sequence for one run.
///
/// The orchestrator is consumed by [`Orchestrator::run`]; create a new one
/// per run. Subscribers and cancel handles must be taken before running.
pub struct Orchestrator {
    progress: ProgressChannel,
    cancelled: Arc<AtomicBool>,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: PipelineState,
    pub summary: RunSummary,
    /// Every status the run passed through, starting at `Pending`.
    pub history: Vec<RunStatus>,
    pub results_path: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            progress: ProgressChannel::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe with a bounded queue of `capacity` events.
    pub fn subscribe(&mut self, capacity: usize) -> ProgressReceiver {
        self.progress.subscribe(capacity)
    }

    /// Subscribe a callback served by its own thread.
    pub fn subscribe_callback<F>(&mut self, callback: F) -> std::io::Result<CallbackSubscription>
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        self.progress.subscribe_callback(callback)
    }

    /// Get a cancellation handle.
    ///
    /// Call `cancel()` on the returned handle to stop the run at the next
    /// stage boundary. A stage already running is allowed to finish.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run every stage in order.
    ///
    /// Stage failures never surface as errors: a failure with partial data
    /// marks the stage degraded and the run continues, a failure without
    /// it aborts the run. Either way the accumulated state is returned and
    /// (unless disabled) written to [`RESULTS_FILE`].
    pub fn run(mut self, ctx: &RunContext) -> RunOutcome {
        let logger = &ctx.logger;
        let total = Stage::ALL.len() as u32;
        let mut state = PipelineState::new(&ctx.project_name, &ctx.media_path, &ctx.output_dir);
        let mut history = vec![RunStatus::Pending];
        let mut last_ordinal = 0;
        let mut abort_error: Option<StageError> = None;

        logger.section(&format!("Analyzing '{}'", ctx.project_name));
        logger.info(&format!("Source: {}", ctx.media_path.display()));

        for stage in Stage::ALL {
            if self.is_cancelled() {
                logger.warn(&format!("Run cancelled before '{}'", stage.label()));
                state.cancelled = true;
                abort_error = Some(StageError::new(ErrorKind::Cancelled, "run cancelled"));
                break;
            }

            last_ordinal = stage.ordinal();
            transition(&mut state, &mut history, RunStatus::Running(stage));
            self.emit(stage, ProgressPhase::Started, None);
            logger.phase(stage.label());
            logger.clear_tail();

            let result = run_guarded(stage, ctx, &state);
            let error = result.error();

            match result.outcome() {
                StageOutcome::Success => {
                    logger.success(&format!("{} completed", stage.label()));
                    state.record(stage, result);
                }
                StageOutcome::Degraded => {
                    let err = error.unwrap_or_else(|| StageError::new(ErrorKind::PartialResult, ""));
                    logger.degraded(&format!("{}: {}", stage.label(), err));
                    state.record(stage, result);
                    transition(&mut state, &mut history, RunStatus::Degraded(stage));
                    self.emit(stage, ProgressPhase::Degraded, Some(err));
                }
                StageOutcome::Failed | StageOutcome::NotRun => {
                    let err = error.unwrap_or_else(|| StageError::new(ErrorKind::Internal, ""));
                    logger.error(&format!("{} failed: {}", stage.label(), err));
                    logger.show_tail("Recent tool errors");
                    state.record(stage, result);
                    transition(&mut state, &mut history, RunStatus::Failed(stage));
                    self.emit(stage, ProgressPhase::Failed, Some(err.clone()));
                    abort_error = Some(err);
                    break;
                }
            }
        }

        let terminal = if abort_error.is_some() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };
        transition(&mut state, &mut history, terminal);
        state.finished_at = Some(chrono::Local::now().to_rfc3339());

        let results_path = if ctx.settings.output.write_results {
            write_results(ctx, &state)
        } else {
            None
        };

        let summary = RunSummary::from_state(&state);
        match terminal {
            RunStatus::Completed if summary.has_degraded() => {
                logger.degraded("Run completed with degraded stages");
            }
            RunStatus::Completed => logger.success("Run completed"),
            _ if state.cancelled => logger.warn("Run cancelled"),
            _ => logger.error("Run aborted"),
        }
        for line in summary.render().lines() {
            logger.info(line);
        }
        logger.flush();

        let (phase, label) = match terminal {
            RunStatus::Completed => (ProgressPhase::Completed, "Run completed"),
            _ if state.cancelled => (ProgressPhase::Aborted, "Run cancelled"),
            _ => (ProgressPhase::Aborted, "Run aborted"),
        };
        self.progress.emit(ProgressEvent {
            ordinal: if terminal == RunStatus::Completed {
                total
            } else {
                last_ordinal
            },
            total,
            label: label.to_string(),
            phase,
            error: abort_error,
        });

        RunOutcome {
            state,
            summary,
            history,
            results_path,
        }
    }

    fn emit(&mut self, stage: Stage, phase: ProgressPhase, error: Option<StageError>) {
        self.progress.emit(ProgressEvent {
            ordinal: stage.ordinal(),
            total: Stage::ALL.len() as u32,
            label: stage.label().to_string(),
            phase,
            error,
        });
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn transition(state: &mut PipelineState, history: &mut Vec<RunStatus>, next: RunStatus) {
    debug_assert!(
        state.status.can_transition_to(next),
        "invalid transition {} -> {}",
        state.status,
        next
    );
    state.status = next;
    history.push(next);
}

/// Run a stage, turning a panic into an internal failure.
fn run_guarded(stage: Stage, ctx: &RunContext, state: &PipelineState) -> StageResult {
    match catch_unwind(AssertUnwindSafe(|| stage.run(ctx, state))) {
        Ok(result) => result,
        Err(payload) => StageResult::failed(
            ErrorKind::Internal,
            format!("stage panicked: {}", panic_message(payload.as_ref())),
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn write_results(ctx: &RunContext, state: &PipelineState) -> Option<PathBuf> {
    let path = ctx.output_dir.join(RESULTS_FILE);
    let written = serde_json::to_string_pretty(state)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => {
            ctx.logger
                .info(&format!("Results saved to {}", path.display()));
            Some(path)
        }
        Err(e) => {
            ctx.logger
                .warn(&format!("Could not write {}: {}", path.display(), e));
            None
        }
    }
}

/// Handle for cancelling a running pipeline.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the run.
    ///
    /// The run stops at the next stage boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_handle_works() {
        let orchestrator = Orchestrator::new();
        let handle = orchestrator.cancel_handle();

        assert!(!orchestrator.is_cancelled());
        assert!(!handle.is_cancelled());

        handle.cancel();

        assert!(orchestrator.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
