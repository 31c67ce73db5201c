//! Stage implementations.
//!
//! Each stage reads the [`RunContext`](super::RunContext) and the state
//! accumulated so far and returns a [`StageResult`]. Item-level failures
//! inside a batch are absorbed here and reported as a partial result.

mod documents;
mod frames;
mod requirements;
mod text;
mod transcribe;
mod visuals;

pub(crate) use documents::generate_documents;
pub(crate) use frames::extract_frames;
pub(crate) use requirements::synthesize_requirements;
pub(crate) use text::analyze_text;
pub(crate) use transcribe::transcribe;
pub(crate) use visuals::analyze_visuals;

use crate::inference::InferenceError;

use super::errors::ErrorKind;
use super::types::{ItemFailure, StageOutput, StageResult};

/// Whether the service is down for the rest of the batch.
///
/// Retries have already been spent by the client at this point.
pub(super) fn service_down(err: &InferenceError) -> bool {
    matches!(err, InferenceError::Unreachable { .. })
}

/// Failure entry for an item never sent because the service went away.
pub(super) fn skipped(item: String) -> ItemFailure {
    ItemFailure {
        item,
        kind: ErrorKind::Service,
        message: "skipped: inference service unreachable".to_string(),
    }
}

/// Success when every item went through, otherwise degraded with the
/// successful items as the partial payload.
pub(super) fn batch_result(
    output: StageOutput,
    failed: usize,
    total: usize,
    noun: &str,
) -> StageResult {
    if failed == 0 {
        StageResult::success(output)
    } else {
        StageResult::degraded(
            ErrorKind::PartialResult,
            format!("{} of {} {} failed", failed, total, noun),
            output,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::{StageOutcome, VisualOutput};

    #[test]
    fn batch_without_failures_succeeds() {
        let result = batch_result(StageOutput::Visual(VisualOutput::default()), 0, 3, "frames");
        assert_eq!(result.outcome(), StageOutcome::Success);
    }

    #[test]
    fn batch_with_failures_is_degraded() {
        let result = batch_result(StageOutput::Visual(VisualOutput::default()), 2, 5, "frames");
        assert_eq!(result.outcome(), StageOutcome::Degraded);
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::PartialResult);
        assert_eq!(err.message, "2 of 5 frames failed");
    }

    #[test]
    fn only_unreachable_abandons_batch() {
        assert!(service_down(&InferenceError::Unreachable {
            url: "http://localhost:1234/v1".into(),
            message: "connection refused".into(),
        }));
        assert!(!service_down(&InferenceError::Malformed("no choices".into())));
        assert!(!service_down(&InferenceError::Status {
            status: 500,
            message: "oops".into(),
        }));
    }
}
