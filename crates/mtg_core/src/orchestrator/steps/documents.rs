//! Document generation stage.

use crate::document::{DocumentInput, SourceStats};
use crate::orchestrator::context::RunContext;
use crate::orchestrator::errors::ErrorKind;
use crate::orchestrator::types::{
    DocumentsOutput, ItemFailure, PipelineState, StageOutput, StageResult,
};
use crate::requirements::Requirements;

pub fn generate_documents(ctx: &RunContext, state: &PipelineState) -> StageResult {
    let logger = &ctx.logger;
    let renderers = &ctx.services.renderers;
    if renderers.is_empty() {
        return StageResult::failed(ErrorKind::Internal, "no output formats configured");
    }

    let fallback;
    let requirements = match state.requirements() {
        Some(r) => r,
        None => {
            fallback = Requirements::unavailable("requirements synthesis did not run");
            &fallback
        }
    };
    let degraded = state.degraded_notes();
    if !degraded.is_empty() {
        logger.warn(&format!(
            "{} degraded stage(s) will be flagged in the documents",
            degraded.len()
        ));
    }

    let transcript = state.transcript();
    let input = DocumentInput {
        project_name: &ctx.project_name,
        generated_at: chrono::Local::now(),
        requirements,
        degraded: &degraded,
        sources: SourceStats {
            key_frames: state.frames().map(|f| f.saved.len()).unwrap_or(0),
            frames_analyzed: state.visual().map(|v| v.analyses.len()).unwrap_or(0),
            transcript_segments: transcript.map(|t| t.segments().len()).unwrap_or(0),
            transcript_language: transcript.and_then(|t| t.language.clone()),
        },
    };

    let mut output = DocumentsOutput::default();
    let mut last_kind = ErrorKind::Internal;
    for renderer in renderers {
        let format = renderer.format();
        match renderer.write(&input, &ctx.output_dir) {
            Ok(path) => {
                logger.info(&format!("{} document: {}", format.name(), path.display()));
                output.files.push(path);
            }
            Err(e) => {
                logger.error(&format!("{} document failed: {}", format.name(), e));
                last_kind = e.kind();
                output.failed.push(ItemFailure {
                    item: format.name().to_string(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    if output.files.is_empty() {
        let message = output
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.item, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        return StageResult::failed(last_kind, message);
    }
    if output.failed.is_empty() {
        return StageResult::success(StageOutput::Documents(output));
    }
    let message = format!(
        "{} of {} documents failed",
        output.failed.len(),
        renderers.len()
    );
    StageResult::degraded(ErrorKind::PartialResult, message, StageOutput::Documents(output))
}
