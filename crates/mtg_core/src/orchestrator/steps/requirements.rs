//! Requirements synthesis stage.

use crate::inference::prompts::{requirements_prompt, FrameContext, REQUIREMENTS_SYSTEM_PROMPT};
use crate::inference::TextRequest;
use crate::orchestrator::context::RunContext;
use crate::orchestrator::errors::ErrorKind;
use crate::orchestrator::types::{PipelineState, StageOutput, StageResult};
use crate::requirements::Requirements;

/// Transcript digest fed to the synthesis prompt.
///
/// Uses the chunk summary where one exists and the raw chunk text
/// otherwise, so a partially failed text stage still contributes.
fn transcript_digest(ctx: &RunContext, state: &PipelineState) -> String {
    let Some(transcript) = state.transcript().filter(|t| !t.is_empty()) else {
        return String::new();
    };
    let chunks = transcript.chunks(ctx.settings.inference.transcript_chunk_chars as usize);
    let summaries = state.text().map(|t| t.analyses.as_slice()).unwrap_or(&[]);

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let body = summaries
                .iter()
                .find(|a| a.index == i)
                .map(|a| a.points.as_str())
                .unwrap_or(chunk.text.as_str());
            format!("Part {} ({}):\n{}", i + 1, chunk.span(), body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn synthesize_requirements(ctx: &RunContext, state: &PipelineState) -> StageResult {
    let logger = &ctx.logger;
    let settings = &ctx.settings.inference;

    let digest = transcript_digest(ctx, state);
    let frames: Vec<FrameContext<'_>> = state
        .visual()
        .map(|v| {
            v.analyses
                .iter()
                .map(|a| FrameContext {
                    timestamp: &a.timestamp,
                    analysis: &a.description,
                })
                .collect()
        })
        .unwrap_or_default();

    if digest.is_empty() && frames.is_empty() {
        let reason = "no transcript or visual analysis available";
        logger.warn(&format!("Skipping requirements synthesis: {}", reason));
        return StageResult::degraded(
            ErrorKind::PartialResult,
            reason,
            StageOutput::Requirements(Requirements::unavailable(reason)),
        );
    }

    logger.info(&format!(
        "Synthesizing from {} transcript characters and {} frame analyses",
        digest.chars().count(),
        frames.len()
    ));

    let request = TextRequest::new(
        requirements_prompt(&digest, &frames),
        settings.requirements_max_tokens,
    )
    .with_system(REQUIREMENTS_SYSTEM_PROMPT)
    .with_temperature(settings.temperature);

    match ctx.services.inference.complete(&request) {
        Ok(reply) => {
            let requirements = Requirements::parse(&reply);
            if let Some(note) = &requirements.note {
                logger.warn(note);
            }
            logger.info(&format!(
                "Parsed {} requirement section(s)",
                requirements.sections().len()
            ));
            StageResult::success(StageOutput::Requirements(requirements))
        }
        Err(e) => {
            logger.warn(&format!("Requirements synthesis failed: {}", e));
            let note = format!("Requirements could not be generated: {}", e);
            StageResult::degraded(
                e.kind(),
                e.to_string(),
                StageOutput::Requirements(Requirements::unavailable(note)),
            )
        }
    }
}
