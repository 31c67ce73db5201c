//! Transcript analysis stage - chunked discussion-point summaries.

use crate::inference::prompts::{transcript_chunk_prompt, TRANSCRIPT_SYSTEM_PROMPT};
use crate::inference::TextRequest;
use crate::orchestrator::context::RunContext;
use crate::orchestrator::types::{
    ChunkAnalysis, ItemFailure, PipelineState, StageOutput, StageResult, TextOutput,
};

use super::{batch_result, service_down, skipped};

pub fn analyze_text(ctx: &RunContext, state: &PipelineState) -> StageResult {
    let logger = &ctx.logger;
    let settings = &ctx.settings.inference;

    let transcript = match state.transcript() {
        Some(t) if !t.is_empty() => t,
        _ => {
            logger.info("No transcript to analyze");
            return StageResult::success(StageOutput::Text(TextOutput::default()));
        }
    };

    let chunks = transcript.chunks(settings.transcript_chunk_chars as usize);
    let total = chunks.len();
    logger.info(&format!("Transcript split into {} chunk(s)", total));

    let inference = &ctx.services.inference;
    let mut output = TextOutput {
        chunk_count: total,
        ..TextOutput::default()
    };
    let mut abandoned = false;

    for (i, chunk) in chunks.iter().enumerate() {
        let span = chunk.span();
        let item = format!("chunk {} ({})", i + 1, span);

        if abandoned {
            output.failed.push(skipped(item));
            continue;
        }

        let request = TextRequest::new(
            transcript_chunk_prompt(i + 1, total, &span, &chunk.text),
            settings.chunk_max_tokens,
        )
        .with_system(TRANSCRIPT_SYSTEM_PROMPT)
        .with_temperature(settings.temperature);

        match inference.complete(&request) {
            Ok(points) => output.analyses.push(ChunkAnalysis {
                index: i,
                span,
                points: points.trim().to_string(),
            }),
            Err(e) => {
                logger.warn(&format!("Could not analyze {}: {}", item, e));
                abandoned = service_down(&e);
                output.failed.push(ItemFailure {
                    item,
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
        logger.progress("Chunks analyzed", i + 1, total);
    }

    let failed = output.failed.len();
    batch_result(StageOutput::Text(output), failed, total, "transcript chunks")
}
