//! Visual analysis stage - key frame descriptions from the vision model.

use crate::frames::{encode_jpeg, format_timestamp, JPEG_QUALITY};
use crate::inference::prompts::FRAME_ANALYSIS_PROMPT;
use crate::orchestrator::context::RunContext;
use crate::orchestrator::errors::ErrorKind;
use crate::orchestrator::types::{
    FrameAnalysis, ItemFailure, PipelineState, StageOutput, StageResult, VisualOutput,
};

use super::{batch_result, service_down, skipped};

pub fn analyze_visuals(ctx: &RunContext, state: &PipelineState) -> StageResult {
    let logger = &ctx.logger;
    let settings = &ctx.settings.inference;

    let Some(frames) = state.frames() else {
        return StageResult::failed(ErrorKind::Internal, "frame extraction produced no output");
    };

    let limit = settings.max_frames_to_analyze as usize;
    let selected: Vec<_> = frames
        .key_frames
        .iter()
        .zip(frames.saved.iter())
        .take(limit)
        .collect();
    let total = selected.len();
    if total == 0 {
        logger.info("No key frames to analyze");
        return StageResult::success(StageOutput::Visual(VisualOutput::default()));
    }
    if frames.saved.len() > total {
        logger.info(&format!(
            "Analyzing the first {} of {} key frames",
            total,
            frames.saved.len()
        ));
    }

    let inference = &ctx.services.inference;
    let mut output = VisualOutput::default();
    let mut abandoned = false;

    for (i, (key_frame, saved)) in selected.into_iter().enumerate() {
        let timestamp = format_timestamp(key_frame.timestamp());
        let item = format!("frame {} ({})", saved.index, timestamp);

        if abandoned {
            output.failed.push(skipped(item));
            continue;
        }

        let described = encode_jpeg(key_frame.frame.image(), JPEG_QUALITY)
            .map_err(|e| (e.kind(), e.to_string(), false))
            .and_then(|jpeg| {
                inference
                    .describe_image(&jpeg, FRAME_ANALYSIS_PROMPT, settings.frame_max_tokens)
                    .map_err(|e| (e.kind(), e.to_string(), service_down(&e)))
            });

        match described {
            Ok(description) => output.analyses.push(FrameAnalysis {
                index: saved.index,
                timestamp,
                timestamp_secs: saved.timestamp_secs,
                path: saved.path.clone(),
                description: description.trim().to_string(),
            }),
            Err((kind, message, down)) => {
                logger.warn(&format!("Could not analyze {}: {}", item, message));
                output.failed.push(ItemFailure {
                    item,
                    kind,
                    message,
                });
                abandoned = down;
            }
        }
        logger.progress("Frames analyzed", i + 1, total);
    }

    let failed = output.failed.len();
    batch_result(StageOutput::Visual(output), failed, total, "frames")
}
