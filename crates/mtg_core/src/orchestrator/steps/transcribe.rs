//! Transcription stage - audio extraction and speech-to-text.
//!
//! Never ends the run: any failure hands on an empty transcript.

use crate::orchestrator::context::RunContext;
use crate::orchestrator::errors::ErrorKind;
use crate::orchestrator::types::{PipelineState, StageOutput, StageResult};
use crate::transcription::Transcript;

pub fn transcribe(ctx: &RunContext, state: &PipelineState) -> StageResult {
    let logger = &ctx.logger;
    let empty = || StageOutput::Transcript(Transcript::empty());

    if state.frames().is_some_and(|f| !f.media.has_audio) {
        logger.warn("Video has no audio track; continuing without a transcript");
        return StageResult::degraded(ErrorKind::Decode, "video has no audio track", empty());
    }

    let transcriber = &ctx.services.transcriber;
    logger.info(&format!("Transcribing with {}", transcriber.name()));

    match transcriber.transcribe(&ctx.media_path, &ctx.audio_dir) {
        Ok(transcript) => {
            if transcript.is_empty() {
                logger.warn("No speech detected");
            } else {
                logger.info(&format!(
                    "Transcript: {} segments, {} characters, language {}",
                    transcript.segments().len(),
                    transcript.text().chars().count(),
                    transcript.language.as_deref().unwrap_or("unknown")
                ));
            }
            StageResult::success(StageOutput::Transcript(transcript))
        }
        Err(e) => {
            logger.output_line(&e.to_string(), true);
            logger.warn(&format!("Transcription failed: {}", e));
            StageResult::degraded(e.kind(), e.to_string(), empty())
        }
    }
}
