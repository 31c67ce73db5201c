//! Frame extraction stage - probes the video, selects key frames, and
//! writes them as JPEG files.

use crate::frames::{
    format_timestamp, save_key_frames, secs_to_duration, FrameError, FrameMode,
    IntervalFrameSelector, KeyFrameSelector, SampleOptions,
};
use crate::logging::RunLogger;
use crate::orchestrator::context::RunContext;
use crate::orchestrator::errors::ErrorKind;
use crate::orchestrator::types::{FramesOutput, StageOutput, StageResult};

fn fail(logger: &RunLogger, err: FrameError) -> StageResult {
    logger.output_line(&err.to_string(), true);
    StageResult::failed(err.kind(), err.to_string())
}

pub fn extract_frames(ctx: &RunContext) -> StageResult {
    let settings = &ctx.settings.frames;
    let decoder = &ctx.services.decoder;
    let logger = &ctx.logger;

    logger.command(&format!("{} probe {}", decoder.backend_name(), ctx.media_path.display()));
    let media = match decoder.probe(&ctx.media_path) {
        Ok(info) => info,
        Err(e) => return fail(logger, e),
    };
    let duration = media.duration();
    if duration.is_zero() {
        return fail(logger, FrameError::ZeroDuration(ctx.media_path.clone()));
    }

    logger.info(&format!(
        "Video: {}x{} @ {:.2} fps, duration {} ({})",
        media.width,
        media.height,
        media.fps,
        format_timestamp(duration),
        decoder.backend_name()
    ));

    let options = SampleOptions {
        interval: secs_to_duration(settings.sample_interval_secs),
        width: settings.decode_width,
    };
    let stream = match decoder.sample_frames(&ctx.media_path, &media, &options) {
        Ok(stream) => stream,
        Err(e) => return fail(logger, e),
    };

    let max_count = settings.max_key_frames as usize;
    let interval = secs_to_duration(settings.interval_secs);
    let selection = match settings.mode {
        FrameMode::SceneChange => {
            logger.info(&format!(
                "Selecting key frames (threshold {:.1}, max {})",
                settings.threshold, max_count
            ));
            KeyFrameSelector::new(settings.threshold, max_count)
                .with_min_useful(settings.min_useful as usize)
                .with_fallback_interval(interval)
                .select(stream, duration)
        }
        FrameMode::Interval => {
            logger.info(&format!(
                "Selecting frames every {:.1}s (max {})",
                settings.interval_secs, max_count
            ));
            IntervalFrameSelector::new(interval, max_count).collect(stream, duration)
        }
    };
    let selection = match selection {
        Ok(selection) => selection,
        Err(e) => return fail(logger, e),
    };

    if selection.fell_back {
        logger.info("Too few scene changes; using evenly spaced frames instead");
    }

    let saved = match save_key_frames(&selection.key_frames, &ctx.frames_dir) {
        Ok(saved) => saved,
        Err(e) => return fail(logger, e),
    };
    logger.info(&format!(
        "Selected {} key frames from {} sampled frames",
        saved.len(),
        selection.frames_scanned
    ));

    let decode_error = selection.decode_error.clone();
    let output = StageOutput::Frames(FramesOutput {
        media,
        mode: settings.mode,
        key_frames: selection.key_frames,
        saved,
        frames_scanned: selection.frames_scanned,
        fell_back: selection.fell_back,
        decode_error: decode_error.clone(),
    });

    match decode_error {
        Some(failure) => {
            let at = failure
                .last_timestamp_secs
                .map(|s| format!(" after {}", format_timestamp(secs_to_duration(s))))
                .unwrap_or_default();
            StageResult::degraded(
                ErrorKind::Decode,
                format!(
                    "decoding stopped{} ({} frames read): {}",
                    at, selection.frames_scanned, failure.message
                ),
                output,
            )
        }
        None => StageResult::success(output),
    }
}
