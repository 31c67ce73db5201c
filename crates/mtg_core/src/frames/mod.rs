//! Video frame sampling and key-frame selection.
//!
//! # Components
//!
//! - **decoder**: [`MediaDecoder`] trait, the single-pass sampled frame stream
//! - **ffmpeg**: ffprobe/ffmpeg subprocess implementation
//! - **diff**: [`FrameDiffMetric`], luminance-thumbnail frame dissimilarity
//! - **keyframes**: [`KeyFrameSelector`], scene-change selection with interval fallback
//! - **interval**: [`IntervalFrameSelector`], evenly spaced selection
//! - **export**: JPEG encoding and on-disk key frames

mod decoder;
mod diff;
mod error;
mod export;
mod ffmpeg;
mod interval;
mod keyframes;
mod types;

pub use decoder::{FrameStream, MediaDecoder, MediaInfo, SampleOptions};
pub use diff::{FrameDiffMetric, FrameSignature, DEFAULT_DIFF_HEIGHT, DEFAULT_DIFF_WIDTH};
pub use error::FrameError;
pub use export::{encode_jpeg, save_key_frames, JPEG_QUALITY};
pub use ffmpeg::FfmpegDecoder;
pub use interval::IntervalFrameSelector;
pub use keyframes::{KeyFrameSelector, DEFAULT_MAX_KEY_FRAMES, DEFAULT_THRESHOLD};
pub use types::{
    format_timestamp, secs_to_duration, DecodeFailure, Frame, FrameMode, KeyFrame, KeyFrameSet,
    SavedFrame, Selection,
};
