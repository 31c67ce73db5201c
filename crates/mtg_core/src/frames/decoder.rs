//! Media decoder abstraction.
//!
//! The selector only needs a single-pass stream of sampled frames; the
//! decoder behind it is swappable (FFmpeg subprocess in production,
//! synthetic frames in tests).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::FrameError;
use super::types::{secs_to_duration, Frame};

/// Single-pass stream of sampled frames in increasing timestamp order.
///
/// May yield an error at any point; nothing is read after an error.
pub type FrameStream = Box<dyn Iterator<Item = Result<Frame, FrameError>> + Send>;

/// Video metadata gathered by probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default)]
    pub has_audio: bool,
    /// Probe backend ("ffprobe", "synthetic", ...).
    pub detection_source: String,
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            fps: 0.0,
            width: 0,
            height: 0,
            duration_secs: 0.0,
            codec: None,
            has_audio: false,
            detection_source: "none".to_string(),
        }
    }
}

impl MediaInfo {
    pub fn duration(&self) -> Duration {
        if self.duration_secs.is_finite() {
            secs_to_duration(self.duration_secs)
        } else {
            Duration::ZERO
        }
    }

    /// Output size when scaling to `target_width`.
    ///
    /// Never upscales. The height keeps the aspect ratio and is rounded to
    /// an even number, as most encoders and scalers require.
    pub fn scaled_size(&self, target_width: u32) -> (u32, u32) {
        if self.width == 0 || self.height == 0 {
            return (self.width, self.height);
        }
        let width = if target_width == 0 {
            self.width
        } else {
            target_width.min(self.width)
        };
        let height = (self.height as f64 * width as f64 / self.width as f64).round() as u32;
        let even = |v: u32| (v + (v & 1)).max(2);
        (even(width), even(height))
    }
}

/// How frames are sampled from the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOptions {
    /// Time between sampled frames.
    pub interval: Duration,
    /// Output width; 0 keeps the source width.
    pub width: u32,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            width: 1280,
        }
    }
}

/// Source of sampled video frames.
pub trait MediaDecoder: Send + Sync {
    /// Probe the media file for its properties.
    fn probe(&self, path: &Path) -> Result<MediaInfo, FrameError>;

    /// Open a single-pass stream of frames sampled at `options.interval`.
    fn sample_frames(
        &self,
        path: &Path,
        info: &MediaInfo,
        options: &SampleOptions,
    ) -> Result<FrameStream, FrameError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32) -> MediaInfo {
        MediaInfo {
            width,
            height,
            ..MediaInfo::default()
        }
    }

    #[test]
    fn scales_down_with_even_height() {
        assert_eq!(info(1920, 1080).scaled_size(1280), (1280, 720));
        assert_eq!(info(1440, 1080).scaled_size(1280), (1280, 960));
        assert_eq!(info(1000, 563).scaled_size(640), (640, 360));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(info(640, 360).scaled_size(1280), (640, 360));
    }

    #[test]
    fn invalid_duration_is_zero() {
        let mut info = MediaInfo::default();
        info.duration_secs = f64::NAN;
        assert_eq!(info.duration(), Duration::ZERO);
        info.duration_secs = 12.5;
        assert_eq!(info.duration(), Duration::from_millis(12500));
    }
}
