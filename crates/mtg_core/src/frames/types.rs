//! Frame and key-frame data types.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::error::FrameError;

/// A decoded raster image with its source timestamp and sequence index.
///
/// Immutable once produced. The raster is shared, so cloning a frame
/// (for example into the fallback reservoir) does not copy pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    timestamp: Duration,
    image: Arc<DynamicImage>,
}

impl Frame {
    pub fn new(index: u64, timestamp: Duration, image: DynamicImage) -> Self {
        Self {
            index,
            timestamp,
            image: Arc::new(image),
        }
    }

    /// Monotonically increasing sequence index within the sampled stream.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Source timestamp.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A selected frame with the change score that admitted it.
///
/// `score` is the diff against the previously accepted frame; it is 0 for
/// the first frame and for frames picked by interval selection.
#[derive(Debug, Clone)]
pub struct KeyFrame {
    pub frame: Frame,
    pub score: f64,
}

impl KeyFrame {
    pub fn timestamp(&self) -> Duration {
        self.frame.timestamp()
    }
}

/// Ordered, capped set of key frames.
///
/// Timestamps are strictly increasing and never duplicated. Created once
/// per run by a selector and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct KeyFrameSet {
    frames: Vec<KeyFrame>,
}

impl KeyFrameSet {
    /// Build a set from key frames, rejecting unordered or duplicate timestamps.
    pub fn new(frames: Vec<KeyFrame>) -> Result<Self, FrameError> {
        for pair in frames.windows(2) {
            if pair[1].timestamp() <= pair[0].timestamp() {
                return Err(FrameError::InvalidData(format!(
                    "key frame timestamps not strictly increasing ({:.3}s then {:.3}s)",
                    pair[0].timestamp().as_secs_f64(),
                    pair[1].timestamp().as_secs_f64()
                )));
            }
        }
        Ok(Self { frames })
    }

    /// Append a frame known to be later than the current tail.
    pub(crate) fn push_ordered(&mut self, key_frame: KeyFrame) {
        debug_assert!(self
            .frames
            .last()
            .map_or(true, |last| last.timestamp() < key_frame.timestamp()));
        self.frames.push(key_frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyFrame> {
        self.frames.iter()
    }

    pub fn first(&self) -> Option<&KeyFrame> {
        self.frames.first()
    }

    pub fn timestamps(&self) -> Vec<Duration> {
        self.frames.iter().map(KeyFrame::timestamp).collect()
    }
}

impl<'a> IntoIterator for &'a KeyFrameSet {
    type Item = &'a KeyFrame;
    type IntoIter = std::slice::Iter<'a, KeyFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Where the scan stopped when the stream failed mid-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeFailure {
    /// Timestamp of the last frame read successfully.
    pub last_timestamp_secs: Option<f64>,
    pub message: String,
}

/// Result of a selection pass.
#[derive(Debug, Clone)]
pub struct Selection {
    pub key_frames: KeyFrameSet,
    /// Set when the stream failed after at least one frame was read.
    pub decode_error: Option<DecodeFailure>,
    /// True when interval selection replaced scene-change results.
    pub fell_back: bool,
    /// Number of sampled frames that were inspected.
    pub frames_scanned: u64,
}

/// Metadata for a key frame persisted to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFrame {
    pub index: u64,
    pub timestamp_secs: f64,
    pub score: f64,
    pub path: PathBuf,
}

/// How frames are chosen from the sampled stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMode {
    /// Accept frames whose diff against the last accepted frame exceeds the threshold.
    #[default]
    SceneChange,
    /// Evenly spaced frames across the whole video.
    Interval,
}

impl FrameMode {
    pub fn name(&self) -> &'static str {
        match self {
            FrameMode::SceneChange => "scene change",
            FrameMode::Interval => "interval",
        }
    }
}

/// Seconds as a `Duration`. Negative and NaN become zero; values too large
/// to represent saturate at `Duration::MAX`.
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Format a timestamp as `MM:SS` (or `H:MM:SS` past one hour).
pub fn format_timestamp(ts: Duration) -> String {
    let total = ts.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame_at(secs: u64) -> KeyFrame {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 10, 10])));
        KeyFrame {
            frame: Frame::new(secs, Duration::from_secs(secs), img),
            score: 0.0,
        }
    }

    #[test]
    fn key_frame_set_accepts_increasing() {
        let set = KeyFrameSet::new(vec![frame_at(0), frame_at(5), frame_at(9)]).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.first().unwrap().timestamp(), Duration::ZERO);
    }

    #[test]
    fn key_frame_set_rejects_duplicates() {
        let result = KeyFrameSet::new(vec![frame_at(0), frame_at(5), frame_at(5)]);
        assert!(matches!(result, Err(FrameError::InvalidData(_))));
    }

    #[test]
    fn formats_timestamps() {
        assert_eq!(format_timestamp(Duration::from_secs(75)), "01:15");
        assert_eq!(format_timestamp(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn out_of_range_seconds_saturate() {
        assert_eq!(secs_to_duration(1.5), Duration::from_millis(1500));
        assert_eq!(secs_to_duration(-3.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(1e20), Duration::MAX);
        assert_eq!(secs_to_duration(f64::INFINITY), Duration::MAX);
        assert!(!format_timestamp(secs_to_duration(1e20)).is_empty());
    }
}
