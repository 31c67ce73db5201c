//! Frame dissimilarity metric.
//!
//! Both frames are reduced to a fixed small luminance thumbnail and
//! compared by mean absolute pixel difference, so the cost of a
//! comparison does not grow with the source resolution and sensor noise
//! is averaged out.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

/// Default thumbnail width used for comparison.
pub const DEFAULT_DIFF_WIDTH: u32 = 24;
/// Default thumbnail height used for comparison.
pub const DEFAULT_DIFF_HEIGHT: u32 = 16;

/// Luminance thumbnail of a frame, reusable across comparisons.
#[derive(Debug, Clone)]
pub struct FrameSignature {
    luma: GrayImage,
}

/// Scalar dissimilarity between two frames.
///
/// Scores range over `0.0..=255.0`; 0 means identical.
#[derive(Debug, Clone, Copy)]
pub struct FrameDiffMetric {
    width: u32,
    height: u32,
}

impl Default for FrameDiffMetric {
    fn default() -> Self {
        Self::new(DEFAULT_DIFF_WIDTH, DEFAULT_DIFF_HEIGHT)
    }
}

impl FrameDiffMetric {
    /// Create a metric with the given thumbnail size (clamped to at least 1x1).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Compute the signature of one frame.
    ///
    /// Every signature has the same dimensions, so signatures of frames
    /// with different resolutions are always comparable.
    pub fn signature(&self, image: &DynamicImage) -> FrameSignature {
        let thumb = image.resize_exact(self.width, self.height, FilterType::Triangle);
        FrameSignature {
            luma: thumb.to_luma8(),
        }
    }

    /// Mean absolute difference between two signatures.
    pub fn distance(&self, a: &FrameSignature, b: &FrameSignature) -> f64 {
        let pixels = a.luma.as_raw().len().min(b.luma.as_raw().len());
        if pixels == 0 {
            return 0.0;
        }

        let total: u64 = a
            .luma
            .as_raw()
            .iter()
            .zip(b.luma.as_raw().iter())
            .map(|(&pa, &pb)| (pa as i16 - pb as i16).unsigned_abs() as u64)
            .sum();

        total as f64 / pixels as f64
    }

    /// Score two frames directly.
    ///
    /// When dimensions differ, the second frame is resized to the first's
    /// dimensions before comparing; this never fails.
    pub fn score(&self, first: &DynamicImage, second: &DynamicImage) -> f64 {
        let sig_first = self.signature(first);
        let sig_second = if first.dimensions_eq(second) {
            self.signature(second)
        } else {
            let resized = second.resize_exact(first.width(), first.height(), FilterType::Triangle);
            self.signature(&resized)
        };
        self.distance(&sig_first, &sig_second)
    }
}

trait DimensionsEq {
    fn dimensions_eq(&self, other: &DynamicImage) -> bool;
}

impl DimensionsEq for DynamicImage {
    fn dimensions_eq(&self, other: &DynamicImage) -> bool {
        self.width() == other.width() && self.height() == other.height()
    }
}
