//! Persisting key frames as JPEG files.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use super::error::FrameError;
use super::types::{KeyFrameSet, SavedFrame};

/// JPEG quality used for saved frames and inference uploads.
pub const JPEG_QUALITY: u8 = 85;

/// Encode an image as JPEG bytes.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, FrameError> {
    let rgb = image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| FrameError::InvalidData(format!("JPEG encoding failed: {}", e)))?;
    Ok(buf.into_inner())
}

/// Write every key frame to `dir` as `keyframe_NNNN.jpg`.
///
/// Numbering follows the order in the set, starting at 0.
pub fn save_key_frames(set: &KeyFrameSet, dir: &Path) -> Result<Vec<SavedFrame>, FrameError> {
    fs::create_dir_all(dir).map_err(|e| FrameError::WriteFailed {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut saved = Vec::with_capacity(set.len());
    for (i, key_frame) in set.iter().enumerate() {
        let path = dir.join(format!("keyframe_{:04}.jpg", i));
        let bytes = encode_jpeg(key_frame.frame.image(), JPEG_QUALITY)?;
        fs::write(&path, bytes).map_err(|e| FrameError::WriteFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;

        saved.push(SavedFrame {
            index: i as u64,
            timestamp_secs: key_frame.timestamp().as_secs_f64(),
            score: key_frame.score,
            path,
        });
    }

    tracing::debug!("[Frames] Saved {} key frames to {}", saved.len(), dir.display());
    Ok(saved)
}
