//! Audio track extraction with FFmpeg.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::error::TranscriptionError;

/// Extract the audio track of `media` as mono 16-bit PCM WAV at
/// `sample_rate` into `out_dir/<stem>.wav`.
///
/// Returns the path of the written file.
pub fn extract_audio(
    ffmpeg: &Path,
    media: &Path,
    out_dir: &Path,
    sample_rate: u32,
) -> Result<PathBuf, TranscriptionError> {
    if !media.exists() {
        return Err(TranscriptionError::InputNotFound(media.to_path_buf()));
    }

    std::fs::create_dir_all(out_dir).map_err(|e| TranscriptionError::io(out_dir, e))?;

    let stem = media
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let output_path = out_dir.join(format!("{}.wav", stem));

    tracing::info!(
        "[Audio] Extracting audio from {} ({} Hz mono)",
        media.display(),
        sample_rate
    );

    let output = Command::new(ffmpeg)
        .args(["-nostdin", "-y", "-v", "error", "-i"])
        .arg(media)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
        .arg(sample_rate.to_string())
        .args(["-ac", "1"])
        .arg(&output_path)
        .output()
        .map_err(|e| {
            if e.kind() == IoErrorKind::NotFound {
                TranscriptionError::ToolMissing("ffmpeg")
            } else {
                TranscriptionError::DecodeFailure(format!("failed to run ffmpeg: {}", e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("unknown error");
        return Err(TranscriptionError::DecodeFailure(format!(
            "ffmpeg exited with {}: {}",
            output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            reason
        )));
    }

    let size = std::fs::metadata(&output_path)
        .map(|m| m.len())
        .unwrap_or(0);
    // A WAV header alone is 44 bytes.
    if size <= 44 {
        return Err(TranscriptionError::DecodeFailure(
            "no audio samples were extracted".to_string(),
        ));
    }

    tracing::debug!(
        "[Audio] Wrote {} ({:.1} MB)",
        output_path.display(),
        size as f64 / (1024.0 * 1024.0)
    );

    Ok(output_path)
}
