//! FFmpeg subprocess-based frame sampler.
//!
//! Probes with ffprobe, then runs a single ffmpeg process that samples
//! frames with the `fps` filter, scales them, and streams raw RGB24 on
//! stdout. Frames are read one at a time so memory use does not grow
//! with the video length.

use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Duration;

use image::{DynamicImage, RgbImage};

use super::decoder::{FrameStream, MediaDecoder, MediaInfo, SampleOptions};
use super::error::FrameError;
use super::types::Frame;

/// FFmpeg/ffprobe backed [`MediaDecoder`].
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Check if FFmpeg is available.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl MediaDecoder for FfmpegDecoder {
    fn probe(&self, path: &Path) -> Result<MediaInfo, FrameError> {
        if !path.exists() {
            return Err(FrameError::InputNotFound(path.to_path_buf()));
        }

        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        tracing::info!("[VideoProps] Detecting properties for: {}", filename);

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-show_entries",
                "stream=codec_type,codec_name,r_frame_rate,width,height,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == IoErrorKind::NotFound {
                    FrameError::ToolNotFound("ffprobe")
                } else {
                    FrameError::PropertiesFailed(format!("ffprobe execution failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameError::PropertiesFailed(format!(
                "ffprobe failed: {}",
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout), path)?;

        tracing::info!(
            "[VideoProps] Resolution: {}x{}, FPS: {:.3}, Duration: {:.1}s, Audio: {}",
            info.width,
            info.height,
            info.fps,
            info.duration_secs,
            if info.has_audio { "yes" } else { "no" }
        );

        Ok(info)
    }

    fn sample_frames(
        &self,
        path: &Path,
        info: &MediaInfo,
        options: &SampleOptions,
    ) -> Result<FrameStream, FrameError> {
        let (width, height) = info.scaled_size(options.width);
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidData(format!(
                "cannot sample frames at {}x{}",
                width, height
            )));
        }

        let interval = if options.interval.is_zero() {
            Duration::from_secs(1)
        } else {
            options.interval
        };
        let filter = format!(
            "fps=1/{:.3},scale={}:{}",
            interval.as_secs_f64(),
            width,
            height
        );

        tracing::debug!(
            "[FFmpeg] Sampling {} every {:.2}s at {}x{}",
            path.display(),
            interval.as_secs_f64(),
            width,
            height
        );

        let mut child = Command::new(&self.ffmpeg)
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(path)
            .args(["-an", "-vf", &filter, "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == IoErrorKind::NotFound {
                    FrameError::ToolNotFound("ffmpeg")
                } else {
                    FrameError::decode(None, format!("FFmpeg execution failed: {}", e))
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FrameError::decode(None, "FFmpeg stdout not captured"))?;

        Ok(Box::new(FfmpegFrameStream {
            child,
            stdout,
            width,
            height,
            interval,
            index: 0,
            last_timestamp: None,
            done: false,
        }))
    }

    fn backend_name(&self) -> &str {
        "ffmpeg"
    }
}

/// Parse ffprobe JSON into [`MediaInfo`].
fn parse_probe_output(json: &str, path: &Path) -> Result<MediaInfo, FrameError> {
    let data: serde_json::Value = serde_json::from_str(json).map_err(|e| {
        FrameError::PropertiesFailed(format!("Failed to parse ffprobe JSON: {}", e))
    })?;

    let streams = data
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("video"))
        .ok_or_else(|| FrameError::NoVideoStream(path.to_path_buf()))?;

    let has_audio = streams
        .iter()
        .any(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("audio"));

    let mut info = MediaInfo {
        detection_source: "ffprobe".to_string(),
        has_audio,
        codec: video
            .get("codec_name")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        ..MediaInfo::default()
    };

    if let Some(rate) = video.get("r_frame_rate").and_then(|v| v.as_str()) {
        info.fps = parse_fps_fraction(rate).unwrap_or(0.0);
    }
    info.width = video.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    info.height = video.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

    // Stream duration first, then format (MKV often only has format duration)
    let stream_duration = video
        .get("duration")
        .and_then(|v| v.as_str())
        .and_then(|d| d.parse::<f64>().ok());
    let format_duration = data
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|v| v.as_str())
        .and_then(|d| d.parse::<f64>().ok());
    info.duration_secs = stream_duration
        .filter(|d| *d > 0.0)
        .or(format_duration)
        .unwrap_or(0.0);

    if info.duration_secs.is_nan() || info.duration_secs <= 0.0 {
        return Err(FrameError::ZeroDuration(path.to_path_buf()));
    }

    Ok(info)
}

/// Parse an ffprobe fraction such as `30000/1001`.
fn parse_fps_fraction(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => rate.trim().parse().ok(),
    }
}

/// Raw RGB24 frames read from a running ffmpeg process.
struct FfmpegFrameStream {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    interval: Duration,
    index: u64,
    last_timestamp: Option<Duration>,
    done: bool,
}

impl FfmpegFrameStream {
    fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Fill `buf` completely. Returns the number of bytes read, which is
    /// less than `buf.len()` only at end of stream.
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn fail(&mut self, message: String) -> Option<Result<Frame, FrameError>> {
        self.done = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
        Some(Err(FrameError::decode(self.last_timestamp, message)))
    }
}

impl Iterator for FfmpegFrameStream {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = vec![0u8; self.frame_size()];
        let read = match self.read_full(&mut buf) {
            Ok(n) => n,
            Err(e) => return self.fail(format!("Failed to read FFmpeg output: {}", e)),
        };

        if read == 0 {
            self.done = true;
            return match self.child.wait() {
                Ok(status) if status.success() => None,
                Ok(status) => {
                    let message = format!("FFmpeg exited with {}", status);
                    Some(Err(FrameError::decode(self.last_timestamp, message)))
                }
                Err(e) => Some(Err(FrameError::decode(
                    self.last_timestamp,
                    format!("Failed to wait for FFmpeg: {}", e),
                ))),
            };
        }

        if read < buf.len() {
            return self.fail(format!(
                "Truncated frame: got {} of {} bytes",
                read,
                buf.len()
            ));
        }

        let Some(raster) = RgbImage::from_raw(self.width, self.height, buf) else {
            return self.fail("Frame buffer does not match frame size".to_string());
        };

        let timestamp = self.interval.saturating_mul(self.index as u32);
        let frame = Frame::new(self.index, timestamp, DynamicImage::ImageRgb8(raster));
        self.index += 1;
        self.last_timestamp = Some(timestamp);
        Some(Ok(frame))
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "r_frame_rate": "30000/1001",
             "width": 1920, "height": 1080, "duration": "300.500000"},
            {"codec_type": "audio", "codec_name": "aac", "r_frame_rate": "0/0"}
        ],
        "format": {"duration": "300.520000"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(PROBE_JSON, Path::new("meeting.mp4")).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert!((info.duration_secs - 300.5).abs() < 1e-6);
        assert!(info.has_audio);
        assert_eq!(info.codec.as_deref(), Some("h264"));
    }

    #[test]
    fn test_format_duration_fallback() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360,
            "r_frame_rate": "25/1"}], "format": {"duration": "61.0"}}"#;
        let info = parse_probe_output(json, Path::new("a.mkv")).unwrap();
        assert!((info.duration_secs - 61.0).abs() < 1e-6);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360}],
            "format": {"duration": "0.0"}}"#;
        let result = parse_probe_output(json, Path::new("empty.mp4"));
        assert!(matches!(result, Err(FrameError::ZeroDuration(_))));
    }

    #[test]
    fn test_audio_only_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "10.0"}}"#;
        let result = parse_probe_output(json, Path::new("audio.m4a"));
        assert!(matches!(result, Err(FrameError::NoVideoStream(_))));
    }

    #[test]
    fn test_parse_fps_fraction() {
        assert_eq!(parse_fps_fraction("25/1"), Some(25.0));
        assert_eq!(parse_fps_fraction("0/0"), None);
        assert_eq!(parse_fps_fraction("24"), Some(24.0));
    }

    #[test]
    fn test_probe_nonexistent() {
        let decoder = FfmpegDecoder::default();
        let result = decoder.probe(Path::new("/nonexistent/meeting.mp4"));
        assert!(matches!(result, Err(FrameError::InputNotFound(_))));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("meeting.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let decoder = FfmpegDecoder::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let result = decoder.probe(&video);
        assert!(matches!(result, Err(FrameError::ToolNotFound("ffprobe"))));
    }
}
