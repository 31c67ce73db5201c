//! In-process collaborators for pipeline tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};

use super::context::{renderers_for, RunContext, Services};
use crate::config::Settings;
use crate::frames::{Frame, FrameError, FrameStream, MediaDecoder, MediaInfo, SampleOptions};
use crate::inference::{InferenceClient, InferenceError, TextRequest};
use crate::transcription::{Transcriber, Transcript, TranscriptSegment, TranscriptionError};

pub const REQUIREMENTS_REPLY: &str = r#"```json
{
  "PROJECT OVERVIEW": "Customer portal rebuild",
  "FUNCTIONAL REQUIREMENTS": ["Users can reset passwords", "Export invoices as PDF"],
  "NON-FUNCTIONAL REQUIREMENTS": ["Pages load in under 2 seconds"],
  "ISSUES AND CONCERNS": ["Legacy SSO migration timeline"]
}
```"#;

/// Synthetic video: one solid gray level per scene, one frame per second.
pub struct FakeDecoder {
    pub duration_secs: u64,
    /// Scene start times in seconds; the first scene must start at 0.
    pub scene_starts: Vec<u64>,
    /// Fail with a decode error after this many frames.
    pub fail_after: Option<u64>,
    pub missing_input: bool,
    pub has_audio: bool,
}

impl FakeDecoder {
    pub fn new(duration_secs: u64, scene_starts: Vec<u64>) -> Self {
        Self {
            duration_secs,
            scene_starts,
            fail_after: None,
            missing_input: false,
            has_audio: true,
        }
    }

    fn level_at(&self, sec: u64) -> u8 {
        let scene = self.scene_starts.iter().filter(|&&s| s <= sec).count().max(1) - 1;
        if scene % 2 == 0 {
            40
        } else {
            200
        }
    }
}

impl MediaDecoder for FakeDecoder {
    fn probe(&self, path: &Path) -> Result<MediaInfo, FrameError> {
        if self.missing_input {
            return Err(FrameError::InputNotFound(path.to_path_buf()));
        }
        Ok(MediaInfo {
            fps: 30.0,
            width: 32,
            height: 24,
            duration_secs: self.duration_secs as f64,
            has_audio: self.has_audio,
            detection_source: "fake".to_string(),
            ..MediaInfo::default()
        })
    }

    fn sample_frames(
        &self,
        _path: &Path,
        _info: &MediaInfo,
        _options: &SampleOptions,
    ) -> Result<FrameStream, FrameError> {
        let frames: Vec<Result<Frame, FrameError>> = (0..self.duration_secs)
            .map(|sec| match self.fail_after {
                Some(n) if sec >= n => Err(FrameError::decode(
                    Some(Duration::from_secs(sec)),
                    "corrupt packet",
                )),
                _ => {
                    let v = self.level_at(sec);
                    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([v, v, v])));
                    Ok(Frame::new(sec, Duration::from_secs(sec), image))
                }
            })
            .collect();
        Ok(Box::new(frames.into_iter()))
    }

    fn backend_name(&self) -> &str {
        "fake"
    }
}

type TranscriptFn = dyn Fn() -> Result<Transcript, TranscriptionError> + Send + Sync;
type Hook = dyn Fn() + Send + Sync;

/// Transcriber returning a scripted result, with an optional hook run on call.
pub struct ScriptedTranscriber {
    result: Box<TranscriptFn>,
    on_call: Option<Box<Hook>>,
    pub calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn ok() -> Self {
        Self::with(|| Ok(sample_transcript()))
    }

    pub fn unreachable() -> Self {
        Self::with(|| {
            Err(TranscriptionError::ServiceUnreachable {
                url: "http://localhost:8000/v1".to_string(),
                message: "connection refused".to_string(),
            })
        })
    }

    pub fn with<F>(result: F) -> Self
    where
        F: Fn() -> Result<Transcript, TranscriptionError> + Send + Sync + 'static,
    {
        Self {
            result: Box::new(result),
            on_call: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_call<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_call = Some(Box::new(hook));
        self
    }
}

impl Transcriber for ScriptedTranscriber {
    fn name(&self) -> &str {
        "scripted"
    }

    fn transcribe(&self, _media: &Path, _work_dir: &Path) -> Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_call {
            hook();
        }
        (self.result)()
    }
}

pub struct PanickingTranscriber;

impl Transcriber for PanickingTranscriber {
    fn name(&self) -> &str {
        "panicking"
    }

    fn transcribe(&self, _media: &Path, _work_dir: &Path) -> Result<Transcript, TranscriptionError> {
        panic!("audio buffer overflow")
    }
}

pub fn sample_transcript() -> Transcript {
    Transcript::new(
        vec![
            TranscriptSegment::new(0.0, 12.0, "Welcome, today we plan the customer portal."),
            TranscriptSegment::new(12.0, 40.0, "Users must be able to reset their passwords."),
            TranscriptSegment::new(40.0, 75.0, "Invoices should be exportable as PDF."),
        ],
        Some("en".to_string()),
        Some(300.0),
    )
}

/// Inference client with scripted failures.
pub struct ScriptedInference {
    /// Zero-based image calls that fail with a malformed response.
    pub failing_images: Vec<usize>,
    /// Every call fails as unreachable.
    pub unreachable: bool,
    pub reply: String,
    pub image_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self {
            failing_images: Vec::new(),
            unreachable: false,
            reply: REQUIREMENTS_REPLY.to_string(),
            image_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
        }
    }

    fn down() -> InferenceError {
        InferenceError::Unreachable {
            url: "http://localhost:1234/v1".to_string(),
            message: "connection refused".to_string(),
        }
    }
}

impl InferenceClient for ScriptedInference {
    fn describe_image(
        &self,
        jpeg: &[u8],
        _prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let call = self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Self::down());
        }
        if self.failing_images.contains(&call) {
            return Err(InferenceError::Malformed("missing choices".to_string()));
        }
        assert!(jpeg.starts_with(&[0xFF, 0xD8]), "frames are sent as JPEG");
        Ok(format!("Slide {} showing the portal mockup", call + 1))
    }

    fn complete(&self, request: &TextRequest) -> Result<String, InferenceError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Self::down());
        }
        if request.max_tokens >= Settings::default().inference.requirements_max_tokens {
            Ok(self.reply.clone())
        } else {
            Ok("- Password reset\n- PDF invoices".to_string())
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Collaborators for a test run.
pub fn services(
    settings: &Settings,
    decoder: FakeDecoder,
    transcriber: Arc<dyn Transcriber>,
    inference: Arc<dyn InferenceClient>,
) -> Services {
    Services {
        decoder: Arc::new(decoder),
        transcriber,
        inference,
        renderers: renderers_for(settings),
    }
}

/// Settings writing into `dir`, without a run log file.
pub fn settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.output_folder = dir.join("output").to_string_lossy().to_string();
    settings.logging.run_log = false;
    settings
}

pub fn context(settings: Settings, services: Services) -> RunContext {
    RunContext::new(settings, "Portal Kickoff", "meeting.mp4", services).unwrap()
}
