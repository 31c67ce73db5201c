//! OpenAI-compatible `/audio/transcriptions` client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::Serialize;
use serde_json::Value;

use super::audio::extract_audio;
use super::error::TranscriptionError;
use super::types::{Transcriber, Transcript, TranscriptSegment};
use crate::config::TranscriptionSettings;
use crate::inference::RetryPolicy;

/// Extracts audio with FFmpeg and uploads it to a Whisper-style service.
pub struct HttpTranscriber {
    http: Client,
    service_url: String,
    model: String,
    language: Option<String>,
    sample_rate: u32,
    ffmpeg: PathBuf,
    retry: RetryPolicy,
}

impl HttpTranscriber {
    pub fn from_settings(
        settings: &TranscriptionSettings,
        ffmpeg: impl Into<PathBuf>,
    ) -> Result<Self, TranscriptionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| TranscriptionError::Client(e.to_string()))?;

        Ok(Self {
            http,
            service_url: settings.service_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            language: settings.language.clone(),
            sample_rate: settings.sample_rate,
            ffmpeg: ffmpeg.into(),
            retry: RetryPolicy::new(
                settings.max_retries,
                Duration::from_millis(settings.retry_base_delay_ms),
            ),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.service_url)
    }

    fn upload(&self, wav: &Path) -> Result<Transcript, TranscriptionError> {
        let bytes = std::fs::read(wav).map_err(|e| TranscriptionError::io(wav, e))?;
        let file_name = wav
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());
        let url = self.endpoint();

        self.retry.run("transcribe audio", |attempt| {
            tracing::debug!(
                "[Transcribe] POST {} model={} (attempt {})",
                url,
                self.model,
                attempt + 1
            );

            let part = multipart::Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str("audio/wav")
                .map_err(|e| TranscriptionError::Client(e.to_string()))?;
            let mut form = multipart::Form::new()
                .part("file", part)
                .text("model", self.model.clone())
                .text("response_format", "verbose_json");
            if let Some(language) = &self.language {
                form = form.text("language", language.clone());
            }

            let response = self.http.post(&url).multipart(form).send().map_err(|e| {
                if let Some(status) = e.status() {
                    TranscriptionError::Service {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else {
                    TranscriptionError::ServiceUnreachable {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(TranscriptionError::Service {
                    status: status.as_u16(),
                    message: body.chars().take(300).collect(),
                });
            }

            let payload: Value = response
                .json()
                .map_err(|e| TranscriptionError::MalformedResponse(e.to_string()))?;
            parse_verbose_json(&payload)
        })
    }
}

impl Transcriber for HttpTranscriber {
    fn name(&self) -> &str {
        "whisper-http"
    }

    fn transcribe(&self, media: &Path, work_dir: &Path) -> Result<Transcript, TranscriptionError> {
        let wav = extract_audio(&self.ffmpeg, media, work_dir, self.sample_rate)?;

        tracing::info!(
            "[Transcribe] Transcribing with model '{}' at {}",
            self.model,
            self.service_url
        );
        let transcript = self.upload(&wav)?;
        tracing::info!(
            "[Transcribe] {} segments, language {}",
            transcript.segments().len(),
            transcript.language.as_deref().unwrap_or("unknown")
        );

        let stem = media
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        save_transcript(&transcript, &work_dir.join(format!("{}_transcript.json", stem)))?;

        Ok(transcript)
    }
}

/// Parse a `verbose_json` transcription response.
///
/// A response with text but no segments becomes a single segment spanning
/// the reported duration.
fn parse_verbose_json(payload: &Value) -> Result<Transcript, TranscriptionError> {
    let text = payload.get("text").and_then(Value::as_str);
    let language = payload
        .get("language")
        .and_then(Value::as_str)
        .map(str::to_string);
    let duration = payload.get("duration").and_then(Value::as_f64);

    let mut segments = Vec::new();
    match payload.get("segments") {
        Some(Value::Array(items)) => {
            for item in items {
                let start = item.get("start").and_then(Value::as_f64);
                let end = item.get("end").and_then(Value::as_f64);
                let seg_text = item.get("text").and_then(Value::as_str);
                match (start, end, seg_text) {
                    (Some(start), Some(end), Some(seg_text)) => {
                        segments.push(TranscriptSegment::new(start, end, seg_text));
                    }
                    _ => {
                        return Err(TranscriptionError::MalformedResponse(format!(
                            "segment missing start/end/text: {}",
                            item
                        )))
                    }
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            return Err(TranscriptionError::MalformedResponse(format!(
                "segments is not an array: {}",
                other
            )))
        }
    }

    if segments.is_empty() {
        match text {
            Some(t) if !t.trim().is_empty() => {
                segments.push(TranscriptSegment::new(0.0, duration.unwrap_or(0.0), t));
            }
            Some(_) => {}
            None => {
                return Err(TranscriptionError::MalformedResponse(
                    "response has neither text nor segments".to_string(),
                ))
            }
        }
    }

    Ok(Transcript::new(segments, language, duration))
}

#[derive(Serialize)]
struct SavedTranscript<'a> {
    text: String,
    language: Option<&'a str>,
    duration: Option<f64>,
    segments: &'a [TranscriptSegment],
}

fn save_transcript(transcript: &Transcript, path: &Path) -> Result<(), TranscriptionError> {
    let saved = SavedTranscript {
        text: transcript.text(),
        language: transcript.language.as_deref(),
        duration: transcript.duration_secs,
        segments: transcript.segments(),
    };
    let json = serde_json::to_string_pretty(&saved)
        .map_err(|e| TranscriptionError::MalformedResponse(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| TranscriptionError::io(path, e))?;
    tracing::debug!("[Transcribe] Saved transcript to {}", path.display());
    Ok(())
}
