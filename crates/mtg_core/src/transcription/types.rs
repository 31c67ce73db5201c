//! Transcript types and the transcriber seam.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::TranscriptionError;
use crate::frames::{format_timestamp, secs_to_duration};

/// One timed piece of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds (never before `start`).
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Ordered, non-overlapping transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
    /// Detected or requested language.
    pub language: Option<String>,
    /// Audio duration reported by the service.
    pub duration_secs: Option<f64>,
}

/// A run of consecutive segments sent to the text model together.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TranscriptChunk {
    /// "MM:SS-MM:SS" span label.
    pub fn span(&self) -> String {
        format!(
            "{}-{}",
            format_timestamp(secs_to_duration(self.start)),
            format_timestamp(secs_to_duration(self.end))
        )
    }
}

/// Latest timestamp accepted from a transcription service (one week).
const MAX_SEGMENT_SECS: f64 = 7.0 * 24.0 * 3600.0;

fn plausible_time(secs: f64) -> bool {
    secs.is_finite() && secs <= MAX_SEGMENT_SECS
}

impl Transcript {
    /// Build a transcript from raw service segments.
    ///
    /// Blank segments and segments whose times are not finite or lie more
    /// than a week in are dropped. The rest are sorted by start time, `end`
    /// is raised to at least `start`, and a segment that starts before the
    /// previous one ends is clipped to begin there.
    pub fn new(
        mut segments: Vec<TranscriptSegment>,
        language: Option<String>,
        duration_secs: Option<f64>,
    ) -> Self {
        segments.retain(|s| {
            plausible_time(s.start) && plausible_time(s.end) && !s.text.trim().is_empty()
        });
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut normalized: Vec<TranscriptSegment> = Vec::with_capacity(segments.len());
        for mut seg in segments {
            seg.start = seg.start.max(0.0);
            if let Some(prev) = normalized.last() {
                if seg.start < prev.end {
                    seg.start = prev.end;
                }
            }
            if seg.end < seg.start {
                seg.end = seg.start;
            }
            seg.text = seg.text.trim().to_string();
            normalized.push(seg);
        }

        Self {
            segments: normalized,
            language,
            duration_secs,
        }
    }

    /// Transcript with no speech, used when audio is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Full text, segments joined by spaces.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Split into chunks of at most `max_chars` characters on segment
    /// boundaries. A single segment longer than `max_chars` is split on
    /// whitespace (or hard-cut when it has none) and keeps its time span.
    pub fn chunks(&self, max_chars: usize) -> Vec<TranscriptChunk> {
        let max_chars = max_chars.max(1);
        let mut chunks = Vec::new();
        let mut current: Option<TranscriptChunk> = None;

        for seg in &self.segments {
            for piece in split_text(&seg.text, max_chars) {
                let piece_len = piece.chars().count();
                match current.as_mut() {
                    Some(chunk) if chunk.text.chars().count() + 1 + piece_len <= max_chars => {
                        chunk.text.push(' ');
                        chunk.text.push_str(&piece);
                        chunk.end = seg.end;
                    }
                    _ => {
                        if let Some(done) = current.take() {
                            chunks.push(done);
                        }
                        current = Some(TranscriptChunk {
                            start: seg.start,
                            end: seg.end,
                            text: piece,
                        });
                    }
                }
            }
        }
        if let Some(done) = current {
            chunks.push(done);
        }
        chunks
    }
}

fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        // Hard-cut words that cannot fit on their own.
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let cut = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            pieces.push(word[..cut].to_string());
            word = word[cut..].to_string();
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Speech-to-text collaborator.
///
/// Blocking; implementations apply their own bounded retry.
pub trait Transcriber: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Extract the audio track of `media` into `work_dir` and transcribe it.
    fn transcribe(&self, media: &Path, work_dir: &Path) -> Result<Transcript, TranscriptionError>;
}
