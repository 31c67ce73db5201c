//! Audio extraction and speech-to-text.
//!
//! The pipeline only depends on the [`Transcriber`] trait. The shipped
//! implementation extracts 16 kHz mono WAV with FFmpeg and uploads it to
//! an OpenAI-compatible transcription endpoint.

mod audio;
mod error;
mod http;
mod types;

pub use audio::extract_audio;
pub use error::TranscriptionError;
pub use http::HttpTranscriber;
pub use types::{Transcriber, Transcript, TranscriptChunk, TranscriptSegment};
