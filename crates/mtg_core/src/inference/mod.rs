//! Vision and text model inference.
//!
//! # Components
//!
//! - **client**: [`InferenceClient`] trait used by the analysis stages
//! - **chat**: OpenAI-compatible chat completions client (LM Studio)
//! - **retry**: bounded exponential backoff shared with transcription
//! - **prompts**: prompts for frame, transcript, and requirements analysis

mod chat;
mod client;
mod error;
pub mod prompts;
mod retry;

pub use chat::ChatCompletionsClient;
pub use client::{InferenceClient, TextRequest};
pub use error::InferenceError;
pub use retry::{RetryPolicy, Retryable};
