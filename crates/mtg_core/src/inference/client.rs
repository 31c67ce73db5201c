//! Inference client abstraction.

use super::error::InferenceError;

/// A text generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens,
            temperature: 0.3,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Vision/text model service.
///
/// Calls are blocking. Implementations apply their own bounded retry.
pub trait InferenceClient: Send + Sync {
    /// Describe a JPEG image using the vision model.
    fn describe_image(
        &self,
        jpeg: &[u8],
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, InferenceError>;

    /// Generate text using the text model.
    fn complete(&self, request: &TextRequest) -> Result<String, InferenceError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
