//! OpenAI-compatible `/chat/completions` client (LM Studio by default).

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::blocking::Client;
use serde_json::{json, Value};

use super::client::{InferenceClient, TextRequest};
use super::error::InferenceError;
use super::retry::RetryPolicy;
use crate::config::InferenceSettings;

/// Blocking chat completions client.
pub struct ChatCompletionsClient {
    http: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    vision_model: String,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;

        if settings.vision_on_cpu {
            tracing::info!("[Inference] Vision model runs on CPU; frame analysis may be slow");
        }

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            text_model: settings.text_model.clone(),
            vision_model: settings.vision_model.clone(),
            retry: RetryPolicy::new(
                settings.max_retries,
                Duration::from_millis(settings.retry_base_delay_ms),
            ),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// POST one request body, with retries.
    fn post(&self, label: &str, model: &str, body: &Value) -> Result<String, InferenceError> {
        let url = self.endpoint();
        self.retry.run(label, |attempt| {
            tracing::debug!("[Inference] {} -> {} (attempt {})", label, model, attempt + 1);

            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .map_err(|e| InferenceError::from_reqwest(&url, e))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().unwrap_or_default();
                return Err(InferenceError::Status {
                    status: status.as_u16(),
                    message: truncate(&text, 300),
                });
            }

            let payload: Value = response
                .json()
                .map_err(|e| InferenceError::Malformed(e.to_string()))?;
            extract_content(&payload, model)
        })
    }
}

impl InferenceClient for ChatCompletionsClient {
    fn describe_image(
        &self,
        jpeg: &[u8],
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg));
        let body = json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]
            }],
            "max_tokens": max_tokens
        });
        self.post("describe image", &self.vision_model, &body)
    }

    fn complete(&self, request: &TextRequest) -> Result<String, InferenceError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": self.text_model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature
        });
        self.post("complete", &self.text_model, &body)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(payload: &Value, model: &str) -> Result<String, InferenceError> {
    let message = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| InferenceError::Malformed("response has no choices".to_string()))?;

    let content = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        // Some servers return content parts even for text replies.
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        Some(Value::Null) | None => String::new(),
        Some(other) => {
            return Err(InferenceError::Malformed(format!(
                "unexpected content type: {}",
                other
            )))
        }
    };

    if content.trim().is_empty() {
        return Err(InferenceError::EmptyResponse(model.to_string()));
    }
    Ok(content)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
