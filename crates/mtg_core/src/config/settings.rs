//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use super::manager::ConfigError;
use crate::document::OutputFormat;
use crate::frames::FrameMode;
use crate::logging::{LogConfig, LogLevel};

/// Longest accepted sampling or interval step, in seconds (one day).
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Most retries a service call may be configured with.
pub const MAX_RETRIES: u32 = 5;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Frame sampling and key-frame selection.
    #[serde(default)]
    pub frames: FrameSettings,

    /// Audio extraction and speech-to-text.
    #[serde(default)]
    pub transcription: TranscriptionSettings,

    /// Vision/text model service.
    #[serde(default)]
    pub inference: InferenceSettings,

    /// Generated documents.
    #[serde(default)]
    pub output: OutputSettings,
}

impl Settings {
    /// Reject values no run can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.frames;
        if !f.threshold.is_finite() || f.threshold < 0.0 {
            return Err(ConfigError::invalid("frames.threshold", "must be a non-negative number"));
        }
        if f.max_key_frames == 0 {
            return Err(ConfigError::invalid("frames.max_key_frames", "must be at least 1"));
        }
        if !(f.sample_interval_secs > 0.0 && f.sample_interval_secs <= MAX_INTERVAL_SECS) {
            return Err(ConfigError::invalid(
                "frames.sample_interval_secs",
                "must be positive and at most 86400",
            ));
        }
        if !(f.interval_secs >= 0.0 && f.interval_secs <= MAX_INTERVAL_SECS) {
            return Err(ConfigError::invalid(
                "frames.interval_secs",
                "must be between 0 and 86400",
            ));
        }
        if self.inference.max_retries > MAX_RETRIES {
            return Err(ConfigError::invalid("inference.max_retries", "must be at most 5"));
        }
        if self.transcription.max_retries > MAX_RETRIES {
            return Err(ConfigError::invalid("transcription.max_retries", "must be at most 5"));
        }
        if self.inference.transcript_chunk_chars == 0 {
            return Err(ConfigError::invalid(
                "inference.transcript_chunk_chars",
                "must be at least 1",
            ));
        }
        if self.output.formats.is_empty() {
            return Err(ConfigError::invalid("output.formats", "at least one format is required"));
        }
        Ok(())
    }
}

/// Path configuration for output, logs, and external tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for frames, audio, and documents.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder for run logs; relative paths are resolved under the output folder.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// FFmpeg executable.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// FFprobe executable.
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_output_folder() -> String {
    "output".to_string()
}

fn default_logs_folder() -> String {
    "logs".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            logs_folder: default_logs_folder(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level for the run log.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines kept for failure diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Item progress step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Write a per-run log file.
    #[serde(default = "default_true")]
    pub run_log: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            run_log: true,
        }
    }
}

impl LoggingSettings {
    /// Logger configuration for a run.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail as usize,
        }
    }
}

/// Frame sampling and key-frame selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSettings {
    /// Scene-change or evenly spaced selection.
    #[serde(default)]
    pub mode: FrameMode,

    /// Change-score threshold for scene-change selection (0..=255).
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Maximum number of key frames.
    #[serde(default = "default_max_key_frames")]
    pub max_key_frames: u32,

    /// Fall back to evenly spaced frames below this many scene changes.
    #[serde(default = "default_min_useful")]
    pub min_useful: u32,

    /// Seconds between sampled frames.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: f64,

    /// Seconds between frames in interval mode and for the fallback.
    #[serde(default = "default_interval")]
    pub interval_secs: f64,

    /// Width frames are decoded at (0 keeps the source width).
    #[serde(default = "default_decode_width")]
    pub decode_width: u32,
}

fn default_threshold() -> f64 {
    30.0
}

fn default_max_key_frames() -> u32 {
    15
}

fn default_min_useful() -> u32 {
    1
}

fn default_sample_interval() -> f64 {
    1.0
}

fn default_interval() -> f64 {
    10.0
}

fn default_decode_width() -> u32 {
    1280
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            mode: FrameMode::default(),
            threshold: default_threshold(),
            max_key_frames: default_max_key_frames(),
            min_useful: default_min_useful(),
            sample_interval_secs: default_sample_interval(),
            interval_secs: default_interval(),
            decode_width: default_decode_width(),
        }
    }
}

/// Audio extraction and speech-to-text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    /// Base URL of an OpenAI-compatible speech-to-text service.
    #[serde(default = "default_transcription_url")]
    pub service_url: String,

    /// Whisper model name.
    #[serde(default = "default_whisper_model")]
    pub model: String,

    /// Spoken language hint (ISO 639-1); detected when unset.
    #[serde(default)]
    pub language: Option<String>,

    /// Sample rate of the extracted audio.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_transcription_timeout")]
    pub timeout_secs: u64,

    /// Retries for a failed upload when the service is unreachable or busy.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubled on each further retry.
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_transcription_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_whisper_model() -> String {
    "small".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_transcription_timeout() -> u64 {
    1800
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            service_url: default_transcription_url(),
            model: default_whisper_model(),
            language: None,
            sample_rate: default_sample_rate(),
            timeout_secs: default_transcription_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_delay(),
        }
    }
}

/// Vision/text model service (LM Studio or any OpenAI-compatible server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Base URL of the chat completions service.
    #[serde(default = "default_lm_studio_url")]
    pub base_url: String,

    /// Bearer token sent to the service; LM Studio ignores it.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Model used for transcript analysis and requirements.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model used for frame descriptions.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// The vision model runs on CPU (slower; logged as a note).
    #[serde(default)]
    pub vision_on_cpu: bool,

    /// Maximum number of key frames sent to the vision model.
    #[serde(default = "default_max_frames_to_analyze")]
    pub max_frames_to_analyze: u32,

    /// Maximum characters per transcript chunk.
    #[serde(default = "default_chunk_chars")]
    pub transcript_chunk_chars: u32,

    /// Token limit for each frame description.
    #[serde(default = "default_frame_max_tokens")]
    pub frame_max_tokens: u32,

    /// Token limit for each transcript chunk summary.
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: u32,

    /// Token limit for the requirements document.
    #[serde(default = "default_requirements_max_tokens")]
    pub requirements_max_tokens: u32,

    /// Sampling temperature for text generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,

    /// Retries per call for retryable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubled on each further retry.
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_lm_studio_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_api_key() -> String {
    "lm-studio".to_string()
}

fn default_text_model() -> String {
    "phi-3-mini".to_string()
}

fn default_vision_model() -> String {
    "llava-7b-q4".to_string()
}

fn default_max_frames_to_analyze() -> u32 {
    10
}

fn default_chunk_chars() -> u32 {
    6000
}

fn default_frame_max_tokens() -> u32 {
    500
}

fn default_chunk_max_tokens() -> u32 {
    800
}

fn default_requirements_max_tokens() -> u32 {
    3000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_inference_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    500
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            base_url: default_lm_studio_url(),
            api_key: default_api_key(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            vision_on_cpu: false,
            max_frames_to_analyze: default_max_frames_to_analyze(),
            transcript_chunk_chars: default_chunk_chars(),
            frame_max_tokens: default_frame_max_tokens(),
            chunk_max_tokens: default_chunk_max_tokens(),
            requirements_max_tokens: default_requirements_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_inference_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_delay(),
        }
    }
}

/// Generated documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Formats rendered by the document stage.
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,

    /// Write `analysis_results.json` at the end of every run.
    #[serde(default = "default_true")]
    pub write_results: bool,
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Markdown, OutputFormat::Json]
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            write_results: true,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Frames,
    Transcription,
    Inference,
    Output,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Frames,
        ConfigSection::Transcription,
        ConfigSection::Inference,
        ConfigSection::Output,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Frames => "frames",
            ConfigSection::Transcription => "transcription",
            ConfigSection::Inference => "inference",
            ConfigSection::Output => "output",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output directories and external tools",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Frames => "Frame sampling and key-frame selection",
            ConfigSection::Transcription => "Audio extraction and speech-to-text service",
            ConfigSection::Inference => "Vision and text model service (LM Studio)",
            ConfigSection::Output => "Generated documents",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[frames]"));
        assert!(toml.contains("output_folder"));
        assert!(toml.contains("scene_change"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[frames]\nthreshold = 12.5\nmode = \"interval\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.frames.threshold, 12.5);
        assert_eq!(parsed.frames.mode, FrameMode::Interval);
        assert_eq!(parsed.frames.max_key_frames, 15);
        assert_eq!(parsed.inference.base_url, "http://localhost:1234/v1");
        assert_eq!(parsed.inference.text_model, "phi-3-mini");
        assert_eq!(parsed.transcription.model, "small");
        assert_eq!(parsed.output.formats.len(), 2);
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.frames.sample_interval_secs = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.frames.sample_interval_secs = 1e30;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.frames.interval_secs = 1e30;
        assert!(settings.validate().is_err());
        settings.frames.interval_secs = MAX_INTERVAL_SECS;
        assert!(settings.validate().is_ok());

        let mut settings = Settings::default();
        settings.inference.max_retries = 1000;
        assert!(settings.validate().is_err());
        settings.inference.max_retries = MAX_RETRIES;
        assert!(settings.validate().is_ok());

        let mut settings = Settings::default();
        settings.transcription.max_retries = MAX_RETRIES + 1;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.output.formats.clear();
        assert!(settings.validate().is_err());
    }
}
