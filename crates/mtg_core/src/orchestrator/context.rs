//! Read-only run context and collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult};
use crate::config::Settings;
use crate::document::DocumentRenderer;
use crate::frames::{FfmpegDecoder, MediaDecoder};
use crate::inference::{ChatCompletionsClient, InferenceClient};
use crate::logging::RunLogger;
use crate::transcription::{HttpTranscriber, Transcriber};

/// External collaborators used by the stages.
pub struct Services {
    pub decoder: Arc<dyn MediaDecoder>,
    pub transcriber: Arc<dyn Transcriber>,
    pub inference: Arc<dyn InferenceClient>,
    pub renderers: Vec<Box<dyn DocumentRenderer>>,
}

impl Services {
    /// Production collaborators: FFmpeg, HTTP transcription, chat completions.
    pub fn from_settings(settings: &Settings) -> PipelineResult<Self> {
        let paths = &settings.paths;
        let decoder = FfmpegDecoder::new(&paths.ffmpeg, &paths.ffprobe);
        let transcriber = HttpTranscriber::from_settings(&settings.transcription, &paths.ffmpeg)
            .map_err(|e| PipelineError::collaborator("transcriber", e.to_string()))?;
        let inference = ChatCompletionsClient::from_settings(&settings.inference)
            .map_err(|e| PipelineError::collaborator("inference client", e.to_string()))?;

        Ok(Self {
            decoder: Arc::new(decoder),
            transcriber: Arc::new(transcriber),
            inference: Arc::new(inference),
            renderers: renderers_for(settings),
        })
    }
}

/// One renderer per configured output format, duplicates removed.
pub fn renderers_for(settings: &Settings) -> Vec<Box<dyn DocumentRenderer>> {
    let mut seen = Vec::new();
    settings
        .output
        .formats
        .iter()
        .copied()
        .filter(|f| {
            if seen.contains(f) {
                false
            } else {
                seen.push(*f);
                true
            }
        })
        .map(|f| f.renderer())
        .collect()
}

/// Read-only context shared by all stages of one run.
pub struct RunContext {
    pub settings: Settings,
    pub project_name: String,
    pub media_path: PathBuf,
    pub output_dir: PathBuf,
    pub frames_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub logger: Arc<RunLogger>,
    pub services: Services,
}

impl RunContext {
    /// Create the output directories and the run log.
    ///
    /// The output directory is `settings.paths.output_folder`; the log
    /// folder is resolved under it when relative.
    pub fn new(
        settings: Settings,
        project_name: impl Into<String>,
        media_path: impl Into<PathBuf>,
        services: Services,
    ) -> PipelineResult<Self> {
        let project_name = project_name.into();
        settings
            .validate()
            .map_err(|e| PipelineError::invalid_config(&project_name, e.to_string()))?;

        let output_dir = PathBuf::from(&settings.paths.output_folder);
        let frames_dir = output_dir.join("frames");
        let audio_dir = output_dir.join("audio");
        for dir in [&output_dir, &frames_dir, &audio_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                PipelineError::setup_failed(&project_name, format!("create {}", dir.display()), e)
            })?;
        }

        let log_config = settings.logging.to_log_config();
        let logger = if settings.logging.run_log {
            let logs_dir = resolve_under(&output_dir, &settings.paths.logs_folder);
            RunLogger::new(&project_name, &logs_dir, log_config, None)
                .map_err(|e| PipelineError::setup_failed(&project_name, "open run log", e))?
        } else {
            RunLogger::detached(&project_name, log_config)
        };

        Ok(Self {
            settings,
            project_name,
            media_path: media_path.into(),
            output_dir,
            frames_dir,
            audio_dir,
            logger: Arc::new(logger),
            services,
        })
    }

    /// Replace the run logger (for a logger with a console callback).
    pub fn with_logger(mut self, logger: Arc<RunLogger>) -> Self {
        self.logger = logger;
        self
    }
}

fn resolve_under(base: &Path, folder: &str) -> PathBuf {
    let path = Path::new(folder);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OutputFormat;

    #[test]
    fn renderers_follow_configured_formats() {
        let mut settings = Settings::default();
        settings.output.formats = vec![OutputFormat::Json, OutputFormat::Markdown, OutputFormat::Json];
        let formats: Vec<_> = renderers_for(&settings).iter().map(|r| r.format()).collect();
        assert_eq!(formats, vec![OutputFormat::Json, OutputFormat::Markdown]);
    }

    #[test]
    fn context_creates_run_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.paths.output_folder = dir.path().join("out").to_string_lossy().to_string();

        let services = Services::from_settings(&settings).unwrap();
        let ctx = RunContext::new(settings, "Kickoff Call", "meeting.mp4", services).unwrap();

        assert!(ctx.frames_dir.is_dir());
        assert!(ctx.audio_dir.is_dir());
        let log = ctx.logger.log_path().unwrap();
        assert!(log.starts_with(dir.path().join("out").join("logs")));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = Settings::default();
        settings.frames.max_key_frames = 0;
        let services = Services::from_settings(&settings).unwrap();
        let err = RunContext::new(settings, "Bad", "x.mp4", services)
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
    }
}
