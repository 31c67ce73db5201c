//! Requirements document rendering.
//!
//! Each [`DocumentRenderer`] turns the synthesized [`Requirements`] into
//! one output file. Degraded pipeline stages are passed in so every
//! format can say the document was built from incomplete data.

mod json;
mod markdown;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::logging::sanitize_filename;
use crate::orchestrator::ErrorKind;
use crate::requirements::Requirements;

pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;

/// Document format selectable in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        }
    }

    /// Renderer for this format.
    pub fn renderer(&self) -> Box<dyn DocumentRenderer> {
        match self {
            OutputFormat::Markdown => Box::new(MarkdownRenderer),
            OutputFormat::Json => Box::new(JsonRenderer),
        }
    }
}

/// An upstream stage that finished with incomplete data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedNote {
    pub stage: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Counts describing what the document was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    pub key_frames: usize,
    pub frames_analyzed: usize,
    pub transcript_segments: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_language: Option<String>,
}

/// Everything a renderer needs.
pub struct DocumentInput<'a> {
    pub project_name: &'a str,
    pub generated_at: DateTime<Local>,
    pub requirements: &'a Requirements,
    pub degraded: &'a [DegradedNote],
    pub sources: SourceStats,
}

impl DocumentInput<'_> {
    /// Project name as used in file names (`Roadmap Sync` -> `Roadmap_Sync`).
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.project_name.trim().replace(' ', "_"))
    }
}

/// Errors from rendering or writing a document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to serialize {format} document: {message}")]
    Serialize {
        format: &'static str,
        message: String,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Renders requirements into one output format.
pub trait DocumentRenderer: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Output file name for the given input.
    fn file_name(&self, input: &DocumentInput<'_>) -> String;

    /// Render the document body.
    fn render(&self, input: &DocumentInput<'_>) -> Result<String, RenderError>;

    /// Render and write into `dir`, returning the written path.
    fn write(&self, input: &DocumentInput<'_>, dir: &Path) -> Result<PathBuf, RenderError> {
        let body = self.render(input)?;
        std::fs::create_dir_all(dir).map_err(|e| RenderError::Write {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join(self.file_name(input));
        std::fs::write(&path, body).map_err(|e| RenderError::Write {
            path: path.clone(),
            source: e,
        })?;
        tracing::info!(
            "[Document] {} written: {}",
            self.format().name(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn input<'a>(
        requirements: &'a Requirements,
        degraded: &'a [DegradedNote],
    ) -> DocumentInput<'a> {
        DocumentInput {
            project_name: "Roadmap Sync",
            generated_at: Local::now(),
            requirements,
            degraded,
            sources: SourceStats {
                key_frames: 4,
                frames_analyzed: 4,
                transcript_segments: 12,
                transcript_language: Some("en".into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_uses_lowercase_names() {
        let json = serde_json::to_string(&vec![OutputFormat::Markdown, OutputFormat::Json]).unwrap();
        assert_eq!(json, r#"["markdown","json"]"#);
        assert_eq!(OutputFormat::Json.renderer().format(), OutputFormat::Json);
    }

    #[test]
    fn file_stem_replaces_spaces_and_separators() {
        let req = Requirements::default();
        let mut input = test_support::input(&req, &[]);
        assert_eq!(input.file_stem(), "Roadmap_Sync");
        input.project_name = "Q3/Q4 Plan";
        assert_eq!(input.file_stem(), "Q3_Q4_Plan");
    }

    #[test]
    fn write_reports_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();

        let req = Requirements::default();
        let input = test_support::input(&req, &[]);
        let err = MarkdownRenderer.write(&input, &blocker).unwrap_err();
        assert!(matches!(err, RenderError::Write { .. }));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
