//! Structured JSON requirements file.

use serde::Serialize;

use super::{DegradedNote, DocumentInput, DocumentRenderer, OutputFormat, RenderError, SourceStats};
use crate::requirements::Requirements;

/// Writes `requirements_<Project_Name>.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonDocument<'a> {
    project: &'a str,
    generated_at: String,
    version: &'static str,
    degraded: &'a [DegradedNote],
    sources: &'a SourceStats,
    #[serde(flatten)]
    requirements: &'a Requirements,
}

impl DocumentRenderer for JsonRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn file_name(&self, input: &DocumentInput<'_>) -> String {
        format!("requirements_{}.json", input.file_stem())
    }

    fn render(&self, input: &DocumentInput<'_>) -> Result<String, RenderError> {
        let doc = JsonDocument {
            project: input.project_name,
            generated_at: input.generated_at.to_rfc3339(),
            version: "1.0",
            degraded: input.degraded,
            sources: &input.sources,
            requirements: input.requirements,
        };
        serde_json::to_string_pretty(&doc).map_err(|e| RenderError::Serialize {
            format: "json",
            message: e.to_string(),
        })
    }
}
