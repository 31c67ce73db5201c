//! The closed set of pipeline stages.

use serde::Serialize;

use super::context::RunContext;
use super::steps;
use super::types::{PipelineState, StageResult};

/// One unit of pipeline work, in execution order.
///
/// Every stage reads the accumulated [`PipelineState`] and returns a
/// [`StageResult`]; it never mutates the state itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractFrames,
    Transcribe,
    AnalyzeVisuals,
    AnalyzeText,
    SynthesizeRequirements,
    GenerateDocuments,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::ExtractFrames,
        Stage::Transcribe,
        Stage::AnalyzeVisuals,
        Stage::AnalyzeText,
        Stage::SynthesizeRequirements,
        Stage::GenerateDocuments,
    ];

    pub fn first() -> Stage {
        Stage::ALL[0]
    }

    /// 1-based position.
    pub fn ordinal(&self) -> u32 {
        match self {
            Stage::ExtractFrames => 1,
            Stage::Transcribe => 2,
            Stage::AnalyzeVisuals => 3,
            Stage::AnalyzeText => 4,
            Stage::SynthesizeRequirements => 5,
            Stage::GenerateDocuments => 6,
        }
    }

    pub fn next(&self) -> Option<Stage> {
        Stage::ALL.get(self.ordinal() as usize).copied()
    }

    /// Stable identifier, as used in the results file.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ExtractFrames => "extract_frames",
            Stage::Transcribe => "transcribe",
            Stage::AnalyzeVisuals => "analyze_visuals",
            Stage::AnalyzeText => "analyze_text",
            Stage::SynthesizeRequirements => "synthesize_requirements",
            Stage::GenerateDocuments => "generate_documents",
        }
    }

    /// Human-readable label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::ExtractFrames => "Extracting video frames",
            Stage::Transcribe => "Extracting and transcribing audio",
            Stage::AnalyzeVisuals => "Analyzing visual content",
            Stage::AnalyzeText => "Analyzing transcript",
            Stage::SynthesizeRequirements => "Generating requirements",
            Stage::GenerateDocuments => "Generating SRS documents",
        }
    }

    /// Run this stage against the state accumulated so far.
    pub fn run(&self, ctx: &RunContext, state: &PipelineState) -> StageResult {
        match self {
            Stage::ExtractFrames => steps::extract_frames(ctx),
            Stage::Transcribe => steps::transcribe(ctx, state),
            Stage::AnalyzeVisuals => steps::analyze_visuals(ctx, state),
            Stage::AnalyzeText => steps::analyze_text(ctx, state),
            Stage::SynthesizeRequirements => steps::synthesize_requirements(ctx, state),
            Stage::GenerateDocuments => steps::generate_documents(ctx, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_contiguous() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.ordinal() as usize, i + 1);
        }
        assert_eq!(Stage::first(), Stage::ExtractFrames);
        assert_eq!(Stage::AnalyzeText.next(), Some(Stage::SynthesizeRequirements));
        assert_eq!(Stage::GenerateDocuments.next(), None);
    }

    #[test]
    fn serializes_as_name() {
        let json = serde_json::to_string(&Stage::SynthesizeRequirements).unwrap();
        assert_eq!(json, format!("\"{}\"", Stage::SynthesizeRequirements.name()));
    }
}
