//! Prompts sent to the vision and text models.

use std::fmt::Write;

/// System prompt for requirements synthesis.
pub const REQUIREMENTS_SYSTEM_PROMPT: &str =
    "You are an expert business analyst creating Software Requirements Specifications.";

/// System prompt for transcript chunk analysis.
pub const TRANSCRIPT_SYSTEM_PROMPT: &str =
    "You are an expert business analyst summarizing software project meetings.";

/// Prompt for describing a single key frame.
pub const FRAME_ANALYSIS_PROMPT: &str = "Analyze this screenshot from a meeting recording.
Describe what you see including:
- UI elements, screens, or app interfaces
- Diagrams, charts, or visual aids
- Text content visible
- Any features or functionality being shown
Be detailed and technical.";

/// Prompt for summarizing one transcript chunk into discussion points.
pub fn transcript_chunk_prompt(index: usize, total: usize, span: &str, text: &str) -> String {
    format!(
        "The following is part {index} of {total} of a meeting transcript ({span}).

TRANSCRIPT:
{text}

List the discussion points in this part as short bullet points. Include:
- Features or functionality requested
- Decisions made
- Constraints, risks, or open issues raised
- Technologies, platforms, or integrations mentioned
Only report what was said; do not invent requirements."
    )
}

/// Visual analysis entry passed into the requirements prompt.
pub struct FrameContext<'a> {
    pub timestamp: &'a str,
    pub analysis: &'a str,
}

/// Prompt asking for the structured requirements document.
///
/// `transcript_digest` is either the transcript itself or the per-chunk
/// discussion points; either may be empty when audio was unavailable.
pub fn requirements_prompt(transcript_digest: &str, frames: &[FrameContext<'_>]) -> String {
    let mut visual_context = String::new();
    for (i, frame) in frames.iter().enumerate() {
        if i > 0 {
            visual_context.push_str("\n\n");
        }
        let _ = write!(
            visual_context,
            "Frame {} ({}): {}",
            i + 1,
            frame.timestamp,
            frame.analysis
        );
    }

    let audio_context = if transcript_digest.trim().is_empty() {
        "(no transcript available)"
    } else {
        transcript_digest
    };
    let visual_context = if visual_context.is_empty() {
        "(no visual analysis available)".to_string()
    } else {
        visual_context
    };

    format!(
        "You are analyzing a meeting recording to create a Software Requirements Specification (SRS).

AUDIO TRANSCRIPT:
{audio_context}

VISUAL CONTENT ANALYSIS:
{visual_context}

Based on the above meeting content, extract and organize the following:

1. PROJECT OVERVIEW
   - Project name/title
   - Purpose and objectives
   - Scope

2. FUNCTIONAL REQUIREMENTS
   - List all features and functionality mentioned
   - User stories or use cases
   - Specific capabilities required

3. NON-FUNCTIONAL REQUIREMENTS
   - Performance requirements
   - Security requirements
   - Usability requirements
   - Any other quality attributes

4. TECHNICAL REQUIREMENTS
   - Technologies mentioned
   - Platforms or frameworks
   - Integration requirements

5. ISSUES AND CONCERNS
   - Problems identified
   - Risks mentioned
   - Constraints

6. UI/UX REQUIREMENTS
   - Interface designs or mockups shown
   - User flow descriptions
   - Visual design requirements

Provide a comprehensive but concise analysis in JSON format."
    )
}
