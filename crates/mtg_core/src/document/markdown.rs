//! Markdown SRS document.

use std::fmt::Write;

use super::{DocumentInput, DocumentRenderer, OutputFormat, RenderError};
use crate::requirements::Section;

/// Writes `SRS_<Project_Name>.md`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

/// How a section's entries are laid out.
#[derive(Clone, Copy)]
enum Layout {
    /// `**Key:** value` lines.
    Labeled,
    /// `### Key` subheadings; lists become numbered `### FR-001` entries.
    Numbered(&'static str),
    /// `### Key` subheadings; lists become bullets.
    Headed,
    /// Bullet list.
    Bullets,
}

struct Chapter<'a> {
    title: String,
    section: Option<&'a Section>,
    layout: Layout,
    placeholder: &'static str,
}

impl DocumentRenderer for MarkdownRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }

    fn file_name(&self, input: &DocumentInput<'_>) -> String {
        format!("SRS_{}.md", input.file_stem())
    }

    fn render(&self, input: &DocumentInput<'_>) -> Result<String, RenderError> {
        let req = input.requirements;
        let mut chapters = vec![
            Chapter {
                title: "Project Overview".into(),
                section: req.project_overview.as_ref(),
                layout: Layout::Labeled,
                placeholder: "To be determined based on meeting analysis.",
            },
            Chapter {
                title: "Functional Requirements".into(),
                section: req.functional_requirements.as_ref(),
                layout: Layout::Numbered("FR"),
                placeholder: "Functional requirements will be extracted from meeting analysis.",
            },
            Chapter {
                title: "Non-Functional Requirements".into(),
                section: req.non_functional_requirements.as_ref(),
                layout: Layout::Headed,
                placeholder: "Non-functional requirements will be extracted from meeting analysis.",
            },
            Chapter {
                title: "Technical Requirements".into(),
                section: req.technical_requirements.as_ref(),
                layout: Layout::Labeled,
                placeholder: "Technical requirements will be extracted from meeting analysis.",
            },
            Chapter {
                title: "UI/UX Requirements".into(),
                section: req.ui_ux_requirements.as_ref(),
                layout: Layout::Bullets,
                placeholder: "UI/UX requirements will be extracted from visual analysis.",
            },
            Chapter {
                title: "Issues and Concerns".into(),
                section: req.issues_and_concerns.as_ref(),
                layout: Layout::Bullets,
                placeholder: "Issues and concerns will be extracted from meeting discussion.",
            },
        ];
        for (title, section) in req.extra_sections() {
            chapters.push(Chapter {
                title,
                section: Some(section),
                layout: Layout::Headed,
                placeholder: "",
            });
        }

        Ok(render_document(input, &chapters))
    }
}

fn render_document(input: &DocumentInput<'_>, chapters: &[Chapter<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Software Requirements Specification (SRS)\n");

    if !input.degraded.is_empty() {
        let _ = writeln!(
            out,
            "> **WARNING: this document was generated from incomplete data.**\n>"
        );
        for note in input.degraded {
            let _ = writeln!(
                out,
                "> - **{}** ({}): {}",
                note.stage,
                note.kind.name(),
                one_line(&note.message)
            );
        }
        let _ = writeln!(out, ">\n> Review the affected sections against the recording.\n");
    }

    let _ = write!(
        out,
        "**Project:** {}  \n**Date Generated:** {}  \n**Version:** 1.0\n\n---\n\n",
        input.project_name,
        input.generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    let raw = input
        .requirements
        .raw_analysis
        .as_deref()
        .filter(|r| !r.trim().is_empty());

    let mut toc = vec!["Introduction".to_string()];
    toc.extend(chapters.iter().map(|c| c.title.clone()));
    if raw.is_some() {
        toc.push("Raw Analysis".to_string());
    }
    toc.push("Appendix".to_string());

    out.push_str("## Table of Contents\n\n");
    for (i, title) in toc.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}](#{})", i + 1, title, anchor(i + 1, title));
    }
    out.push_str("\n---\n\n");

    out.push_str("## 1. Introduction\n\n");
    out.push_str(
        "This Software Requirements Specification (SRS) document was automatically generated \
         from a meeting recording. It combines audio transcription and visual content analysis \
         to extract project requirements.\n\n",
    );
    if let Some(note) = input.requirements.note.as_deref() {
        let _ = writeln!(out, "*Note: {}*\n", one_line(note));
    }
    out.push_str("---\n\n");

    let mut number = 2;
    for chapter in chapters {
        let _ = writeln!(out, "## {}. {}\n", number, chapter.title);
        match chapter.section.filter(|s| !s.is_empty()) {
            Some(section) => render_section(&mut out, section, chapter.layout),
            None => {
                let _ = writeln!(out, "*{}*\n", chapter.placeholder);
            }
        }
        number += 1;
    }

    if let Some(raw) = raw {
        let _ = writeln!(out, "---\n\n## {}. Raw Analysis\n\n{}\n", number, raw.trim());
        number += 1;
    }

    let stats = &input.sources;
    let _ = write!(
        out,
        "---\n\n## {}. Appendix\n\n### Document Information\n\n\
         - **Generated By:** Meeting Analyzer\n\
         - **Source:** Automated analysis of meeting video and audio\n\
         - **Key Frames:** {} extracted, {} analyzed\n\
         - **Transcript Segments:** {}{}\n\n\
         ### Notes\n\n\
         This document was automatically generated and should be reviewed and refined by the project team.\n",
        number,
        stats.key_frames,
        stats.frames_analyzed,
        stats.transcript_segments,
        stats
            .transcript_language
            .as_deref()
            .map(|l| format!(" ({})", l))
            .unwrap_or_default()
    );

    out
}

fn render_section(out: &mut String, section: &Section, layout: Layout) {
    match (section, layout) {
        (Section::Text(text), _) => {
            let _ = writeln!(out, "{}\n", text.trim());
        }
        (Section::List(items), Layout::Numbered(prefix)) => {
            for (i, item) in items.iter().filter(|s| !s.is_empty()).enumerate() {
                let _ = writeln!(out, "### {}-{:03}\n\n{}\n", prefix, i + 1, item.inline());
            }
        }
        (Section::List(items), _) => {
            for item in items.iter().filter(|s| !s.is_empty()) {
                let _ = writeln!(out, "- {}", item.inline());
            }
            out.push('\n');
        }
        (Section::Map(entries), Layout::Labeled) => {
            for (key, value) in entries {
                let _ = writeln!(out, "**{}:** {}\n", humanize(key), value.inline());
            }
        }
        (Section::Map(entries), Layout::Bullets) => {
            for (key, value) in entries {
                let _ = writeln!(out, "- **{}:** {}", humanize(key), value.inline());
            }
            out.push('\n');
        }
        (Section::Map(entries), _) => {
            for (key, value) in entries {
                let _ = writeln!(out, "### {}\n", humanize(key));
                render_section(out, value, Layout::Bullets);
            }
        }
    }
}

/// `data_retention` -> `Data Retention`; keys with spaces keep their case.
fn humanize(key: &str) -> String {
    if key.contains(' ') {
        return key.trim().to_string();
    }
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// GitHub-style heading anchor for `## N. Title`.
fn anchor(number: usize, title: &str) -> String {
    let heading = format!("{} {}", number, title).to_lowercase();
    let mut slug = String::with_capacity(heading.len());
    for c in heading.chars() {
        if c.is_alphanumeric() || c == '-' {
            slug.push(c);
        } else if c == ' ' {
            slug.push('-');
        }
    }
    slug
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::input;
    use crate::document::DegradedNote;
    use crate::orchestrator::ErrorKind;
    use crate::requirements::Requirements;

    #[test]
    fn renders_sections_and_placeholders() {
        let req = Requirements::parse(
            r#"{"functional_requirements": ["Upload receipts", "Export CSV"],
                "technical_requirements": {"platform": "Android"},
                "stakeholders": ["Finance"]}"#,
        );
        let doc = MarkdownRenderer.render(&input(&req, &[])).unwrap();

        assert!(doc.starts_with("# Software Requirements Specification (SRS)"));
        assert!(doc.contains("**Project:** Roadmap Sync"));
        assert!(doc.contains("### FR-001\n\nUpload receipts"));
        assert!(doc.contains("### FR-002\n\nExport CSV"));
        assert!(doc.contains("**Platform:** Android"));
        assert!(doc.contains("*To be determined based on meeting analysis.*"));
        assert!(doc.contains("## 8. Stakeholders"));
        assert!(doc.contains("- Finance"));
        assert!(!doc.contains("WARNING"));
    }

    #[test]
    fn degraded_warning_is_at_the_top() {
        let req = Requirements::default();
        let degraded = [DegradedNote {
            stage: "Extracting and transcribing audio".into(),
            kind: ErrorKind::Service,
            message: "transcription service unreachable".into(),
        }];
        let doc = MarkdownRenderer.render(&input(&req, &degraded)).unwrap();

        let warning = doc.find("WARNING").unwrap();
        let overview = doc.find("Project Overview").unwrap();
        assert!(warning < overview);
        assert!(doc.contains("**Extracting and transcribing audio** (ServiceError)"));
    }

    #[test]
    fn raw_analysis_gets_its_own_chapter() {
        let req = Requirements::parse("They want a kanban board.");
        let doc = MarkdownRenderer.render(&input(&req, &[])).unwrap();
        assert!(doc.contains("## 8. Raw Analysis\n\nThey want a kanban board."));
        assert!(doc.contains("*Note: AI returned text format instead of JSON*"));
        assert!(doc.contains("[Raw Analysis](#8-raw-analysis)"));
    }

    #[test]
    fn anchors_match_heading_slugs() {
        assert_eq!(anchor(6, "UI/UX Requirements"), "6-uiux-requirements");
        assert_eq!(anchor(4, "Non-Functional Requirements"), "4-non-functional-requirements");
    }

    #[test]
    fn file_name_uses_project() {
        let req = Requirements::default();
        assert_eq!(
            MarkdownRenderer.file_name(&input(&req, &[])),
            "SRS_Roadmap_Sync.md"
        );
    }
}
