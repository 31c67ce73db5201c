//! Requirements structure synthesized by the text model.
//!
//! The model is asked for JSON but small local models are inconsistent:
//! replies come fenced in markdown, wrapped in prose, keyed in `UPPER CASE`
//! with numbering, or in `snake_case`. [`Requirements::parse`] accepts all
//! of these and keeps unparseable replies as raw text.

mod section;

use serde::Serialize;
use serde_json::{Map, Value};

pub use section::Section;

/// Note attached when the reply was not JSON.
pub const TEXT_REPLY_NOTE: &str = "AI returned text format instead of JSON";

/// Synthesized requirements, grouped into the document's sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Requirements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_overview: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional_requirements: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_functional_requirements: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_requirements: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_ux_requirements: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues_and_concerns: Option<Section>,
    /// Sections the model added beyond the known ones.
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_entries")]
    pub other: Vec<(String, Section)>,
    /// Model reply kept verbatim when it was not JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Clone, Copy)]
enum Known {
    Overview,
    Functional,
    NonFunctional,
    Technical,
    UiUx,
    Issues,
}

impl Requirements {
    /// Parse a model reply.
    pub fn parse(reply: &str) -> Self {
        match extract_json_object(reply) {
            Some(object) => Self::from_object(object),
            None => {
                tracing::warn!("[Requirements] Reply is not JSON; keeping raw analysis");
                Self {
                    raw_analysis: Some(reply.trim().to_string()),
                    note: Some(TEXT_REPLY_NOTE.to_string()),
                    ..Self::default()
                }
            }
        }
    }

    /// Empty requirements carrying the reason they are missing.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            note: Some(reason.into()),
            ..Self::default()
        }
    }

    /// True when no section and no raw analysis is present.
    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|(_, s)| s.is_empty())
            && self
                .raw_analysis
                .as_deref()
                .map_or(true, |r| r.trim().is_empty())
    }

    /// Present sections in document order, with display titles.
    pub fn sections(&self) -> Vec<(String, &Section)> {
        let known = [
            ("Project Overview", &self.project_overview),
            ("Functional Requirements", &self.functional_requirements),
            ("Non-Functional Requirements", &self.non_functional_requirements),
            ("Technical Requirements", &self.technical_requirements),
            ("UI/UX Requirements", &self.ui_ux_requirements),
            ("Issues and Concerns", &self.issues_and_concerns),
        ];
        let mut out: Vec<(String, &Section)> = known
            .into_iter()
            .filter_map(|(title, s)| s.as_ref().map(|s| (title.to_string(), s)))
            .collect();
        out.extend(self.extra_sections());
        out
    }

    /// Sections beyond the known ones, with display titles.
    pub fn extra_sections(&self) -> Vec<(String, &Section)> {
        self.other.iter().map(|(k, s)| (title_case(k), s)).collect()
    }

    fn from_object(mut object: Map<String, Value>) -> Self {
        // Some models wrap the whole document in one top-level key.
        if object.len() == 1 && !object.keys().any(|k| classify(k).is_some()) {
            let only_object = object.values().next().and_then(Value::as_object).cloned();
            if let Some(inner) = only_object {
                object = inner;
            }
        }

        let mut req = Self::default();
        for (key, value) in object {
            let section = Section::from_value(value);
            let slot = match classify(&key) {
                Some(Known::Overview) => &mut req.project_overview,
                Some(Known::Functional) => &mut req.functional_requirements,
                Some(Known::NonFunctional) => &mut req.non_functional_requirements,
                Some(Known::Technical) => &mut req.technical_requirements,
                Some(Known::UiUx) => &mut req.ui_ux_requirements,
                Some(Known::Issues) => &mut req.issues_and_concerns,
                None => {
                    req.other.push((key, section));
                    continue;
                }
            };
            if slot.is_none() {
                *slot = Some(section);
            } else {
                req.other.push((key, section));
            }
        }
        req
    }
}

fn serialize_entries<S: serde::Serializer>(
    entries: &[(String, Section)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (k, v) in entries {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

/// Lowercase, drop list numbering, and join words with `_`.
fn normalize_key(key: &str) -> String {
    let trimmed = key.trim_start_matches(|c: char| {
        c.is_ascii_digit() || c == '.' || c == ')' || c == '(' || c.is_whitespace()
    });
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

fn classify(key: &str) -> Option<Known> {
    let normalized = normalize_key(key);
    let base = normalized
        .strip_suffix("_requirements")
        .unwrap_or(&normalized);
    match base {
        "project_overview" | "overview" | "project" => Some(Known::Overview),
        "functional" => Some(Known::Functional),
        "non_functional" | "nonfunctional" => Some(Known::NonFunctional),
        "technical" => Some(Known::Technical),
        "ui_ux" | "ui" | "ux" | "user_interface" => Some(Known::UiUx),
        "issues_and_concerns" | "issues_concerns" | "issues" | "concerns" | "risks" => {
            Some(Known::Issues)
        }
        _ => None,
    }
}

fn title_case(key: &str) -> String {
    normalize_key(key)
        .split('_')
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

/// Find a JSON object in a reply: bare, inside a ``` fence, or embedded
/// in prose between the first `{` and the last `}`.
fn extract_json_object(reply: &str) -> Option<Map<String, Value>> {
    let trimmed = reply.trim();
    let mut candidates = vec![trimmed];
    if let Some(fenced) = fenced_block(trimmed) {
        candidates.push(fenced);
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            candidates.push(&trimmed[start..=end]);
        }
    }

    candidates.into_iter().find_map(|c| {
        match serde_json::from_str::<Value>(c) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    // Skip the language tag line (```json).
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}
