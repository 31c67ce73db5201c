//! Free-form section content returned by the text model.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Section content: plain text, a list, or named entries in model order.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Text(String),
    List(Vec<Section>),
    Map(Vec<(String, Section)>),
}

impl Section {
    /// Convert arbitrary JSON. Scalars become text, `null` becomes empty text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Section::Text(String::new()),
            Value::String(s) => Section::Text(s),
            Value::Bool(b) => Section::Text(b.to_string()),
            Value::Number(n) => Section::Text(n.to_string()),
            Value::Array(items) => Section::List(items.into_iter().map(Section::from_value).collect()),
            Value::Object(map) => Section::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Section::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// True when there is no text anywhere inside.
    pub fn is_empty(&self) -> bool {
        match self {
            Section::Text(s) => s.trim().is_empty(),
            Section::List(items) => items.iter().all(Section::is_empty),
            Section::Map(entries) => entries.iter().all(|(_, v)| v.is_empty()),
        }
    }

    /// Single-line rendering used for nested values.
    pub fn inline(&self) -> String {
        match self {
            Section::Text(s) => s.trim().to_string(),
            Section::List(items) => items
                .iter()
                .map(Section::inline)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
            Section::Map(entries) => entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.inline()))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Section::Text(s) => serializer.serialize_str(s),
            Section::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Section::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_nested_json() {
        let section = Section::from_value(json!({
            "purpose": "Track invoices",
            "scope": ["web", "mobile"],
            "budget": 5000
        }));
        let Section::Map(entries) = &section else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 3);
        assert!(!section.is_empty());
        assert!(section.inline().contains("scope: web; mobile"));
    }

    #[test]
    fn serializes_back_to_json_shape() {
        let section = Section::List(vec![
            Section::Text("Login".into()),
            Section::Map(vec![("id".into(), Section::Text("FR-2".into()))]),
        ]);
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json, json!(["Login", {"id": "FR-2"}]));
    }

    #[test]
    fn blank_content_is_empty() {
        assert!(Section::from_value(json!([null, " "])).is_empty());
        assert!(Section::Map(vec![]).is_empty());
    }
}
