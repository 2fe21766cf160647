//! Image facts returned by the vision collaborator

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys that describe what is actually visible, in priority order.
const SALIENT_KEYS: [&str; 9] = [
    "objects", "subjects", "people", "animals", "setting", "scene", "location", "colors", "mood",
];

/// Keys inside object entries that name the thing itself.
const NAME_KEYS: [&str; 3] = ["name", "label", "object"];

/// Opaque structured description of an image (objects, setting, colors, mood).
///
/// The shape is owned by the vision provider; the pipeline only serializes it
/// into instructions and pulls salient terms out of it for coverage checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageFacts(Value);

impl ImageFacts {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Compact JSON for embedding in a provider instruction.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Lowercased, deduplicated terms worth mentioning in a caption.
    ///
    /// Known keys come first (objects before setting before colors), then any
    /// remaining keys in map order.
    pub fn salient_terms(&self) -> Vec<String> {
        let mut terms = Vec::new();
        match &self.0 {
            Value::Object(map) => {
                for key in SALIENT_KEYS {
                    if let Some(value) = map.get(key) {
                        collect_terms(value, &mut terms);
                    }
                }
                for (key, value) in map {
                    if !SALIENT_KEYS.contains(&key.as_str()) {
                        collect_terms(value, &mut terms);
                    }
                }
            }
            other => collect_terms(other, &mut terms),
        }

        let mut seen = std::collections::HashSet::new();
        terms
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| t.chars().filter(|c| c.is_alphabetic()).count() >= 3)
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

fn collect_terms(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_terms(item, out)),
        Value::Object(map) => {
            let named = NAME_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            match named {
                Some(name) => out.push(name.to_string()),
                None => map.values().for_each(|v| collect_terms(v, out)),
            }
        }
        _ => {}
    }
}
