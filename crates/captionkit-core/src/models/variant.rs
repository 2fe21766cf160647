//! Caption variants as exposed to callers and as returned by providers

use serde::{Deserialize, Deserializer, Serialize};

/// Canonical content-sensitivity classification.
///
/// Providers use a loose vocabulary ("suggestive", "flirty", "sfw", ...).
/// Deserialization always goes through [`SafetyLevel::normalize`], so an
/// unknown value lands on [`SafetyLevel::Normal`] instead of failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    #[default]
    Normal,
    SpicySafe,
}

impl SafetyLevel {
    pub fn normalize(raw: &str) -> Self {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "spicy_safe" | "spicy" | "suggestive" | "flirty" | "flirtatious" | "sensual"
            | "sultry" | "risque" | "racy" | "teasing" | "mature" | "nsfw_safe" | "spicysafe" => {
                SafetyLevel::SpicySafe
            }
            _ => SafetyLevel::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyLevel::Normal => "normal",
            SafetyLevel::SpicySafe => "spicy_safe",
        }
    }
}

impl<'de> Deserialize<'de> for SafetyLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(SafetyLevel::normalize(&raw))
    }
}

/// One candidate caption with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub safety_level: SafetyLevel,
    pub mood: String,
    pub style: String,
    pub cta: String,
    /// Accessibility text
    pub alt: String,
    pub nsfw: bool,
    /// Short alternative titles, filled in on the final variant only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<String>,
}

/// The candidates produced by one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantBatch(Vec<Variant>);

impl VariantBatch {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self(variants)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variant> {
        self.0.iter()
    }

    pub fn captions(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|v| v.caption.as_str())
    }

    pub fn into_inner(self) -> Vec<Variant> {
        self.0
    }
}

/// Variant-shaped object exactly as a provider returned it.
///
/// Every field is optional; the pipeline turns it into a [`Variant`] and
/// backfills whatever is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVariant {
    #[serde(default, alias = "text")]
    pub caption: Option<String>,
    #[serde(default, deserialize_with = "lenient_hashtags")]
    pub hashtags: Option<Vec<String>>,
    #[serde(default, alias = "safetyLevel", alias = "safety")]
    pub safety_level: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default, alias = "callToAction")]
    pub cta: Option<String>,
    #[serde(default, alias = "altText", alias = "alt_text")]
    pub alt: Option<String>,
    #[serde(default)]
    pub nsfw: Option<bool>,
    #[serde(default, deserialize_with = "lenient_hashtags")]
    pub titles: Option<Vec<String>>,
}

/// Accepts a JSON array of strings or a single space/comma separated string.
fn lenient_hashtags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        Some(serde_json::Value::String(s)) => Some(
            s.split([',', ' ', '\n'])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    })
}
