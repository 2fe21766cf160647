use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ImageFacts, Platform};

/// Which public entry point a request came through. Determines which
/// validators run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Image,
    Text,
    Rewrite,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Image => "image",
            GenerationMode::Text => "text",
            GenerationMode::Rewrite => "rewrite",
        }
    }
}

/// Everything a caller can steer a generation with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    pub platform: Platform,
    /// Tone identifier (e.g. "playful", "professional")
    #[validate(length(min = 1, max = 64))]
    pub voice: String,
    #[validate(length(max = 64))]
    pub style: Option<String>,
    #[validate(length(max = 64))]
    pub mood: Option<String>,
    /// Filled in by the image pipeline from the vision collaborator
    pub facts: Option<ImageFacts>,
    #[validate(url)]
    pub image_url: Option<String>,
    /// Present only for rewrite mode
    #[validate(length(min = 1, max = 5000))]
    pub existing_caption: Option<String>,
    pub theme: Option<String>,
    pub context: Option<String>,
    /// Free-text steering from the user
    pub hint: Option<String>,
}

impl GenerationRequest {
    pub fn new(platform: Platform, voice: impl Into<String>) -> Self {
        Self {
            platform,
            voice: voice.into(),
            style: None,
            mood: None,
            facts: None,
            image_url: None,
            existing_caption: None,
            theme: None,
            context: None,
            hint: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_facts(mut self, facts: ImageFacts) -> Self {
        self.facts = Some(facts);
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_existing_caption(mut self, caption: impl Into<String>) -> Self {
        self.existing_caption = Some(caption.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Facts that carry at least one usable entry.
    pub fn usable_facts(&self) -> Option<&ImageFacts> {
        self.facts.as_ref().filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_rejects_empty_voice() {
        let request = GenerationRequest::new(Platform::Instagram, "");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_image_url() {
        let request = GenerationRequest::new(Platform::Instagram, "playful").with_image_url("nope");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_full_request() {
        let request = GenerationRequest::new(Platform::X, "playful")
            .with_style("minimal")
            .with_mood("excited")
            .with_image_url("https://cdn.example.com/a.jpg")
            .with_hint("mention the sale");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_usable_facts_ignores_empty() {
        let request =
            GenerationRequest::new(Platform::X, "playful").with_facts(ImageFacts::new(json!({})));
        assert!(request.usable_facts().is_none());
    }
}
