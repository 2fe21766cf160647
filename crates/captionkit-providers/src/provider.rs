//! Provider abstractions consumed by the caption pipeline

use async_trait::async_trait;
use captionkit_core::{ImageFacts, Platform, RawVariant};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProviderError;

/// One block of a provider instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromptBlock {
    Text(String),
    ImageUrl(String),
}

/// Concatenated text of all text blocks, for logging sizes and for fakes.
pub fn prompt_text(blocks: &[PromptBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            PromptBlock::Text(text) => Some(text.as_str()),
            PromptBlock::ImageUrl(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Primary generative provider.
///
/// Implementations should be stateless and thread-safe. `complete` returns the
/// raw model text, which the pipeline expects to parse as JSON.
#[async_trait]
pub trait PrimaryProvider: Send + Sync + fmt::Debug {
    /// Human-readable provider name used in result reasons (e.g. "Gemini").
    fn name(&self) -> &str;

    /// Capability check consulted before any call.
    fn is_configured(&self) -> bool;

    async fn complete(&self, blocks: &[PromptBlock]) -> Result<String, ProviderError>;
}

/// Vision collaborator that turns an image reference into structured facts.
#[async_trait]
pub trait FactExtractor: Send + Sync + fmt::Debug {
    async fn extract_facts(&self, image_url: &str) -> Result<ImageFacts, ProviderError>;
}

/// Input accepted by the fallback provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackInput {
    pub image_url: Option<String>,
    pub platform: Platform,
    pub voice: String,
    pub existing_caption: Option<String>,
    pub theme: Option<String>,
}

/// Secondary provider used when the primary is unavailable or fails.
#[async_trait]
pub trait FallbackProvider: Send + Sync + fmt::Debug {
    /// Human-readable provider name used in result reasons (e.g. "OpenAI").
    fn name(&self) -> &str;

    async fn generate(&self, input: &FallbackInput) -> Result<RawVariant, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_text_skips_images() {
        let blocks = vec![
            PromptBlock::Text("first".to_string()),
            PromptBlock::ImageUrl("https://cdn.example.com/a.jpg".to_string()),
            PromptBlock::Text("second".to_string()),
        ];
        assert_eq!(prompt_text(&blocks), "first\nsecond");
    }

    #[test]
    fn test_fallback_input_serializes_camel_case() {
        let input = FallbackInput {
            image_url: Some("https://cdn.example.com/a.jpg".to_string()),
            platform: Platform::Instagram,
            voice: "playful".to_string(),
            existing_caption: None,
            theme: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("imageUrl").is_some());
        assert!(json.get("existingCaption").is_some());
    }
}
