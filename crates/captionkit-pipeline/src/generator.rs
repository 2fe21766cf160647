//! Variant Generator: one primary provider call producing a batch of captions.

use captionkit_core::{
    CaptionError, GenerationMode, GenerationRequest, PipelineSettings, RawVariant, VariantBatch,
};
use captionkit_providers::{extract_json_text, PrimaryProvider, PromptBlock};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::call::guarded;
use crate::entities::KeyEntity;
use crate::hint::serialize_hint;
use crate::normalize::{variant_from_raw, NormalizeContext};

const VARIANT_SHAPE: &str = "{\"caption\": string, \"hashtags\": [string], \
\"safety_level\": \"normal\" | \"spicy_safe\", \"mood\": string, \"style\": string, \
\"cta\": string, \"alt\": string, \"nsfw\": boolean, \"titles\": [string]}";

#[derive(Debug, Clone)]
pub struct VariantGenerator {
    primary: Arc<dyn PrimaryProvider>,
    settings: PipelineSettings,
}

impl VariantGenerator {
    pub fn new(primary: Arc<dyn PrimaryProvider>, settings: PipelineSettings) -> Self {
        Self { primary, settings }
    }

    /// Instruction blocks for one generation call.
    ///
    /// `steering` is the pipeline's current hint (base rewrite hint or the
    /// latest retry hint); the user's own hint is always included separately
    /// as quoted data.
    pub fn build_prompt(
        &self,
        request: &GenerationRequest,
        mode: GenerationMode,
        entities: &[KeyEntity],
        steering: Option<&str>,
    ) -> Vec<PromptBlock> {
        let n = self.settings.batch_size;
        let cap = self.settings.hint_max_chars;
        let platform = request.platform;

        let mut lines = vec![
            format!(
                "Write {} distinct social media captions for {}.",
                n,
                platform.display_name()
            ),
            format!(
                "Platform rules: at most {} characters per caption and at most {} hashtags.",
                platform.caption_limit(),
                platform.hashtag_limit()
            ),
            format!("Voice: {}", serialize_hint(&request.voice, cap, true)),
        ];
        if let Some(style) = request.style.as_deref() {
            lines.push(format!("Style: {}", serialize_hint(style, cap, true)));
        }
        if let Some(mood) = request.mood.as_deref() {
            lines.push(format!("Mood: {}", serialize_hint(mood, cap, true)));
        }

        match mode {
            GenerationMode::Image => {
                if let Some(facts) = request.usable_facts() {
                    lines.push(format!(
                        "Visible image facts (JSON): {}",
                        facts.to_prompt_json()
                    ));
                    lines.push(
                        "Ground every caption and alt text in these facts; do not invent details."
                            .to_string(),
                    );
                }
            }
            GenerationMode::Text => {
                if let Some(theme) = request.theme.as_deref() {
                    lines.push(format!("Theme: {}", serialize_hint(theme, cap, true)));
                }
                if let Some(context) = request.context.as_deref() {
                    lines.push(format!("Context: {}", serialize_hint(context, cap, true)));
                }
            }
            GenerationMode::Rewrite => {
                if let Some(existing) = request.existing_caption.as_deref() {
                    // quoted whole: escaping can push it past any ceiling, and
                    // request validation already bounds its length
                    lines.push(format!(
                        "Existing caption to rewrite: {}",
                        serialize_hint(existing, usize::MAX, true)
                    ));
                    lines.push(format!(
                        "Each rewrite must be longer than the existing caption ({} characters).",
                        existing.chars().count()
                    ));
                }
                if !entities.is_empty() {
                    let tokens: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
                    lines.push(format!(
                        "Keep these tokens exactly as written: {}",
                        serde_json::to_string(&tokens).unwrap_or_default()
                    ));
                }
            }
        }

        if let Some(hint) = request.hint.as_deref().filter(|h| !h.trim().is_empty()) {
            lines.push(format!("Creator hint: {}", serialize_hint(hint, cap, true)));
        }
        if let Some(steering) = steering.filter(|h| !h.trim().is_empty()) {
            lines.push(format!("Instruction: {}", serialize_hint(steering, cap, false)));
        }

        lines.push(format!(
            "Every caption must open with different words. Respond with a JSON array of exactly {} objects shaped like {}.",
            n, VARIANT_SHAPE
        ));

        let mut blocks = Vec::with_capacity(2);
        if mode == GenerationMode::Image {
            if let Some(url) = request.image_url.as_deref() {
                blocks.push(PromptBlock::ImageUrl(url.to_string()));
            }
        }
        blocks.push(PromptBlock::Text(lines.join("\n")));
        blocks
    }

    /// Generate one batch of exactly `batch_size` variants.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        mode: GenerationMode,
        entities: &[KeyEntity],
        steering: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<VariantBatch, CaptionError> {
        let blocks = self.build_prompt(request, mode, entities, steering);
        tracing::debug!(
            provider = self.primary.name(),
            hint_chars = steering.map(str::len).unwrap_or(0),
            "Requesting caption variants"
        );

        let text = guarded(
            self.primary.complete(&blocks),
            self.settings.provider_timeout,
            cancel,
        )
        .await
        .map_err(|failure| failure.into_primary_error(self.primary.name()))?;

        self.parse_batch(&text, request)
    }

    /// Parse a provider response into a normalized batch.
    ///
    /// Accepts a bare array or an object wrapping it under `variants` or
    /// `captions`. Too few variants is a parse error; extras are dropped.
    pub fn parse_batch(
        &self,
        text: &str,
        request: &GenerationRequest,
    ) -> Result<VariantBatch, CaptionError> {
        let value: Value = serde_json::from_str(extract_json_text(text))?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("variants").or_else(|| map.remove("captions")) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(CaptionError::Parse(
                        "expected a JSON array of variants".to_string(),
                    ))
                }
            },
            _ => {
                return Err(CaptionError::Parse(
                    "expected a JSON array of variants".to_string(),
                ))
            }
        };

        let n = self.settings.batch_size;
        if items.len() < n {
            return Err(CaptionError::Parse(format!(
                "expected {} variants, got {}",
                n,
                items.len()
            )));
        }
        if items.len() > n {
            tracing::debug!(expected = n, got = items.len(), "Dropping extra variants");
        }

        let ctx = NormalizeContext::from_request(request, self.settings.min_alt_chars);
        let variants = items
            .into_iter()
            .take(n)
            .map(|item| {
                let raw: RawVariant = serde_json::from_value(item)?;
                variant_from_raw(raw, &ctx)
            })
            .collect::<Result<Vec<_>, CaptionError>>()?;

        Ok(VariantBatch::new(variants))
    }
}
