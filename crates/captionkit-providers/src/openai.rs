//! OpenAI Chat Completions provider used as the deterministic fallback.

use async_trait::async_trait;
use captionkit_core::{CaptionConfig, RawVariant};
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::provider::{FallbackInput, FallbackProvider};
use crate::{extract_json_text, ProviderError};

const SYSTEM_PROMPT: &str = "You write social media captions for creators. \
Always answer with a single JSON object with the keys: caption (string), \
hashtags (array of strings starting with #), safety_level (\"normal\" or \"spicy_safe\"), \
mood (string), style (string), cta (string), alt (accessibility description, at least one sentence), \
nsfw (boolean), titles (array of up to 3 short titles).";

#[derive(Clone)]
pub struct OpenAiFallbackProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Debug for OpenAiFallbackProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OpenAiFallbackProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiFallbackProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to create HTTP client for OpenAI API, using default client");
                reqwest::Client::default()
            });

        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &CaptionConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(
            api_key,
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        ))
    }

    fn build_prompt(input: &FallbackInput) -> String {
        let mut parts = vec![format!(
            "Write one {} caption in a {} voice.",
            input.platform.display_name(),
            input.voice
        )];

        if let Some(theme) = input.theme.as_deref().filter(|t| !t.trim().is_empty()) {
            // serde_json string encoding keeps quotes and newlines inert
            parts.push(format!(
                "Theme: {}",
                serde_json::to_string(theme).unwrap_or_default()
            ));
        }

        if let Some(existing) = input.existing_caption.as_deref() {
            parts.push(format!(
                "Rewrite this caption and make it longer: {}. Keep every URL, @handle, #hashtag, \
                 date, number, quoted phrase and brand name exactly as written.",
                serde_json::to_string(existing).unwrap_or_default()
            ));
        }

        if input.image_url.is_some() {
            parts.push("Describe the attached image accurately in the alt text.".to_string());
        }

        parts.push(format!(
            "Keep the caption under {} characters and use at most {} hashtags.",
            input.platform.caption_limit(),
            input.platform.hashtag_limit()
        ));
        parts.join("\n")
    }
}

#[async_trait]
impl FallbackProvider for OpenAiFallbackProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn generate(&self, input: &FallbackInput) -> Result<RawVariant, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut content = vec![json!({
            "type": "text",
            "text": Self::build_prompt(input),
        })];
        if let Some(image_url) = &input.image_url {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": image_url }
            }));
        }

        let request_body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "temperature": 0.7,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": content }
            ]
        });

        tracing::debug!(
            model = %self.model,
            platform = %input.platform,
            has_image = input.image_url.is_some(),
            rewrite = input.existing_caption.is_some(),
            "Sending fallback caption request to OpenAI API"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            // Prefer OpenAI's structured error message when present
            let message = serde_json::from_str::<serde_json::Value>(&error_text)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(error_text);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let text = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                ProviderError::Parse("OpenAI response has no message content".to_string())
            })?;

        serde_json::from_str::<RawVariant>(extract_json_text(text))
            .map_err(|e| ProviderError::Parse(format!("OpenAI variant: {}", e)))
    }
}
