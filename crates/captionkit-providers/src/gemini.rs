//! Google Gemini provider.
//!
//! Uses the `generateContent` REST endpoint both for caption generation and
//! ranking (primary provider) and for image fact extraction (vision).

use async_trait::async_trait;
use captionkit_core::{CaptionConfig, ImageFacts};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::provider::{prompt_text, FactExtractor, PrimaryProvider, PromptBlock};
use crate::{extract_json_text, ProviderError};

const FACTS_PROMPT: &str = "Describe the visible content of this image for a social media caption writer. \
Respond with JSON only, using the keys: objects (array of strings), setting (string), \
colors (array of strings), mood (string), text (array of strings with any visible text). \
Do not speculate about anything that is not visible.";

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    enabled: bool,
    client: reqwest::Client,
}

impl Debug for GeminiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("enabled", &self.enabled)
            .finish()
    }
}

// generateContent request/response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            enabled: true,
            client,
        })
    }

    pub fn from_config(config: &CaptionConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
        )?
        .with_enabled(config.gemini_enabled))
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate_content(&self, parts: Vec<Part>) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY not set".to_string()))?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: 0.9,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Gemini response: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::Parse(
                "Gemini returned no text candidates".to_string(),
            ));
        }
        Ok(text)
    }
}

fn to_part(block: &PromptBlock) -> Part {
    match block {
        PromptBlock::Text(text) => Part::Text { text: text.clone() },
        PromptBlock::ImageUrl(url) => Part::File {
            file_data: FileData {
                mime_type: guess_media_type(url).to_string(),
                file_uri: url.clone(),
            },
        },
    }
}

/// Guess an image media type from the URL path extension.
fn guess_media_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg" // Default
    }
}

#[async_trait]
impl PrimaryProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn is_configured(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }

    async fn complete(&self, blocks: &[PromptBlock]) -> Result<String, ProviderError> {
        tracing::debug!(
            model = %self.model,
            blocks = blocks.len(),
            prompt_chars = prompt_text(blocks).len(),
            "Sending generateContent request to Gemini"
        );
        self.generate_content(blocks.iter().map(to_part).collect())
            .await
    }
}

#[async_trait]
impl FactExtractor for GeminiProvider {
    async fn extract_facts(&self, image_url: &str) -> Result<ImageFacts, ProviderError> {
        tracing::debug!(model = %self.model, "Extracting image facts with Gemini");

        let parts = vec![
            to_part(&PromptBlock::ImageUrl(image_url.to_string())),
            Part::Text {
                text: FACTS_PROMPT.to_string(),
            },
        ];
        let text = self.generate_content(parts).await?;

        let value: serde_json::Value = serde_json::from_str(extract_json_text(&text))
            .map_err(|e| ProviderError::Parse(format!("image facts: {}", e)))?;
        if !value.is_object() {
            return Err(ProviderError::Parse(
                "image facts must be a JSON object".to_string(),
            ));
        }
        Ok(ImageFacts::new(value))
    }
}
