//! Pipeline Facade: the three public entry points.

use anyhow::Context;
use captionkit_core::{
    CaptionConfig, CaptionError, GenerationMode, GenerationRequest, GenerationResult,
    ImageFacts, PipelineSettings, ProviderKind,
};
use captionkit_providers::{
    FactExtractor, FallbackProvider, GeminiProvider, OpenAiFallbackProvider, PrimaryProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use crate::call::guarded;
use crate::entities::{extract_key_entities, KeyEntity};
use crate::fallback::FallbackAdapter;
use crate::finalize::FinalizeContext;
use crate::generator::VariantGenerator;
use crate::ranker::Ranker;
use crate::retry::{AttemptInput, FallbackCause, RetryController, RetryOutcome};

/// Caption pipeline wired to one primary, one vision and one fallback
/// provider. Cheap to share behind an `Arc`; holds no per-request state.
#[derive(Debug, Clone)]
pub struct CaptionPipeline {
    primary: Arc<dyn PrimaryProvider>,
    vision: Arc<dyn FactExtractor>,
    controller: RetryController,
    fallback: FallbackAdapter,
    settings: PipelineSettings,
}

impl CaptionPipeline {
    pub fn new(
        primary: Arc<dyn PrimaryProvider>,
        vision: Arc<dyn FactExtractor>,
        fallback: Arc<dyn FallbackProvider>,
        settings: PipelineSettings,
    ) -> Self {
        let controller = RetryController::new(
            VariantGenerator::new(primary.clone(), settings.clone()),
            Ranker::new(primary.clone(), settings.clone()),
            settings.clone(),
        );
        Self {
            primary,
            vision,
            controller,
            fallback: FallbackAdapter::new(fallback, settings.clone()),
            settings,
        }
    }

    /// Build the pipeline with Gemini as primary and vision provider and
    /// OpenAI as fallback.
    pub fn from_config(config: &CaptionConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let gemini = Arc::new(
            GeminiProvider::from_config(config).context("Failed to create Gemini provider")?,
        );
        let openai = Arc::new(
            OpenAiFallbackProvider::from_config(config)
                .context("Failed to create OpenAI fallback provider")?,
        );
        Ok(Self::new(
            gemini.clone(),
            gemini,
            openai,
            config.pipeline.clone(),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Caption an image, grounding the captions in facts from the vision
    /// provider. Facts already on the request are used as-is.
    pub async fn generate_from_image(
        &self,
        image_url: &str,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, CaptionError> {
        let mut request = request.with_image_url(image_url);
        request.existing_caption = None;
        request.validate()?;

        let span = self.span(GenerationMode::Image, &request);
        async move {
            // the fallback reads the image itself
            if request.usable_facts().is_none() && self.primary.is_configured() {
                request.facts = self.resolve_facts(image_url, cancel).await?;
            }
            self.run(&request, GenerationMode::Image, &[], cancel).await
        }
        .instrument(span)
        .await
    }

    /// Caption from a theme and/or context, without an image.
    pub async fn generate_from_text(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, CaptionError> {
        let mut request = request;
        request.facts = None;
        request.existing_caption = None;
        request.validate()?;

        let has_topic = [&request.theme, &request.context, &request.hint]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if !has_topic {
            return Err(CaptionError::InvalidRequest(
                "text generation needs a theme, context or hint".to_string(),
            ));
        }

        let span = self.span(GenerationMode::Text, &request);
        self.run(&request, GenerationMode::Text, &[], cancel)
            .instrument(span)
            .await
    }

    /// Rewrite `request.existing_caption`, keeping its key entities and
    /// making it longer.
    pub async fn rewrite_existing(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, CaptionError> {
        let mut request = request;
        request.facts = None;
        let has_caption = request
            .existing_caption
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_caption {
            return Err(CaptionError::InvalidRequest(
                "rewrite requires an existing caption".to_string(),
            ));
        }
        request.validate()?;

        let entities = request
            .existing_caption
            .as_deref()
            .map(extract_key_entities)
            .unwrap_or_default();

        let span = self.span(GenerationMode::Rewrite, &request);
        async move {
            tracing::debug!(entities = entities.len(), "Extracted key entities");
            self.run(&request, GenerationMode::Rewrite, &entities, cancel)
                .await
        }
        .instrument(span)
        .await
    }

    fn span(&self, mode: GenerationMode, request: &GenerationRequest) -> tracing::Span {
        tracing::info_span!(
            "caption_pipeline",
            request_id = %Uuid::new_v4(),
            mode = mode.as_str(),
            platform = %request.platform,
        )
    }

    /// Vision failures are not fatal: the pipeline proceeds without facts.
    async fn resolve_facts(
        &self,
        image_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ImageFacts>, CaptionError> {
        match guarded(
            self.vision.extract_facts(image_url),
            self.settings.provider_timeout,
            cancel,
        )
        .await
        {
            Ok(facts) => {
                tracing::debug!(terms = facts.salient_terms().len(), "Resolved image facts");
                Ok(Some(facts).filter(|f| !f.is_empty()))
            }
            Err(failure) => match failure.into_primary_error("vision") {
                CaptionError::Cancelled => Err(CaptionError::Cancelled),
                err => {
                    tracing::warn!(error = %err, "Image fact extraction failed; continuing without facts");
                    Ok(None)
                }
            },
        }
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        mode: GenerationMode,
        entities: &[KeyEntity],
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, CaptionError> {
        tracing::info!(
            voice_chars = request.voice.len(),
            has_hint = request.hint.is_some(),
            "Caption generation started"
        );

        let ctx = FinalizeContext {
            request,
            mode,
            entities,
            settings: &self.settings,
        };

        if !self.primary.is_configured() {
            return self
                .fallback
                .fallback(&ctx, self.primary.name(), &FallbackCause::NotConfigured, cancel)
                .await;
        }

        let base_hint = base_hint(request, mode, entities);
        let input = AttemptInput {
            request,
            mode,
            entities,
            base_hint: base_hint.as_deref(),
        };

        let (ranked, annotation) = match self.controller.run(input, cancel).await? {
            RetryOutcome::Accepted { ranked, attempts, .. } => {
                tracing::debug!(attempts, "Primary result accepted");
                (ranked, None)
            }
            RetryOutcome::BestEffort {
                ranked,
                attempts,
                failed,
                ..
            } => (
                ranked,
                Some(format!(
                    " (best effort after {} attempts; {} check not satisfied)",
                    attempts, failed
                )),
            ),
            RetryOutcome::FallbackRequired(cause) => {
                return self
                    .fallback
                    .fallback(&ctx, self.primary.name(), &cause, cancel)
                    .await;
            }
        };

        let mut ranked = ranked;
        if let Some(note) = annotation {
            ranked.reason.push_str(&note);
        }
        let variant = ranked.final_variant.clone();

        match ctx.finalize(ProviderKind::Primary, variant, ranked) {
            Ok(result) => {
                tracing::info!(
                    provider = "primary",
                    winner_index = result.ranked.winner_index,
                    "Caption generation finished"
                );
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Primary result failed schema validation");
                self.fallback
                    .fallback(
                        &ctx,
                        self.primary.name(),
                        &FallbackCause::PrimaryFailed(err.to_string()),
                        cancel,
                    )
                    .await
            }
        }
    }
}

/// Steering every attempt starts from. Only rewrites carry one.
fn base_hint(
    request: &GenerationRequest,
    mode: GenerationMode,
    entities: &[KeyEntity],
) -> Option<String> {
    if mode != GenerationMode::Rewrite {
        return None;
    }
    let mut hint = format!(
        "Rewrite the existing caption for {} in a fresh way.",
        request.platform.display_name()
    );
    if !entities.is_empty() {
        let tokens: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        hint.push_str(&format!(" Keep these tokens verbatim: {}.", tokens.join(" ")));
    }
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionkit_core::Platform;

    #[test]
    fn test_base_hint_only_for_rewrites() {
        let request = GenerationRequest::new(Platform::X, "dry");
        assert!(base_hint(&request, GenerationMode::Text, &[]).is_none());

        let entities = extract_key_entities("See you 12/25 @ana");
        let hint = base_hint(&request, GenerationMode::Rewrite, &entities).unwrap();
        assert!(hint.contains("X (Twitter)"));
        assert!(hint.ends_with("Keep these tokens verbatim: 12/25 @ana."));
    }
}
