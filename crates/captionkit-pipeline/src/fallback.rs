//! Fallback Adapter: one secondary-provider call producing a complete result.

use captionkit_core::{
    CaptionError, GenerationRequest, GenerationResult, PipelineSettings, ProviderKind,
    RankedResult,
};
use captionkit_providers::{FallbackInput, FallbackProvider};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::call::guarded;
use crate::finalize::FinalizeContext;
use crate::normalize::{variant_from_raw, NormalizeContext};
use crate::retry::FallbackCause;

/// Score given to the single fallback variant.
const FALLBACK_SCORE: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct FallbackAdapter {
    provider: Arc<dyn FallbackProvider>,
    settings: PipelineSettings,
}

impl FallbackAdapter {
    pub fn new(provider: Arc<dyn FallbackProvider>, settings: PipelineSettings) -> Self {
        Self { provider, settings }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    /// Caller-facing explanation of why the fallback ran.
    ///
    /// Never includes the underlying error text.
    pub fn reason(&self, primary: &str, cause: &FallbackCause) -> String {
        match cause {
            FallbackCause::NotConfigured => format!(
                "{} fallback selected because {} API is not configured",
                self.name(),
                primary
            ),
            FallbackCause::PrimaryFailed(_) => {
                format!("{} fallback: {} variants unavailable", self.name(), primary)
            }
        }
    }

    fn input(request: &GenerationRequest) -> FallbackInput {
        FallbackInput {
            image_url: request.image_url.clone(),
            platform: request.platform,
            voice: request.voice.clone(),
            existing_caption: request.existing_caption.clone(),
            theme: request.theme.clone().or_else(|| request.context.clone()),
        }
    }

    /// Produce a schema-valid result from the fallback provider.
    ///
    /// Every failure here is fatal and surfaces as [`CaptionError::Fallback`]
    /// (or [`CaptionError::Cancelled`]).
    pub async fn fallback(
        &self,
        ctx: &FinalizeContext<'_>,
        primary: &str,
        cause: &FallbackCause,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, CaptionError> {
        tracing::warn!(
            provider = self.name(),
            cause = ?cause,
            "Routing caption request to fallback provider"
        );

        let input = Self::input(ctx.request);
        let raw = guarded(
            self.provider.generate(&input),
            self.settings.provider_timeout,
            cancel,
        )
        .await
        .map_err(|failure| failure.into_fallback_error(self.name()))?;

        let normalize = NormalizeContext::from_request(ctx.request, self.settings.min_alt_chars);
        let variant = variant_from_raw(raw, &normalize)
            .map_err(|e| CaptionError::Fallback(format!("{}: {}", self.name(), e)))?;

        let ranked = RankedResult {
            winner_index: 0,
            scores: vec![FALLBACK_SCORE],
            reason: self.reason(primary, cause),
            final_variant: variant.clone(),
        };

        ctx.finalize(ProviderKind::Fallback, variant, ranked)
            .map_err(|e| CaptionError::Fallback(format!("{}: {}", self.name(), e)))
    }
}
