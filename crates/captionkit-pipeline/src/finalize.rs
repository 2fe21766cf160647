//! Assembly of the public [`GenerationResult`] shared by every code path.

use captionkit_core::constants::MAX_TITLES;
use captionkit_core::{
    validate_generation_result, CaptionError, GenerationMode, GenerationRequest,
    GenerationResult, PipelineSettings, ProviderKind, RankedResult, Variant,
};
use chrono::Utc;

use crate::entities::KeyEntity;
use crate::normalize::enforce_caption_limit;
use crate::rewrite::enforce_rewrite_invariants;
use crate::titles::derive_titles;

/// Per-request data the final repair passes need.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub request: &'a GenerationRequest,
    pub mode: GenerationMode,
    pub entities: &'a [KeyEntity],
    pub settings: &'a PipelineSettings,
}

impl FinalizeContext<'_> {
    /// Apply platform and rewrite repairs, attach titles and validate.
    ///
    /// `ranked.final` is replaced by the repaired variant so the result stays
    /// internally consistent.
    pub fn finalize(
        &self,
        provider: ProviderKind,
        variant: Variant,
        mut ranked: RankedResult,
    ) -> Result<GenerationResult, CaptionError> {
        let mut variant =
            enforce_caption_limit(variant, self.request.platform.caption_limit(), self.entities);

        if self.mode == GenerationMode::Rewrite {
            if let Some(existing) = self.request.existing_caption.as_deref() {
                variant = enforce_rewrite_invariants(existing, self.entities, variant);
            }
        }

        let titles = derive_titles(&variant, MAX_TITLES);
        variant.titles = titles.clone();
        ranked.final_variant = variant.clone();

        let result = GenerationResult {
            provider,
            final_variant: variant,
            titles,
            ranked,
            generated_at: Utc::now(),
        };
        validate_generation_result(&result, self.settings.min_alt_chars)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::extract_key_entities;
    use captionkit_core::{Platform, SafetyLevel};

    fn variant(caption: &str) -> Variant {
        Variant {
            caption: caption.to_string(),
            hashtags: vec!["#coffee".to_string()],
            safety_level: SafetyLevel::Normal,
            mood: "calm".to_string(),
            style: "clean".to_string(),
            cta: "Grab a cup".to_string(),
            alt: "A latte on a wooden table by a window".to_string(),
            nsfw: false,
            titles: Vec::new(),
        }
    }

    fn ranked(v: &Variant) -> RankedResult {
        RankedResult {
            winner_index: 0,
            scores: vec![8.0],
            reason: "best".to_string(),
            final_variant: v.clone(),
        }
    }

    #[test]
    fn test_finalize_attaches_titles() {
        let request = GenerationRequest::new(Platform::Instagram, "calm");
        let settings = PipelineSettings::default();
        let ctx = FinalizeContext {
            request: &request,
            mode: GenerationMode::Text,
            entities: &[],
            settings: &settings,
        };
        let v = variant("Slow mornings are the best mornings. Coffee first");
        let result = ctx.finalize(ProviderKind::Primary, v.clone(), ranked(&v)).unwrap();

        assert_eq!(result.provider, ProviderKind::Primary);
        assert!(!result.titles.is_empty());
        assert_eq!(result.final_variant.titles, result.titles);
        assert_eq!(result.ranked.final_variant, result.final_variant);
    }

    #[test]
    fn test_finalize_repairs_rewrite() {
        let original = "Basic caption here @cafe";
        let entities = extract_key_entities(original);
        let request = GenerationRequest::new(Platform::X, "calm").with_existing_caption(original);
        let settings = PipelineSettings::default();
        let ctx = FinalizeContext {
            request: &request,
            mode: GenerationMode::Rewrite,
            entities: &entities,
            settings: &settings,
        };
        let v = variant("Basic caption");
        let result = ctx.finalize(ProviderKind::Fallback, v.clone(), ranked(&v)).unwrap();

        assert!(result.final_variant.caption.contains("@cafe"));
        assert!(result.final_variant.caption.chars().count() > original.chars().count());
        assert_eq!(result.ranked.final_variant.caption, result.final_variant.caption);
    }

    #[test]
    fn test_finalize_rejects_schema_violation() {
        let request = GenerationRequest::new(Platform::Instagram, "calm");
        let settings = PipelineSettings::default();
        let ctx = FinalizeContext {
            request: &request,
            mode: GenerationMode::Text,
            entities: &[],
            settings: &settings,
        };
        let mut v = variant("Fine caption");
        v.alt = "short".to_string();
        let err = ctx.finalize(ProviderKind::Primary, v.clone(), ranked(&v)).unwrap_err();
        assert!(matches!(err, CaptionError::Schema(_)));
    }
}
