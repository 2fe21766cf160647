//! Structural validation of [`GenerationResult`] before it leaves the pipeline.
//!
//! Every code path (primary success, best-effort acceptance, fallback) runs
//! through [`validate_generation_result`]; callers never see a result that
//! fails it.

use crate::error::CaptionError;
use crate::models::{GenerationResult, Variant};

/// Check a variant that is about to be exposed to callers.
pub fn validate_variant(variant: &Variant, min_alt_chars: usize) -> Vec<String> {
    let mut violations = Vec::new();

    if variant.caption.trim().is_empty() {
        violations.push("caption is empty".to_string());
    }
    if variant.hashtags.is_empty() {
        violations.push("hashtags are empty".to_string());
    }
    for tag in &variant.hashtags {
        if !tag.starts_with('#') || tag.len() < 2 || tag.chars().any(char::is_whitespace) {
            violations.push(format!("hashtag {:?} is malformed", tag));
        }
    }
    if variant.alt.trim().chars().count() < min_alt_chars {
        violations.push(format!(
            "alt text is shorter than {} characters",
            min_alt_chars
        ));
    }

    violations
}

pub fn validate_generation_result(
    result: &GenerationResult,
    min_alt_chars: usize,
) -> Result<(), CaptionError> {
    let mut violations = validate_variant(&result.final_variant, min_alt_chars);

    if result.titles.is_empty() {
        violations.push("titles are empty".to_string());
    }
    if result.titles.iter().any(|t| t.trim().is_empty()) {
        violations.push("a title is blank".to_string());
    }

    let ranked = &result.ranked;
    if ranked.scores.is_empty() {
        violations.push("ranked scores are empty".to_string());
    }
    if ranked.winner_index >= ranked.scores.len() {
        violations.push(format!(
            "winner_index {} is out of range for {} scores",
            ranked.winner_index,
            ranked.scores.len()
        ));
    }
    if ranked.scores.iter().any(|s| !s.is_finite()) {
        violations.push("ranked scores contain a non-finite value".to_string());
    }
    if ranked.reason.trim().is_empty() {
        violations.push("ranked reason is empty".to_string());
    }
    if ranked.final_variant.caption != result.final_variant.caption {
        violations.push("ranked final does not match result final".to_string());
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(CaptionError::Schema(violations.join("; ")))
    }
}
