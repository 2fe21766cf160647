//! Final repair pass for rewrite results.

use captionkit_core::Variant;

use crate::entities::{missing_entities, KeyEntity};

const GROWTH_SENTENCES: [&str; 3] = [
    "Tell me what you think in the comments.",
    "Save this for later.",
    "Share it with someone who needs to see it.",
];

/// Make a rewrite keep every key entity and end up strictly longer than the
/// original caption.
///
/// Missing entities are appended verbatim. If the caption is still not
/// longer, the variant's call to action (or a stock sentence) is appended.
pub fn enforce_rewrite_invariants(
    existing: &str,
    entities: &[KeyEntity],
    mut variant: Variant,
) -> Variant {
    let missing: Vec<&str> = missing_entities(entities, &variant.caption)
        .into_iter()
        .map(|e| e.text.as_str())
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            missing = missing.len(),
            "Rewrite dropped key entities; appending them"
        );
        let mut caption = variant.caption.trim_end().to_string();
        for token in missing {
            caption.push(' ');
            caption.push_str(token);
        }
        variant.caption = caption;
    }

    let target = existing.chars().count();
    if variant.caption.chars().count() > target {
        return variant;
    }

    tracing::warn!(target, "Rewrite is not longer than the original; extending it");
    let cta = variant.cta.trim();
    let mut caption = variant.caption.trim_end().to_string();
    if !cta.is_empty() && !caption.contains(cta) {
        caption.push(' ');
        caption.push_str(cta);
    }
    let mut i = 0;
    while caption.chars().count() <= target {
        caption.push(' ');
        caption.push_str(GROWTH_SENTENCES[i % GROWTH_SENTENCES.len()]);
        i += 1;
    }
    variant.caption = caption;
    variant
}
