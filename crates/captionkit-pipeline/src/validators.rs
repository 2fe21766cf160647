//! Post-ranking checks.
//!
//! Each validator is a pure predicate over the request, the batch and the
//! ranking. They run in a fixed order and the first failure supplies the hint
//! for the next attempt.

use captionkit_core::{GenerationMode, GenerationRequest, PipelineSettings, RankedResult, VariantBatch};
use std::collections::HashSet;
use std::fmt;

use crate::entities::{missing_entities, KeyEntity};

/// Fewest hashtags a final caption may carry (capped by the platform ceiling).
pub const MIN_HASHTAGS: usize = 2;

/// Growth instruction for rewrites that came back too short.
pub const LENGTH_GROWTH_HINT: &str = "Make it ~20% longer with a natural hook and CTA.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    Duplicate,
    HashtagCompleteness,
    MandatoryTokens,
    LengthGrowth,
    FactCoverage,
}

impl ValidatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::Duplicate => "duplicate",
            ValidatorKind::HashtagCompleteness => "hashtag_completeness",
            ValidatorKind::MandatoryTokens => "mandatory_tokens",
            ValidatorKind::LengthGrowth => "length_growth",
            ValidatorKind::FactCoverage => "fact_coverage",
        }
    }

    /// How this validator's hint combines with the base hint.
    pub fn composition(&self) -> HintComposition {
        match self {
            ValidatorKind::LengthGrowth => HintComposition::ExtendBase,
            _ => HintComposition::Replace,
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintComposition {
    /// The hint becomes the whole steering instruction.
    Replace,
    /// The hint is appended to the mode's base hint.
    ExtendBase,
}

impl HintComposition {
    pub fn compose(&self, base: Option<&str>, hint: &str) -> String {
        match (self, base.filter(|b| !b.trim().is_empty())) {
            (HintComposition::ExtendBase, Some(base)) => format!("{} {}", base.trim_end(), hint),
            _ => hint.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { validator: ValidatorKind, hint: String },
}

/// Everything the validators may look at besides the batch and ranking.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub request: &'a GenerationRequest,
    pub mode: GenerationMode,
    pub entities: &'a [KeyEntity],
    pub settings: &'a PipelineSettings,
}

type ValidatorFn = fn(&ValidationContext<'_>, &VariantBatch, &RankedResult) -> Verdict;

const VALIDATORS: [ValidatorFn; 5] = [
    check_duplicates,
    check_hashtags,
    check_mandatory_tokens,
    check_length_growth,
    check_fact_coverage,
];

/// Run every validator in order, stopping at the first failure.
pub fn run_validators(ctx: &ValidationContext<'_>, batch: &VariantBatch, ranked: &RankedResult) -> Verdict {
    VALIDATORS
        .iter()
        .map(|validator| validator(ctx, batch, ranked))
        .find(|verdict| *verdict != Verdict::Pass)
        .unwrap_or(Verdict::Pass)
}

/// Fails when fewer than N captions have distinct openings.
pub fn check_duplicates(ctx: &ValidationContext<'_>, batch: &VariantBatch, _ranked: &RankedResult) -> Verdict {
    let mut seen = HashSet::new();
    let mut openings = Vec::new();
    for caption in batch.captions() {
        if seen.insert(normalized_prefix(caption, ctx.settings.duplicate_prefix_chars)) {
            openings.push(opening_words(caption, 6));
        }
    }

    if seen.len() >= ctx.settings.batch_size.min(batch.len()) {
        return Verdict::Pass;
    }

    let listed = openings
        .iter()
        .map(|o| format!("\"{}\"", o))
        .collect::<Vec<_>>()
        .join("; ");
    Verdict::Fail {
        validator: ValidatorKind::Duplicate,
        hint: format!(
            "You already wrote: {}. Open every caption with different words and take a different angle each time.",
            listed
        ),
    }
}

/// Fails when the final caption carries too few hashtags for the platform.
pub fn check_hashtags(ctx: &ValidationContext<'_>, _batch: &VariantBatch, ranked: &RankedResult) -> Verdict {
    let required = MIN_HASHTAGS.min(ctx.request.platform.hashtag_limit()).max(1);
    let present = ranked.final_variant.hashtags.len();
    if present >= required {
        return Verdict::Pass;
    }
    Verdict::Fail {
        validator: ValidatorKind::HashtagCompleteness,
        hint: format!(
            "Give every caption between {} and {} relevant hashtags.",
            required,
            ctx.request.platform.hashtag_limit()
        ),
    }
}

/// Rewrite mode: fails when a key entity of the original is missing verbatim.
pub fn check_mandatory_tokens(
    ctx: &ValidationContext<'_>,
    _batch: &VariantBatch,
    ranked: &RankedResult,
) -> Verdict {
    if ctx.mode != GenerationMode::Rewrite {
        return Verdict::Pass;
    }
    let missing = missing_entities(ctx.entities, &ranked.final_variant.caption);
    if missing.is_empty() {
        return Verdict::Pass;
    }

    let tokens: Vec<&str> = missing.iter().map(|e| e.text.as_str()).collect();
    Verdict::Fail {
        validator: ValidatorKind::MandatoryTokens,
        hint: format!(
            "ABSOLUTE RULE: include these tokens exactly as written, character for character: {}",
            tokens.join(" ")
        ),
    }
}

/// Rewrite mode: fails unless the final caption is strictly longer.
pub fn check_length_growth(
    ctx: &ValidationContext<'_>,
    _batch: &VariantBatch,
    ranked: &RankedResult,
) -> Verdict {
    let Some(existing) = ctx.request.existing_caption.as_deref() else {
        return Verdict::Pass;
    };
    if ctx.mode != GenerationMode::Rewrite
        || ranked.final_variant.caption.chars().count() > existing.chars().count()
    {
        return Verdict::Pass;
    }
    Verdict::Fail {
        validator: ValidatorKind::LengthGrowth,
        hint: LENGTH_GROWTH_HINT.to_string(),
    }
}

/// Image mode: fails when the caption and alt text mention too few facts.
///
/// The bar is `min_fact_coverage`, lowered to the number of salient terms
/// when the facts hold fewer.
pub fn check_fact_coverage(
    ctx: &ValidationContext<'_>,
    _batch: &VariantBatch,
    ranked: &RankedResult,
) -> Verdict {
    if ctx.mode != GenerationMode::Image {
        return Verdict::Pass;
    }
    let Some(facts) = ctx.request.usable_facts() else {
        return Verdict::Pass;
    };
    let terms = facts.salient_terms();
    let required = ctx.settings.min_fact_coverage.min(terms.len());
    if required == 0 {
        return Verdict::Pass;
    }

    let text = format!(
        "{} {}",
        ranked.final_variant.caption, ranked.final_variant.alt
    )
    .to_lowercase();
    let words: HashSet<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let (covered, uncovered): (Vec<&String>, Vec<&String>) =
        terms.iter().partition(|term| term_is_covered(term, &text, &words));
    if covered.len() >= required {
        return Verdict::Pass;
    }

    let names: Vec<&str> = uncovered.iter().take(6).map(|t| t.as_str()).collect();
    Verdict::Fail {
        validator: ValidatorKind::FactCoverage,
        hint: format!(
            "Mention at least {} of these visible details in the caption or alt text: {}.",
            required,
            names.join(", ")
        ),
    }
}

/// Lowercased alphanumeric prefix used to compare caption openings.
pub fn normalized_prefix(caption: &str, chars: usize) -> String {
    let cleaned: String = caption
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(chars)
        .collect()
}

fn opening_words(caption: &str, words: usize) -> String {
    caption
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
}

fn term_is_covered(term: &str, text: &str, words: &HashSet<&str>) -> bool {
    if text.contains(term) {
        return true;
    }
    term.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .any(|w| {
            words.contains(w)
                || words.contains(format!("{}s", w).as_str())
                || w.strip_suffix('s').is_some_and(|stem| words.contains(stem))
        })
}
