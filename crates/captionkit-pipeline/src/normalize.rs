//! Conversion of provider-shaped variants into the canonical [`Variant`].

use captionkit_core::constants::{DEFAULT_HASHTAGS, DEFAULT_MOOD, DEFAULT_STYLE};
use captionkit_core::{
    CaptionError, GenerationRequest, ImageFacts, Platform, RawVariant, SafetyLevel, Variant,
};

use crate::entities::KeyEntity;

/// What normalization needs to know about the request.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub platform: Platform,
    pub mood: Option<&'a str>,
    pub style: Option<&'a str>,
    pub facts: Option<&'a ImageFacts>,
    pub min_alt_chars: usize,
}

impl<'a> NormalizeContext<'a> {
    pub fn from_request(request: &'a GenerationRequest, min_alt_chars: usize) -> Self {
        Self {
            platform: request.platform,
            mood: request.mood.as_deref(),
            style: request.style.as_deref(),
            facts: request.usable_facts(),
            min_alt_chars,
        }
    }
}

/// Turn a provider object into a [`Variant`], backfilling missing fields.
///
/// Fails only when there is no caption to work with.
pub fn variant_from_raw(raw: RawVariant, ctx: &NormalizeContext<'_>) -> Result<Variant, CaptionError> {
    let caption = raw
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CaptionError::Parse("variant has no caption".to_string()))?
        .to_string();

    let safety_level = raw
        .safety_level
        .as_deref()
        .map(SafetyLevel::normalize)
        .unwrap_or_default();

    let hashtags = normalize_hashtags(
        raw.hashtags.as_deref().unwrap_or_default(),
        ctx.platform.hashtag_limit(),
    );

    let mood = non_blank(raw.mood)
        .or_else(|| ctx.mood.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_MOOD.to_string());
    let style = non_blank(raw.style)
        .or_else(|| ctx.style.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_STYLE.to_string());

    let alt = match non_blank(raw.alt) {
        Some(alt) if alt.chars().count() >= ctx.min_alt_chars => alt,
        _ => synthesize_alt(&caption, ctx),
    };

    Ok(Variant {
        hashtags,
        safety_level,
        mood,
        style,
        cta: non_blank(raw.cta).unwrap_or_default(),
        alt,
        nsfw: raw.nsfw.unwrap_or(safety_level == SafetyLevel::SpicySafe),
        titles: raw
            .titles
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        caption,
    })
}

/// Canonical hashtags: leading `#`, no whitespace or punctuation, unique
/// ignoring case, capped at `limit`. Falls back to the default set when
/// nothing usable is left.
pub fn normalize_hashtags(tags: &[String], limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for tag in tags {
        let body: String = tag
            .trim()
            .trim_start_matches('#')
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if body.is_empty() {
            continue;
        }
        let key = body.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(format!("#{}", body));
        if out.len() == limit {
            break;
        }
    }

    if out.is_empty() {
        out = DEFAULT_HASHTAGS
            .iter()
            .take(limit)
            .map(|t| t.to_string())
            .collect();
    }
    out
}

/// Alt text built from facts when available, else from the caption.
fn synthesize_alt(caption: &str, ctx: &NormalizeContext<'_>) -> String {
    let terms = ctx.facts.map(|f| f.salient_terms()).unwrap_or_default();
    let mut alt = if terms.is_empty() {
        format!(
            "Image shared alongside a {} caption: {}",
            ctx.platform.display_name(),
            truncate_chars(caption, 120)
        )
    } else {
        let shown: Vec<&str> = terms.iter().take(4).map(String::as_str).collect();
        format!("Image showing {}", shown.join(", "))
    };

    if alt.chars().count() < ctx.min_alt_chars {
        alt.push_str(&format!(", shared on {}", ctx.platform.display_name()));
    }
    while alt.chars().count() < ctx.min_alt_chars {
        alt.push_str(" Photo shared by a creator.");
    }
    alt
}

/// Shorten a caption to the platform ceiling at a word boundary.
///
/// Captions that would lose a protected token are returned unchanged.
pub fn enforce_caption_limit(mut variant: Variant, limit: usize, protected: &[KeyEntity]) -> Variant {
    if variant.caption.chars().count() <= limit || limit < 2 {
        return variant;
    }

    let head: String = variant.caption.chars().take(limit - 1).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head.as_str(),
    };
    let mut shortened = cut
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string();
    shortened.push('…');

    if protected.iter().any(|e| !shortened.contains(e.text.as_str())) {
        tracing::debug!(limit, "Caption over platform limit kept intact to preserve key entities");
        return variant;
    }
    variant.caption = shortened;
    variant
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out = out.trim_end().to_string();
    out.push('…');
    out
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
