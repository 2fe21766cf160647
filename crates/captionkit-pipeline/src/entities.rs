//! Mandatory-token extraction for rewrites.
//!
//! A rewrite may rephrase anything except the literal tokens a reader would
//! notice missing: links, mentions, tags, dates, quotes and brand names.

use serde::Serialize;
use std::sync::LazyLock;

use regex::Regex;

/// Category a key entity was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Url,
    Handle,
    Hashtag,
    DateOrNumber,
    QuotedPhrase,
    BrandedTerm,
    ProperNoun,
}

/// A literal substring of an existing caption that must survive a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEntity {
    pub text: String,
    pub kind: EntityKind,
}

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("url regex")
});
static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_](?:[A-Za-z0-9_.]*[A-Za-z0-9_])?").expect("handle regex"));
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[\p{L}\p{N}_]+").expect("hashtag regex"));
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b|\b(?:1[89]|20)\d{2}\b|\$\d+(?:[.,]\d+)*|\b\d+(?:\.\d+)?%",
    )
    .expect("date regex")
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"\n]{1,120}"|“[^”\n]{1,120}”"#).expect("quote regex"));
static BRANDED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}&'.-]*[™®]").expect("brand regex"));
static PROPER_NOUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\p{Lu}[\p{L}\p{N}&'-]*\b").expect("proper noun regex"));

/// Extract the mandatory tokens of `caption`, in order of first appearance.
///
/// Categories are recognized in priority order and a span claimed by an
/// earlier category is never re-read by a later one, so `@LaunchHQ` is a
/// handle and not also a proper noun. Duplicates keep their first position.
pub fn extract_key_entities(caption: &str) -> Vec<KeyEntity> {
    let mut claimed: Vec<Span> = Vec::new();

    for m in URL_RE.find_iter(caption) {
        let text = m.as_str().trim_end_matches(['.', ',', '!', '?', ';', ':', ')']);
        claim(&mut claimed, m.start(), m.start() + text.len(), EntityKind::Url);
    }
    for m in HANDLE_RE.find_iter(caption) {
        if preceded_by_word_char(caption, m.start()) {
            continue; // email address
        }
        claim(&mut claimed, m.start(), m.end(), EntityKind::Handle);
    }
    for m in HASHTAG_RE.find_iter(caption) {
        if preceded_by_word_char(caption, m.start()) {
            continue;
        }
        claim(&mut claimed, m.start(), m.end(), EntityKind::Hashtag);
    }
    for m in DATE_RE.find_iter(caption) {
        claim(&mut claimed, m.start(), m.end(), EntityKind::DateOrNumber);
    }
    for m in QUOTED_RE.find_iter(caption) {
        claim(&mut claimed, m.start(), m.end(), EntityKind::QuotedPhrase);
    }
    for m in BRANDED_RE.find_iter(caption) {
        claim(&mut claimed, m.start(), m.end(), EntityKind::BrandedTerm);
    }
    for m in PROPER_NOUN_RE.find_iter(caption) {
        let token = m.as_str();
        if token.chars().filter(|c| c.is_alphabetic()).count() < 2
            || is_first_person(token)
            || is_sentence_initial(caption, m.start())
        {
            continue;
        }
        claim(&mut claimed, m.start(), m.end(), EntityKind::ProperNoun);
    }

    claimed.sort_by_key(|&(start, _, _)| start);

    let mut entities: Vec<KeyEntity> = Vec::with_capacity(claimed.len());
    for (start, end, kind) in claimed {
        let text = &caption[start..end];
        if !entities.iter().any(|e| e.text == text) {
            entities.push(KeyEntity {
                text: text.to_string(),
                kind,
            });
        }
    }
    entities
}

/// Entities whose literal text does not occur in `caption`.
pub fn missing_entities<'a>(entities: &'a [KeyEntity], caption: &str) -> Vec<&'a KeyEntity> {
    entities
        .iter()
        .filter(|e| !caption.contains(e.text.as_str()))
        .collect()
}

type Span = (usize, usize, EntityKind);

/// Record a span unless it overlaps one claimed by a higher-priority category.
fn claim(claimed: &mut Vec<Span>, start: usize, end: usize, kind: EntityKind) {
    if start < end && !claimed.iter().any(|&(s, e, _)| start < e && s < end) {
        claimed.push((start, end, kind));
    }
}

/// The pronoun "I" is capitalized everywhere, so its contractions are not names.
fn is_first_person(token: &str) -> bool {
    matches!(
        token.to_lowercase().as_str(),
        "i'm" | "i'll" | "i've" | "i'd"
    )
}

fn preceded_by_word_char(text: &str, index: usize) -> bool {
    text[..index]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '&')
}

/// True when only whitespace or opening punctuation separates `index` from
/// the start of the text or the end of the previous sentence.
fn is_sentence_initial(text: &str, index: usize) -> bool {
    for c in text[..index].chars().rev() {
        match c {
            '\n' | '.' | '!' | '?' | '…' => return true,
            c if c.is_whitespace() => continue,
            '(' | '[' | '\'' | '‘' | '“' | '"' | '-' | '–' | '—' | '*' | '>' => continue,
            _ => return false,
        }
    }
    true
}
