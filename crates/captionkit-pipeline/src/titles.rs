//! Short alternative titles attached to the final variant.

use captionkit_core::constants::{DEFAULT_TITLE, MAX_TITLE_CHARS};
use captionkit_core::Variant;

use crate::normalize::truncate_chars;

const OPENING_WORDS: usize = 6;

/// Up to `max` titles for `variant`, never empty.
///
/// Provider-supplied titles win. Otherwise titles come from the caption's
/// first sentence, its opening words and the call to action, with links,
/// mentions and hashtags removed.
pub fn derive_titles(variant: &Variant, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut titles: Vec<String> = Vec::new();

    for title in &variant.titles {
        push_title(&mut titles, clean_title(title), max);
    }

    if titles.is_empty() {
        let text = strip_tokens(&variant.caption);
        push_title(&mut titles, clean_title(first_sentence(&text)), max);

        let opening: Vec<&str> = text.split_whitespace().take(OPENING_WORDS).collect();
        if text.split_whitespace().count() > OPENING_WORDS {
            push_title(&mut titles, clean_title(&opening.join(" ")), max);
        }
        push_title(&mut titles, clean_title(&strip_tokens(&variant.cta)), max);
    }

    if titles.is_empty() {
        titles.push(DEFAULT_TITLE.to_string());
    }
    titles
}

fn push_title(titles: &mut Vec<String>, title: String, max: usize) {
    if title.is_empty() || titles.len() >= max {
        return;
    }
    if titles.iter().any(|t| t.eq_ignore_ascii_case(&title)) {
        return;
    }
    titles.push(title);
}

fn clean_title(raw: &str) -> String {
    let collapsed = raw
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let trimmed = collapsed.trim_end_matches(['.', ',', ';', ':', '-']);
    if !trimmed.chars().any(char::is_alphanumeric) {
        return String::new();
    }
    truncate_chars(trimmed, MAX_TITLE_CHARS)
}

fn strip_tokens(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| {
            !(word.starts_with('#')
                || word.starts_with('@')
                || word.starts_with("http://")
                || word.starts_with("https://")
                || word.starts_with("www."))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_sentence(text: &str) -> &str {
    match text.find(['.', '!', '?', '\n']) {
        // keep "!" and "?" as part of the title
        Some(idx) => {
            let end = idx + text[idx..].chars().next().map_or(0, char::len_utf8);
            if text[idx..].starts_with('.') {
                &text[..idx]
            } else {
                &text[..end]
            }
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionkit_core::constants::MAX_TITLES;
    use captionkit_core::SafetyLevel;

    fn variant(caption: &str, cta: &str, titles: &[&str]) -> Variant {
        Variant {
            caption: caption.to_string(),
            hashtags: vec!["#x".to_string()],
            safety_level: SafetyLevel::Normal,
            mood: "calm".to_string(),
            style: "clean".to_string(),
            cta: cta.to_string(),
            alt: "An image of something pleasant".to_string(),
            nsfw: false,
            titles: titles.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_provider_titles_are_cleaned_and_deduped() {
        let v = variant("Caption", "", &["  \"Golden Hour\" ", "golden hour", "Beach Days."]);
        assert_eq!(derive_titles(&v, MAX_TITLES), vec!["Golden Hour", "Beach Days"]);
    }

    #[test]
    fn test_derived_from_caption() {
        let v = variant(
            "Golden hour at the pier never gets old! Catch me there every Friday with @ana #sunset https://example.com",
            "Save this for your next trip",
            &[],
        );
        assert_eq!(
            derive_titles(&v, MAX_TITLES),
            vec![
                "Golden hour at the pier never gets old!",
                "Golden hour at the pier never",
                "Save this for your next trip",
            ]
        );
    }

    #[test]
    fn test_long_titles_are_capped() {
        let long = "word ".repeat(40);
        let v = variant(&long, "", &[]);
        let titles = derive_titles(&v, MAX_TITLES);
        assert!(titles.iter().all(|t| t.chars().count() <= MAX_TITLE_CHARS));
    }

    #[test]
    fn test_default_title_when_nothing_usable() {
        let v = variant("#tbt @friend https://example.com", "", &[]);
        assert_eq!(derive_titles(&v, MAX_TITLES), vec!["New post"]);
    }
}
