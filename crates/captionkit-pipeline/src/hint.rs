//! Sanitizing free text before it is spliced into a provider instruction.
//!
//! Both user hints and retry hints go through [`serialize_hint`]. The output
//! is single-line, carries no unescaped double quote and never exceeds the
//! configured character ceiling.

/// Replaces every line break.
pub const LINE_SEPARATOR: &str = " / ";

const ELLIPSIS: char = '…';

/// Sanitize `text` for embedding in an instruction.
///
/// With `inert` set the result is wrapped in double quotes so the provider
/// reads it as quoted user data rather than as part of the instruction. The
/// ceiling applies to the sanitized body, before quoting.
pub fn serialize_hint(text: &str, max_chars: usize, inert: bool) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect();
    let joined = lines.join(LINE_SEPARATOR);

    let mut escaped = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '`' => escaped.push('\''),
            c if c.is_control() => escaped.push(' '),
            c => escaped.push(c),
        }
    }

    let body = truncate_escaped(&escaped, max_chars);
    if inert {
        format!("\"{}\"", body)
    } else {
        body
    }
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max_chars` characters without leaving a dangling escape.
fn truncate_escaped(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut cut: String = text.chars().take(max_chars - 1).collect();
    let trailing_backslashes = cut.chars().rev().take_while(|&c| c == '\\').count();
    if trailing_backslashes % 2 == 1 {
        cut.pop();
    }
    let mut cut = cut.trim_end().to_string();
    cut.push(ELLIPSIS);
    cut
}
