/// Strip Markdown code fences and surrounding prose from a model response.
///
/// Models asked for JSON still wrap it in ```json fences or prefix a sentence
/// now and then. Falls back to the outermost `[`/`{` span when there is no fence.
pub fn extract_json_text(text: &str) -> &str {
    let fenced = if text.contains("```json") {
        text.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
    } else if text.contains("```") {
        text.split("```").nth(1)
    } else {
        None
    };
    if let Some(inner) = fenced {
        return inner.trim();
    }

    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return trimmed;
    }

    let start = trimmed.find(['[', '{']);
    let end = trimmed.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}
