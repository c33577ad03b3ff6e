//! Locating JSON payloads inside free-form model output.

/// Find the JSON payload in model text.
///
/// Checks, in order: a ```json fenced block, a ```JSON fenced block, a bare
/// ``` fenced block that starts with `{` or `[`, then the outermost `{...}`
/// or `[...]` span, whichever opens first.
pub fn extract_json(text: &str) -> Option<&str> {
    for fence in ["```json", "```JSON"] {
        if let Some(start) = text.find(fence) {
            let content = &text[start + fence.len()..];
            if let Some(end) = content.find("```") {
                return Some(content[..end].trim());
            }
        }
    }

    if let Some(start) = text.find("```") {
        let content = &text[start + 3..];
        if let Some(end) = content.find("```") {
            let inner = content[..end].trim();
            if inner.starts_with('{') || inner.starts_with('[') {
                return Some(inner);
            }
        }
    }

    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    if end > start {
        Some(text[start..=end].trim())
    } else {
        None
    }
}
