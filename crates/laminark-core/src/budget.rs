//! Shared token/character budget helpers.
//!
//! Every surface that returns text to a host agent (tool responses, the
//! session-start context payload) is budgeted the same way: a conservative
//! `ceil(chars/4)` token estimate and item-granular truncation that never
//! cuts a line in half.

/// Conservative token estimate: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Drop whole items from the end of `items` until the joined, `sep`-joined
/// text fits within `max_tokens`. Never truncates inside an item.
pub fn truncate_items_to_token_budget(items: Vec<String>, sep: &str, max_tokens: usize) -> Vec<String> {
    let mut kept = items;
    while !kept.is_empty() {
        let joined = kept.join(sep);
        if estimate_tokens(&joined) <= max_tokens {
            break;
        }
        kept.pop();
    }
    kept
}

/// Truncate `text` to at most `max_chars`, breaking at the nearest
/// preceding line boundary rather than mid-line.
pub fn truncate_chars_at_line_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind('\n') {
        Some(idx) if idx > 0 => truncated[..idx].to_string(),
        _ => truncated,
    }
}

/// Drop whole sections from the end of `sections` until the joined text
/// fits within `max_chars`. Sections are already-rendered blocks in
/// reverse-priority order (least important last).
pub fn drop_sections_to_char_budget(sections: Vec<String>, sep: &str, max_chars: usize) -> Vec<String> {
    let mut kept = sections;
    while !kept.is_empty() {
        let joined = kept.join(sep);
        if joined.chars().count() <= max_chars {
            break;
        }
        kept.pop();
    }
    kept
}
