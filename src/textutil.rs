//! Shared UTF-8-safe truncation helpers.
//!
//! Tool output lines, error-body previews, and summary text all truncate
//! under different units (bytes vs code points). Byte slicing directly can
//! panic when the cut falls inside a multi-byte character; these helpers
//! centralize safe truncation behavior.

/// Return a UTF-8-safe prefix whose byte length is at most `max_bytes`.
pub fn safe_prefix_by_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Truncate by bytes and append `suffix` when truncation occurs.
pub fn truncate_with_suffix_by_bytes(text: &str, max_bytes: usize, suffix: &str) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let prefix = safe_prefix_by_bytes(text, max_bytes);
    format!("{prefix}{suffix}")
}

/// Truncate to at most `max_chars` Unicode code points, no suffix.
///
/// The file reader caps rendered lines by code points, not bytes, so a line
/// of multi-byte characters keeps the same visible width budget as ASCII.
pub fn truncate_by_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
