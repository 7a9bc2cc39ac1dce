//! Utility functions for `autoreply`.
//!
//! This module contains reusable helper functions used across the codebase.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// This function safely handles multi-byte UTF-8 characters (emoji, CJK, accented characters)
/// by using character boundaries instead of byte indices.
///
/// # Examples
/// ```ignore
/// use autoreply::util::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
/// assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
/// assert_eq!(truncate_with_ellipsis("😀😀😀😀", 2), "😀😀...");
/// ```
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            // Trim trailing whitespace for cleaner output
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Cut `s` so the result, ellipsis included, fits in `limit` characters.
///
/// Used where a hard platform limit applies to the final text.
pub fn fit_within_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    truncate_with_ellipsis(s, limit.saturating_sub(3))
}

/// Mask credential-looking substrings before they reach the logs.
///
/// Covers Google API keys (`AIza...`), `key=` query parameters and bearer tokens.
pub fn scrub_secrets(input: &str) -> String {
    const PREFIXES: [(&str, usize); 4] = [("AIza", 1), ("key=", 8), ("Bearer ", 16), ("Bot ", 16)];

    let mut scrubbed = input.to_string();
    for (prefix, min_len) in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };
            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = scrubbed[content_start..]
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
                .map_or(scrubbed.len(), |(i, _)| content_start + i);

            if end - content_start >= min_len {
                scrubbed.replace_range(start..end, "[REDACTED]");
                search_from = start + "[REDACTED]".len();
            } else {
                search_from = content_start;
            }
        }
    }
    scrubbed
}

/// Scrub and shorten an API error body for logging.
pub fn sanitize_api_error(input: &str) -> String {
    const MAX_API_ERROR_CHARS: usize = 200;
    truncate_with_ellipsis(&scrub_secrets(input), MAX_API_ERROR_CHARS)
}
