//! Plain-text sanitation for user-provided strings.
//!
//! Sanitizers never mutate their input; they return a new value that is safe
//! to persist: control characters stripped (except `\n` and `\t`), line
//! endings normalized, trimmed and truncated to the field's maximum length.

/// Job and message subject titles.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Names, locations, headlines and similar one-liners.
pub const MAX_SHORT_TEXT_LENGTH: usize = 200;

/// Profile summaries and company descriptions.
pub const MAX_SUMMARY_LENGTH: usize = 5_000;

/// Job descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 20_000;

/// Message bodies and cover letters.
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Sanitize free text for storage.
pub fn sanitize_plain_text(input: &str, max_len: usize) -> String {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = normalized
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let truncated: String = cleaned.trim().chars().take(max_len).collect();
    truncated.trim_end().to_string()
}

/// Sanitize an optional field. Blank values become `None`.
pub fn sanitize_optional(input: Option<&str>, max_len: usize) -> Option<String> {
    input
        .map(|s| sanitize_plain_text(s, max_len))
        .filter(|s| !s.is_empty())
}

/// Sanitize a single-line value (names, titles): newlines and tabs become spaces.
pub fn sanitize_single_line(input: &str, max_len: usize) -> String {
    let flattened: String = input
        .chars()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();
    sanitize_plain_text(&flattened, max_len)
}

/// Sanitize a list of short tags, dropping blanks and duplicates.
pub fn sanitize_tags(input: &[String], max_len: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(input.len());
    for tag in input {
        let tag = sanitize_single_line(tag, max_len);
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            out.push(tag);
        }
    }
    out
}

/// Reduce an uploaded file name to its base name with safe characters.
pub fn sanitize_file_name(input: &str) -> String {
    let base = input.rsplit(['/', '\\']).next().unwrap_or(input);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .take(MAX_SHORT_TEXT_LENGTH)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "resume".to_string()
    } else {
        cleaned
    }
}
