//! Structured output extraction from free-form model text.
//!
//! Attempts, in order: the whole text, each fenced code block, then every
//! balanced top-level `{...}` / `[...]` span. The first object or array that
//! parses wins.

use serde_json::Value;

use crate::error::{AiError, AiResult};

/// Extract the first JSON object or array from model output.
pub fn extract_json_object(text: &str) -> AiResult<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AiError::InvalidJson("empty response".to_string()));
    }

    if let Some(value) = parse_structured(trimmed) {
        return Ok(value);
    }

    for block in fenced_blocks(trimmed) {
        if let Some(value) = parse_structured(block) {
            return Ok(value);
        }
    }

    for span in balanced_spans(trimmed) {
        if let Some(value) = parse_structured(span) {
            return Ok(value);
        }
    }

    Err(AiError::InvalidJson(preview(trimmed)))
}

fn parse_structured(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

/// Contents of each ``` fenced block; the info string (e.g. `json`) is skipped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let info = &after_fence[..body_start];
        // Only a bare word may follow the opening fence; anything else is content
        let body = if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
            &after_fence[body_start..]
        } else {
            after_fence
        };
        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }
    blocks
}

/// Balanced bracket spans in order of their opening position. String
/// literals are skipped so braces inside them do not count.
fn balanced_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < bytes.len() {
        let Some(offset) = bytes[start..].iter().position(|&b| b == b'{' || b == b'[') else {
            break;
        };
        let open = start + offset;
        if let Some(close) = matching_close(bytes, open) {
            spans.push(&text[open..=close]);
        }
        start = open + 1;
    }
    spans
}

fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse() {
        let v = extract_json_object(r#"{"score": 82}"#).unwrap();
        assert_eq!(v, json!({"score": 82}));
    }

    #[test]
    fn test_fenced_serialization_returns_equal_object() {
        let original = json!({
            "summary": "Seasoned COO",
            "strengths": ["operations", "M&A"],
            "score": 91,
            "nested": {"ok": true}
        });
        let fenced = format!(
            "```json\n{}\n```",
            serde_json::to_string_pretty(&original).unwrap()
        );
        assert_eq!(extract_json_object(&fenced).unwrap(), original);
    }

    #[test]
    fn test_fence_without_language_tag() {
        let text = "Here you go:\n```\n[1, 2, 3]\n```\nThanks";
        assert_eq!(extract_json_object(text).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_brace_scan_with_surrounding_prose() {
        let text = r#"Sure! The analysis is {"fit": "strong", "note": "uses {braces} in text"} hope it helps."#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["fit"], "strong");
        assert_eq!(v["note"], "uses {braces} in text");
    }

    #[test]
    fn test_skips_invalid_span_and_takes_next() {
        let text = r#"{not json} then {"a": 1}"#;
        assert_eq!(extract_json_object(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_scalars_are_not_structured_output() {
        assert!(matches!(
            extract_json_object("42"),
            Err(AiError::InvalidJson(_))
        ));
        assert!(matches!(
            extract_json_object("\"just a string\""),
            Err(AiError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_no_json_is_distinct_error() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, AiError::InvalidJson(_)));
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_unterminated_object() {
        assert!(extract_json_object(r#"{"a": [1, 2"#).is_err());
    }
}
