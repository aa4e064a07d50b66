//! Completeness probe and JSON extraction for generator replies.

use crate::error::PipelineError;
use serde_json::Value;

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Braces and brackets balance outside string literals.
pub fn is_balanced(content: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in content.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty() && !in_string
}

/// Locate and parse the JSON value in a reply: the fence-stripped body
/// itself, or the outermost `{..}`/`[..]` span when prose surrounds it.
fn extract_json(content: &str) -> Option<Value> {
    let body = strip_code_fence(content);
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Some(value);
    }
    let start = body.find(['{', '['])?;
    let end = body.rfind(['}', ']'])?;
    if start >= end {
        return None;
    }
    let span = &body[start..=end];
    if !is_balanced(span) {
        return None;
    }
    serde_json::from_str::<Value>(span).ok()
}

/// Whether `content` holds a whole JSON reply carrying `expected_keys`.
///
/// Uses the same extraction as [`parse_json_output`], so prose around a
/// finished object does not read as truncation.
pub fn is_complete(content: &str, expected_keys: &[String]) -> bool {
    match extract_json(content) {
        Some(Value::Object(map)) => expected_keys.iter().all(|k| map.contains_key(k)),
        Some(_) => expected_keys.is_empty(),
        None => false,
    }
}

/// Parse a JSON reply, tolerating code fences and surrounding prose.
pub fn parse_json_output(item: &str, content: &str) -> Result<Value, PipelineError> {
    extract_json(content).ok_or_else(|| PipelineError::MalformedOutput {
        item: item.to_string(),
        detail: format!("reply is not valid JSON ({} chars)", content.len()),
    })
}
