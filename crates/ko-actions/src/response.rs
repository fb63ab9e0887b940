//! Model response handling: pull the text out of a responses-API payload
//! and find the JSON object the model was asked to produce.

use serde_json::Value;

/// Text output of a responses-API payload. A non-blank top-level
/// `output_text` wins; otherwise every `text` field under
/// `output[*].content[*]` is joined with newlines.
pub fn response_text(payload: &Value) -> String {
    let Some(root) = payload.as_object() else {
        return String::new();
    };

    if let Some(text) = root.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return text.to_string();
        }
    }

    let Some(output) = root.get("output").and_then(Value::as_array) else {
        return String::new();
    };

    let chunks: Vec<&str> = output
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    chunks.join("\n").trim().to_string()
}

/// The first balanced `{...}` object in `text`. Braces inside string
/// literals (including escaped quotes) do not count.
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in text.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}
