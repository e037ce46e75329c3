//! Locating structured blocks inside free-form model output

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Upper bound on blocks inspected per response
const MAX_BLOCKS: usize = 16;

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(?:jsonc|json|JSON)?[ \t]*\n?([\s\S]*?)\n?```").expect("static fence pattern")
    })
}

fn trailing_comma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("static trailing comma pattern"))
}

/// Candidate structured blocks in preference order: fenced code blocks first,
/// then top-level balanced `{...}` spans. Duplicates are dropped.
pub fn candidate_blocks(text: &str) -> Vec<&str> {
    let mut blocks: Vec<&str> = Vec::new();

    for captures in fence_regex().captures_iter(text) {
        if let Some(body) = captures.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') && !blocks.contains(&body) {
                blocks.push(body);
            }
        }
        if blocks.len() >= MAX_BLOCKS {
            return blocks;
        }
    }

    for span in balanced_object_spans(text) {
        if !blocks.contains(&span) {
            blocks.push(span);
        }
        if blocks.len() >= MAX_BLOCKS {
            break;
        }
    }

    blocks
}

/// Top-level `{...}` spans, honouring JSON string quoting inside objects.
///
/// An unterminated trailing object is ignored.
fn balanced_object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }

    spans
}

/// Parses a block into a JSON object, tolerating trailing commas
pub fn parse_object(block: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(_) => {
            let repaired = trailing_comma_regex().replace_all(block, "$1");
            match serde_json::from_str::<Value>(&repaired) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        }
    }
}

/// Single-key wrapper such as `{"result": {...}}`, if that is all the object is
pub fn unwrap_envelope(object: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if object.len() != 1 {
        return None;
    }
    object.values().next().and_then(Value::as_object)
}

/// Cuts `text` to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
