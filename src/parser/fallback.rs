//! Pattern-based extraction from prose responses
//!
//! Used when a response carries no usable structured block. Each schema field
//! gets a set of patterns keyed off its label ("risk level: high",
//! "priority: 7/10", a "Recommendations:" header followed by bullets). Matches
//! are assembled into a JSON object so the same schema reader validates them.

use crate::analysis::{FieldKind, FieldSpec, Role};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

struct FieldPattern {
    spec: FieldSpec,
    inline: Regex,
    header: Regex,
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+(.+?)\s*$").expect("static bullet pattern")
    })
}

fn patterns() -> &'static HashMap<Role, Vec<FieldPattern>> {
    static PATTERNS: OnceLock<HashMap<Role, Vec<FieldPattern>>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Role::ALL
            .iter()
            .map(|role| {
                let fields = role.schema().fields.iter().map(|spec| build(*spec)).collect();
                (*role, fields)
            })
            .collect()
    })
}

/// Label alternation for a field: `risk_level` matches "risk level",
/// "risk-level", "risk_level" and the bare stem "risk".
fn label(name: &str) -> String {
    let full = name.replace('_', r"[ _-]?");
    match name.rsplit_once('_') {
        Some((stem, "score" | "level")) => format!("(?:{}|{})", full, stem.replace('_', r"[ _-]?")),
        _ => format!("(?:{})", full),
    }
}

fn build(spec: FieldSpec) -> FieldPattern {
    let label = label(spec.name);
    // Optional markdown emphasis / heading noise around the label.
    let lead = r"(?im)^[\s>#*_-]*";
    let trail = r"[*_]*";

    let inline = match spec.kind {
        FieldKind::Text | FieldKind::List => {
            format!(r"{lead}{label}{trail}\s*[:=]\s*(?P<value>.*?)\s*$")
        }
        FieldKind::Score => format!(
            r"(?i)\b{label}\b{trail}\s*(?:[:=]|is|of)?\s*(?P<value>\d+(?:\.\d+)?)(?:\s*/\s*(?P<denom>\d+))?"
        ),
        FieldKind::Level => format!(
            r"(?i)\b{label}\b{trail}\s*(?:[:=]|is)?\s*[*_]*(?P<value>low|medium|moderate|high|critical|severe|minor|major)\b"
        ),
    };
    let header = format!(r"{lead}{label}{trail}\s*:\s*$");

    FieldPattern {
        spec,
        inline: Regex::new(&inline).expect("fallback inline pattern"),
        header: Regex::new(&header).expect("fallback header pattern"),
    }
}

/// Extracts whatever schema fields the prose mentions
pub fn extract(role: Role, text: &str) -> Map<String, Value> {
    let mut object = Map::new();
    let Some(fields) = patterns().get(&role) else {
        return object;
    };

    for field in fields {
        let value = match field.spec.kind {
            FieldKind::Text => extract_text(field, text),
            FieldKind::Score => extract_score(field, text),
            FieldKind::Level => extract_level(field, text),
            FieldKind::List => extract_list(field, text),
        };
        if let Some(value) = value {
            object.insert(field.spec.name.to_string(), value);
        }
    }

    object
}

fn extract_text(field: &FieldPattern, text: &str) -> Option<Value> {
    field
        .inline
        .captures_iter(text)
        .filter_map(|c| c.name("value"))
        .map(|m| m.as_str().trim().trim_matches('*').trim())
        .find(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
}

fn extract_score(field: &FieldPattern, text: &str) -> Option<Value> {
    let captures = field.inline.captures(text)?;
    let raw: f64 = captures.name("value")?.as_str().parse().ok()?;
    let denom: Option<f64> = captures
        .name("denom")
        .and_then(|d| d.as_str().parse().ok())
        .filter(|d: &f64| *d > 0.0);

    let normalized = match denom {
        Some(d) => raw / d * 10.0,
        None => raw,
    };
    if !(0.0..=10.0).contains(&normalized) {
        return None;
    }
    serde_json::Number::from_f64(normalized).map(Value::Number)
}

fn extract_level(field: &FieldPattern, text: &str) -> Option<Value> {
    let captures = field.inline.captures(text)?;
    let value = captures.name("value")?.as_str().to_lowercase();
    Some(Value::String(value))
}

fn extract_list(field: &FieldPattern, text: &str) -> Option<Value> {
    let lines: Vec<&str> = text.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if field.header.is_match(line) {
            let items: Vec<Value> = lines[idx + 1..]
                .iter()
                .skip_while(|l| l.trim().is_empty())
                .map_while(|l| bullet_regex().captures(l))
                .filter_map(|c| c.get(1))
                .map(|m| Value::String(m.as_str().to_string()))
                .collect();
            if !items.is_empty() {
                return Some(Value::Array(items));
            }
        } else if let Some(captures) = field.inline.captures(line) {
            let rest = captures.name("value").map(|m| m.as_str()).unwrap_or("");
            let items: Vec<Value> = rest
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect();
            if !items.is_empty() {
                return Some(Value::Array(items));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_synthesis_prose() {
        let text = "Summary: Solid candidate with a few gaps.\n\
                    Priority: 7/10\n\
                    Recommendations:\n\
                    - add CI\n\
                    - write a README\n\
                    \n\
                    Thanks!";

        let object = extract(Role::Synthesis, text);

        assert_eq!(object["summary"], json!("Solid candidate with a few gaps."));
        assert_eq!(object["priority"], json!(7.0));
        assert_eq!(object["recommendations"], json!(["add CI", "write a README"]));
        assert!(!object.contains_key("key_findings"));
    }

    #[test]
    fn test_score_with_other_denominator_is_scaled() {
        let object = extract(Role::Quality, "Quality score: 80/100 overall");
        assert_eq!(object["quality_score"], json!(8.0));
    }

    #[test]
    fn test_score_stem_label() {
        let object = extract(Role::Architecture, "The complexity is 6 out of ten.");
        assert_eq!(object["complexity_score"], json!(6.0));
    }

    #[test]
    fn test_level_variants() {
        let object = extract(Role::Security, "**Risk level**: **High** due to eval()");
        assert_eq!(object["risk_level"], json!("high"));

        let object = extract(Role::Security, "Overall the risk is moderate.");
        assert_eq!(object["risk_level"], json!("moderate"));
    }

    #[test]
    fn test_inline_list() {
        let object = extract(Role::Documentation, "Gaps: no API docs; stale install guide");
        assert_eq!(object["gaps"], json!(["no API docs", "stale install guide"]));
    }

    #[test]
    fn test_numbered_bullets() {
        let text = "Findings:\n1. hardcoded token\n2) weak hashing\nend";
        let object = extract(Role::Security, text);
        assert_eq!(object["findings"], json!(["hardcoded token", "weak hashing"]));
    }

    #[test]
    fn test_gibberish_extracts_nothing() {
        assert!(extract(Role::Synthesis, "asdf qwer zxcv 12345 !!!").is_empty());
        assert!(extract(Role::Security, "").is_empty());
    }

    #[test]
    fn test_out_of_range_score_ignored() {
        let object = extract(Role::Synthesis, "priority: 42");
        assert!(!object.contains_key("priority"));
    }
}
