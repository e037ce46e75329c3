//! Turning raw model text into a [`ParsedResult`]
//!
//! Three stages, tried in order, each producing a result with a lower ceiling
//! of trust than the last:
//!
//! 1. **Exact**: a structured block that fully satisfies the role schema
//! 2. **HeuristicPartial**: a structured block that parses but fails some
//!    validation; whatever fields did validate are kept
//! 3. **Fallback**: label-based extraction from prose
//!
//! If nothing at all can be extracted the parser returns an empty result with
//! confidence 0.0. Parsing never fails.

pub mod confidence;
pub mod extract;
pub mod fallback;

use crate::analysis::{ParsedResult, ParsingMethod, Role, RoleData};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, warn};

/// Responses longer than this are cut before parsing
pub const MAX_RESPONSE_CHARS: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct ResponseParser {
    max_chars: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            max_chars: MAX_RESPONSE_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn parse(&self, role: Role, raw: &str) -> ParsedResult {
        let start = Instant::now();
        let mut notes = Vec::new();

        let (text, truncated) = extract::truncate_chars(raw, self.max_chars);
        if truncated {
            warn!(
                role = %role,
                max_chars = self.max_chars,
                "Response exceeds size limit, truncating"
            );
            notes.push(format!(
                "response truncated to {} characters",
                self.max_chars
            ));
        }

        let result = self.parse_text(role, text, notes);

        debug!(
            role = %role,
            method = %result.parsing_method,
            confidence = result.confidence,
            errors = result.errors.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Parsed response"
        );

        result
    }

    fn parse_text(&self, role: Role, text: &str, mut notes: Vec<String>) -> ParsedResult {
        let blocks: Vec<Map<String, Value>> = extract::candidate_blocks(text)
            .into_iter()
            .filter_map(extract::parse_object)
            .collect();

        // Best partial candidate seen so far: (data, errors, populated)
        let mut best_partial: Option<(RoleData, Vec<String>, usize)> = None;

        for object in &blocks {
            let views = std::iter::once(object).chain(extract::unwrap_envelope(object));
            for view in views {
                let (data, errors) = RoleData::from_object(role, view);
                if errors.is_empty() {
                    return finish(role, data, ParsingMethod::Exact, notes);
                }

                let populated = data.presence().populated();
                let better = best_partial
                    .as_ref()
                    .map(|(_, _, best)| populated > *best)
                    .unwrap_or(populated > 0);
                if better {
                    best_partial = Some((data, errors, populated));
                }
            }
        }

        if let Some((data, errors, _)) = best_partial {
            notes.extend(errors);
            return finish(role, data, ParsingMethod::HeuristicPartial, notes);
        }

        if blocks.is_empty() {
            notes.push("no structured block found".to_string());
        } else {
            notes.push(format!(
                "{} structured block(s) matched no {} fields",
                blocks.len(),
                role
            ));
        }

        let extracted = fallback::extract(role, text);
        if !extracted.is_empty() {
            let (data, errors) = RoleData::from_object(role, &extracted);
            if data.presence().populated() > 0 {
                notes.extend(errors);
                return finish(role, data, ParsingMethod::Fallback, notes);
            }
        }

        notes.push("nothing extractable".to_string());
        ParsedResult::empty(role, notes)
    }
}

fn finish(role: Role, data: RoleData, method: ParsingMethod, errors: Vec<String>) -> ParsedResult {
    let confidence = confidence::score(&data.presence());
    ParsedResult {
        role,
        data,
        confidence,
        parsing_method: method,
        errors,
        placeholder: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{RiskLevel, SecurityFindings, SynthesisVerdict};

    fn parser() -> ResponseParser {
        ResponseParser::new()
    }

    #[test]
    fn test_exact_json() {
        let raw = r#"{"summary": "Looks fine", "risk_level": "low", "findings": [], "recommendations": ["pin deps"]}"#;
        let result = parser().parse(Role::Security, raw);

        assert_eq!(result.parsing_method, ParsingMethod::Exact);
        assert!(result.errors.is_empty());
        match &result.data {
            RoleData::Security(SecurityFindings {
                risk_level,
                recommendations,
                ..
            }) => {
                assert_eq!(*risk_level, Some(RiskLevel::Low));
                assert_eq!(recommendations, &vec!["pin deps".to_string()]);
            }
            other => panic!("unexpected data: {:?}", other),
        }
        assert!(result.confidence > 0.4);
    }

    #[test]
    fn test_exact_inside_markdown_and_envelope() {
        let raw = "Sure!\n```json\n{\"result\": {\"summary\": \"ok\", \"priority\": 6}}\n```";
        let result = parser().parse(Role::Synthesis, raw);
        assert_eq!(result.parsing_method, ParsingMethod::Exact);
        assert_eq!(result.data.summary(), Some("ok"));
    }

    #[test]
    fn test_first_valid_block_wins() {
        let raw = r#"draft: {"summary": 5} final: {"summary": "second", "priority": 3}"#;
        let result = parser().parse(Role::Synthesis, raw);
        assert_eq!(result.parsing_method, ParsingMethod::Exact);
        assert_eq!(result.data.summary(), Some("second"));
    }

    #[test]
    fn test_heuristic_partial_keeps_valid_fields() {
        let raw = r#"{"summary": "partial", "priority": "very high", "recommendations": ["a", 3]}"#;
        let result = parser().parse(Role::Synthesis, raw);

        assert_eq!(result.parsing_method, ParsingMethod::HeuristicPartial);
        assert!(!result.errors.is_empty());
        match &result.data {
            RoleData::Synthesis(SynthesisVerdict {
                summary,
                priority,
                recommendations,
                ..
            }) => {
                assert_eq!(summary.as_deref(), Some("partial"));
                assert_eq!(*priority, None);
                assert_eq!(recommendations, &vec!["a".to_string()]);
            }
            other => panic!("unexpected data: {:?}", other),
        }
        assert!(result.confidence > 0.0 && result.confidence < 1.0);
    }

    #[test]
    fn test_fallback_from_prose() {
        let raw = "Summary: needs work.\nPriority: 4/10\nRecommendations:\n- add tests";
        let result = parser().parse(Role::Synthesis, raw);

        assert_eq!(result.parsing_method, ParsingMethod::Fallback);
        assert_eq!(result.data.summary(), Some("needs work."));
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_garbage_never_fails() {
        for raw in ["", "   ", "}{", "{{{{", "\u{0}\u{1}", "null", "[1,2]", "{\"a\":"] {
            let result = parser().parse(Role::Quality, raw);
            assert_eq!(result.confidence, 0.0, "input {:?}", raw);
            assert_eq!(result.parsing_method, ParsingMethod::Fallback);
            assert!(!result.errors.is_empty());
            assert!(!result.is_placeholder());
        }
    }

    #[test]
    fn test_oversized_input_truncated() {
        let mut raw = String::from(r#"{"summary": "ok", "quality_score": 7}"#);
        raw.push_str(&"x".repeat(200));

        let result = parser().with_max_chars(64).parse(Role::Quality, &raw);

        assert_eq!(result.parsing_method, ParsingMethod::Exact);
        assert!(result.errors.iter().any(|e| e.contains("truncated")));
    }

    #[test]
    fn test_confidence_within_bounds() {
        let raw = r#"{"summary": "all", "complexity_score": 9, "patterns": ["mvc"], "components": ["api"], "risks": ["coupling"]}"#;
        let result = parser().parse(Role::Architecture, raw);
        assert_eq!(result.parsing_method, ParsingMethod::Exact);
        assert_eq!(result.confidence, 1.0);
    }
}
