use super::findings::RoleData;
use super::role::Role;
use crate::error::ErrorClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which extraction stage produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingMethod {
    /// A structured block fully satisfied the role schema
    Exact,
    /// A structured block parsed but failed validation; partial data kept
    HeuristicPartial,
    /// Natural-language pattern extraction (or nothing usable at all)
    Fallback,
}

impl fmt::Display for ParsingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParsingMethod::Exact => "exact",
            ParsingMethod::HeuristicPartial => "heuristic_partial",
            ParsingMethod::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Why a result stands in for a task that produced no model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Placeholder {
    /// Every provider in the fallback chain failed
    Failed { class: ErrorClass, message: String },
    /// The pipeline deadline passed before the task finished
    TimedOut,
}

/// Structured, confidence-scored output of one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResult {
    pub role: Role,
    pub data: RoleData,
    pub confidence: f64,
    pub parsing_method: ParsingMethod,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Placeholder>,
}

impl ParsedResult {
    /// Minimal valid result carrying no data
    pub fn empty(role: Role, errors: Vec<String>) -> Self {
        Self {
            role,
            data: RoleData::empty(role),
            confidence: 0.0,
            parsing_method: ParsingMethod::Fallback,
            errors,
            placeholder: None,
        }
    }

    /// Terminal stand-in for a task whose provider chain was exhausted
    pub fn failed(role: Role, class: ErrorClass, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut result = Self::empty(role, vec![format!("provider failure: {}", message)]);
        result.placeholder = Some(Placeholder::Failed { class, message });
        result
    }

    /// Terminal stand-in for a task cut off by the pipeline deadline
    pub fn timed_out(role: Role) -> Self {
        let mut result = Self::empty(role, vec!["timed out before completion".to_string()]);
        result.placeholder = Some(Placeholder::TimedOut);
        result
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }
}

/// Final per-candidate output handed to downstream consumers.
///
/// Fields are private so a record cannot change after the pipeline builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    candidate_id: String,
    results: BTreeMap<Role, ParsedResult>,
    aggregate_confidence: f64,
    produced_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(candidate_id: impl Into<String>, results: BTreeMap<Role, ParsedResult>) -> Self {
        let aggregate_confidence = aggregate_confidence(&results);
        Self {
            candidate_id: candidate_id.into(),
            results,
            aggregate_confidence,
            produced_at: Utc::now(),
        }
    }

    pub fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    pub fn results(&self) -> &BTreeMap<Role, ParsedResult> {
        &self.results
    }

    pub fn result(&self, role: Role) -> Option<&ParsedResult> {
        self.results.get(&role)
    }

    pub fn aggregate_confidence(&self) -> f64 {
        self.aggregate_confidence
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    /// Number of roles that degraded to a placeholder
    pub fn placeholder_count(&self) -> usize {
        self.results.values().filter(|r| r.is_placeholder()).count()
    }
}

/// Half the aggregator's confidence plus half the specialist mean.
///
/// Missing roles count as 0.0 so an incomplete record never looks as good as
/// a complete one.
fn aggregate_confidence(results: &BTreeMap<Role, ParsedResult>) -> f64 {
    let specialist_total: f64 = Role::SPECIALISTS
        .iter()
        .map(|role| results.get(role).map(|r| r.confidence).unwrap_or(0.0))
        .sum();
    let specialist_mean = specialist_total / Role::SPECIALISTS.len() as f64;
    let aggregator = results
        .get(&Role::Synthesis)
        .map(|r| r.confidence)
        .unwrap_or(0.0);

    (0.5 * aggregator + 0.5 * specialist_mean).clamp(0.0, 1.0)
}
