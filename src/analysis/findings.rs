//! Typed per-role output data
//!
//! Each role has one concrete struct. Model output (or fallback extraction)
//! arrives as a JSON object and is read field by field against the role schema;
//! fields of the wrong shape are dropped and reported rather than failing the
//! whole object.

use super::role::{FieldKind, Role, RoleSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => Some(RiskLevel::Low),
            "medium" | "moderate" => Some(RiskLevel::Medium),
            "high" | "major" => Some(RiskLevel::High),
            "critical" | "severe" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureFindings {
    pub summary: Option<String>,
    pub complexity_score: Option<f64>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityFindings {
    pub summary: Option<String>,
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub severity_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityFindings {
    pub summary: Option<String>,
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationFindings {
    pub summary: Option<String>,
    pub completeness_score: Option<f64>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisVerdict {
    pub summary: Option<String>,
    pub priority: Option<f64>,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    pub overall_score: Option<f64>,
}

/// Schema-validated output of one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleData {
    Architecture(ArchitectureFindings),
    Security(SecurityFindings),
    Quality(QualityFindings),
    Documentation(DocumentationFindings),
    Synthesis(SynthesisVerdict),
}

/// How many schema fields a result actually populates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldPresence {
    pub required_present: usize,
    pub required_total: usize,
    pub optional_present: usize,
    pub optional_total: usize,
    pub non_empty_lists: usize,
}

impl FieldPresence {
    fn scalar(&mut self, required: bool, present: bool) {
        if required {
            self.required_total += 1;
            self.required_present += usize::from(present);
        } else {
            self.optional_total += 1;
            self.optional_present += usize::from(present);
        }
    }

    fn list(&mut self, required: bool, items: &[String]) {
        self.scalar(required, !items.is_empty());
        if !items.is_empty() {
            self.non_empty_lists += 1;
        }
    }

    pub fn populated(&self) -> usize {
        self.required_present + self.optional_present
    }

    pub fn all_required_present(&self) -> bool {
        self.required_present == self.required_total
    }
}

impl RoleData {
    /// All-default data for a role
    pub fn empty(role: Role) -> Self {
        match role {
            Role::Architecture => RoleData::Architecture(Default::default()),
            Role::Security => RoleData::Security(Default::default()),
            Role::Quality => RoleData::Quality(Default::default()),
            Role::Documentation => RoleData::Documentation(Default::default()),
            Role::Synthesis => RoleData::Synthesis(Default::default()),
        }
    }

    /// Reads a JSON object against the role schema.
    ///
    /// Returns the typed data plus every validation problem found. An empty
    /// error list means the object fully satisfies the schema.
    pub fn from_object(role: Role, object: &Map<String, Value>) -> (Self, Vec<String>) {
        let mut r = FieldReader::new(role.schema(), object);

        let data = match role {
            Role::Architecture => RoleData::Architecture(ArchitectureFindings {
                summary: r.text("summary"),
                complexity_score: r.score("complexity_score"),
                patterns: r.list("patterns"),
                components: r.list("components"),
                risks: r.list("risks"),
            }),
            Role::Security => RoleData::Security(SecurityFindings {
                summary: r.text("summary"),
                risk_level: r.level("risk_level"),
                findings: r.list("findings"),
                recommendations: r.list("recommendations"),
                severity_score: r.score("severity_score"),
            }),
            Role::Quality => RoleData::Quality(QualityFindings {
                summary: r.text("summary"),
                quality_score: r.score("quality_score"),
                issues: r.list("issues"),
                strengths: r.list("strengths"),
                recommendations: r.list("recommendations"),
            }),
            Role::Documentation => RoleData::Documentation(DocumentationFindings {
                summary: r.text("summary"),
                completeness_score: r.score("completeness_score"),
                gaps: r.list("gaps"),
                recommendations: r.list("recommendations"),
            }),
            Role::Synthesis => RoleData::Synthesis(SynthesisVerdict {
                summary: r.text("summary"),
                priority: r.score("priority"),
                key_findings: r.list("key_findings"),
                recommendations: r.list("recommendations"),
                risks: r.list("risks"),
                overall_score: r.score("overall_score"),
            }),
        };

        (data, r.into_errors())
    }

    pub fn role(&self) -> Role {
        match self {
            RoleData::Architecture(_) => Role::Architecture,
            RoleData::Security(_) => Role::Security,
            RoleData::Quality(_) => Role::Quality,
            RoleData::Documentation(_) => Role::Documentation,
            RoleData::Synthesis(_) => Role::Synthesis,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            RoleData::Architecture(d) => d.summary.as_deref(),
            RoleData::Security(d) => d.summary.as_deref(),
            RoleData::Quality(d) => d.summary.as_deref(),
            RoleData::Documentation(d) => d.summary.as_deref(),
            RoleData::Synthesis(d) => d.summary.as_deref(),
        }
    }

    pub fn presence(&self) -> FieldPresence {
        let mut p = FieldPresence::default();
        match self {
            RoleData::Architecture(d) => {
                p.scalar(true, d.summary.is_some());
                p.scalar(true, d.complexity_score.is_some());
                p.list(false, &d.patterns);
                p.list(false, &d.components);
                p.list(false, &d.risks);
            }
            RoleData::Security(d) => {
                p.scalar(true, d.summary.is_some());
                p.scalar(true, d.risk_level.is_some());
                p.list(false, &d.findings);
                p.list(false, &d.recommendations);
                p.scalar(false, d.severity_score.is_some());
            }
            RoleData::Quality(d) => {
                p.scalar(true, d.summary.is_some());
                p.scalar(true, d.quality_score.is_some());
                p.list(false, &d.issues);
                p.list(false, &d.strengths);
                p.list(false, &d.recommendations);
            }
            RoleData::Documentation(d) => {
                p.scalar(true, d.summary.is_some());
                p.scalar(true, d.completeness_score.is_some());
                p.list(false, &d.gaps);
                p.list(false, &d.recommendations);
            }
            RoleData::Synthesis(d) => {
                p.scalar(true, d.summary.is_some());
                p.scalar(true, d.priority.is_some());
                p.list(false, &d.key_findings);
                p.list(false, &d.recommendations);
                p.list(false, &d.risks);
                p.scalar(false, d.overall_score.is_some());
            }
        }
        p
    }
}

/// Reads typed values out of a JSON object, collecting schema violations
struct FieldReader<'a> {
    schema: &'static RoleSchema,
    object: &'a Map<String, Value>,
    errors: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(schema: &'static RoleSchema, object: &'a Map<String, Value>) -> Self {
        Self {
            schema,
            object,
            errors: Vec::new(),
        }
    }

    fn value(&mut self, name: &str, kind: FieldKind) -> Option<&'a Value> {
        let required = self.schema.field(name).map(|f| f.required).unwrap_or(false);
        debug_assert_eq!(self.schema.field(name).map(|f| f.kind), Some(kind));

        match self.object.get(name) {
            None | Some(Value::Null) => {
                if required {
                    self.errors.push(format!("missing required field: {}", name));
                }
                None
            }
            Some(v) => Some(v),
        }
    }

    fn mismatch(&mut self, name: &str, kind: FieldKind, got: &Value) {
        self.errors.push(format!(
            "field {}: expected {}, got {}",
            name,
            kind.describe(),
            value_kind(got)
        ));
    }

    fn text(&mut self, name: &str) -> Option<String> {
        let v = self.value(name, FieldKind::Text)?;
        match v.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => {
                self.mismatch(name, FieldKind::Text, v);
                None
            }
        }
    }

    fn score(&mut self, name: &str) -> Option<f64> {
        let v = self.value(name, FieldKind::Score)?;
        match v.as_f64() {
            Some(n) if (0.0..=MAX_SCORE).contains(&n) => Some(n),
            Some(n) => {
                self.errors
                    .push(format!("field {}: score {} outside 0-{}", name, n, MAX_SCORE));
                None
            }
            None => {
                self.mismatch(name, FieldKind::Score, v);
                None
            }
        }
    }

    fn level(&mut self, name: &str) -> Option<RiskLevel> {
        let v = self.value(name, FieldKind::Level)?;
        match v.as_str().and_then(RiskLevel::parse) {
            Some(level) => Some(level),
            None => {
                self.mismatch(name, FieldKind::Level, v);
                None
            }
        }
    }

    fn list(&mut self, name: &str) -> Vec<String> {
        let Some(v) = self.value(name, FieldKind::List) else {
            return Vec::new();
        };
        match v.as_array() {
            Some(items) => {
                let strings: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if strings.len() != items.len() {
                    self.errors.push(format!(
                        "field {}: dropped {} non-string or empty item(s)",
                        name,
                        items.len() - strings.len()
                    ));
                }
                strings
            }
            None => {
                self.mismatch(name, FieldKind::List, v);
                Vec::new()
            }
        }
    }

    fn into_errors(self) -> Vec<String> {
        self.errors
    }
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(s) if s.trim().is_empty() => "empty string",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
