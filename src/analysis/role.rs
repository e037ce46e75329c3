//! Analysis roles and their output schemas
//!
//! Roles form a closed set. Each one has a fixed schema describing which fields
//! a model response must (or may) carry; the schema drives prompt construction,
//! validation, natural-language fallback extraction and confidence scoring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage of the per-candidate analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Module boundaries, patterns and structural risk
    Architecture,
    /// Vulnerabilities and unsafe practices
    Security,
    /// Code health, tests and maintainability
    Quality,
    /// README, API docs and onboarding material
    Documentation,
    /// Aggregator: folds the specialist outputs into a prioritised verdict
    Synthesis,
}

impl Role {
    /// Specialist roles, in the order their results are reported
    pub const SPECIALISTS: [Role; 4] = [
        Role::Architecture,
        Role::Security,
        Role::Quality,
        Role::Documentation,
    ];

    /// Every role, specialists first
    pub const ALL: [Role; 5] = [
        Role::Architecture,
        Role::Security,
        Role::Quality,
        Role::Documentation,
        Role::Synthesis,
    ];

    pub fn is_aggregator(self) -> bool {
        matches!(self, Role::Synthesis)
    }

    /// Roles whose results must be terminal before this role may start
    pub fn depends_on(self) -> &'static [Role] {
        if self.is_aggregator() {
            &Self::SPECIALISTS
        } else {
            &[]
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Architecture => "architecture",
            Role::Security => "security",
            Role::Quality => "quality",
            Role::Documentation => "documentation",
            Role::Synthesis => "synthesis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "architecture" => Some(Role::Architecture),
            "security" => Some(Role::Security),
            "quality" => Some(Role::Quality),
            "documentation" | "docs" => Some(Role::Documentation),
            "synthesis" | "aggregator" => Some(Role::Synthesis),
            _ => None,
        }
    }

    pub fn schema(self) -> &'static RoleSchema {
        match self {
            Role::Architecture => &ARCHITECTURE_SCHEMA,
            Role::Security => &SECURITY_SCHEMA,
            Role::Quality => &QUALITY_SCHEMA,
            Role::Documentation => &DOCUMENTATION_SCHEMA,
            Role::Synthesis => &SYNTHESIS_SCHEMA,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value shape a schema field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty string
    Text,
    /// Number in 0..=10
    Score,
    /// One of low / medium / high / critical
    Level,
    /// Array of non-empty strings
    List,
}

impl FieldKind {
    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Score => "number 0-10",
            FieldKind::Level => "\"low\" | \"medium\" | \"high\" | \"critical\"",
            FieldKind::List => "array of strings",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

/// Declared fields of one role's structured output
#[derive(Debug)]
pub struct RoleSchema {
    pub role: Role,
    pub fields: &'static [FieldSpec],
}

impl RoleSchema {
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn optional_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.required)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON skeleton shown to the model in prompts
    pub fn skeleton(&self) -> String {
        let lines: Vec<String> = self
            .fields
            .iter()
            .map(|f| {
                format!(
                    "  \"{}\": <{}>{}",
                    f.name,
                    f.kind.describe(),
                    if f.required { " (required)" } else { "" }
                )
            })
            .collect();
        format!("{{\n{}\n}}", lines.join(",\n"))
    }
}

pub static ARCHITECTURE_SCHEMA: RoleSchema = RoleSchema {
    role: Role::Architecture,
    fields: &[
        required("summary", FieldKind::Text),
        required("complexity_score", FieldKind::Score),
        optional("patterns", FieldKind::List),
        optional("components", FieldKind::List),
        optional("risks", FieldKind::List),
    ],
};

pub static SECURITY_SCHEMA: RoleSchema = RoleSchema {
    role: Role::Security,
    fields: &[
        required("summary", FieldKind::Text),
        required("risk_level", FieldKind::Level),
        optional("findings", FieldKind::List),
        optional("recommendations", FieldKind::List),
        optional("severity_score", FieldKind::Score),
    ],
};

pub static QUALITY_SCHEMA: RoleSchema = RoleSchema {
    role: Role::Quality,
    fields: &[
        required("summary", FieldKind::Text),
        required("quality_score", FieldKind::Score),
        optional("issues", FieldKind::List),
        optional("strengths", FieldKind::List),
        optional("recommendations", FieldKind::List),
    ],
};

pub static DOCUMENTATION_SCHEMA: RoleSchema = RoleSchema {
    role: Role::Documentation,
    fields: &[
        required("summary", FieldKind::Text),
        required("completeness_score", FieldKind::Score),
        optional("gaps", FieldKind::List),
        optional("recommendations", FieldKind::List),
    ],
};

pub static SYNTHESIS_SCHEMA: RoleSchema = RoleSchema {
    role: Role::Synthesis,
    fields: &[
        required("summary", FieldKind::Text),
        required("priority", FieldKind::Score),
        optional("key_findings", FieldKind::List),
        optional("recommendations", FieldKind::List),
        optional("risks", FieldKind::List),
        optional("overall_score", FieldKind::Score),
    ],
};
