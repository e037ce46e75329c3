//! Analysis roles, their typed outputs and the final per-candidate record

pub mod findings;
pub mod record;
pub mod role;

pub use findings::{
    ArchitectureFindings, DocumentationFindings, FieldPresence, QualityFindings, RiskLevel,
    RoleData, SecurityFindings, SynthesisVerdict,
};
pub use record::{AnalysisRecord, ParsedResult, ParsingMethod, Placeholder};
pub use role::{FieldKind, FieldSpec, Role, RoleSchema};
