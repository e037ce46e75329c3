//! Output formatting for JSON, YAML and human-readable text

use crate::analysis::{AnalysisRecord, Placeholder};
use crate::cache::CacheStats;
use crate::triage::TriageOutcome;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_records(&self, records: &[AnalysisRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(human_records(records)),
            _ => self.serialize(records),
        }
    }

    pub fn format_triage(&self, outcome: &TriageOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(human_triage(outcome)),
            _ => self.serialize(outcome),
        }
    }

    pub fn format_stats(&self, stats: &CacheStats) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(human_stats(stats)),
            _ => self.serialize(stats),
        }
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value).context("Failed to serialize to YAML"),
            _ => serde_json::to_string_pretty(value).context("Failed to serialize to JSON"),
        }
    }
}

fn human_records(records: &[AnalysisRecord]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        out.push_str("No candidates selected.\n");
        return out;
    }

    for record in records {
        let _ = writeln!(
            out,
            "{}  (aggregate confidence {:.2})",
            record.candidate_id(),
            record.aggregate_confidence()
        );
        for (role, result) in record.results() {
            let detail = match &result.placeholder {
                Some(Placeholder::Failed { class, message }) => {
                    format!("failed [{}]: {}", class, message)
                }
                Some(Placeholder::TimedOut) => "timed out".to_string(),
                None => result.data.summary().unwrap_or("-").to_string(),
            };
            let _ = writeln!(
                out,
                "  {:<14} {:.2}  {:<17} {}",
                role.as_str(),
                result.confidence,
                result.parsing_method.to_string(),
                detail
            );
        }
        out.push('\n');
    }
    out
}

fn human_triage(outcome: &TriageOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Selected ({}):", outcome.selected.len());
    for selection in &outcome.selected {
        let _ = writeln!(
            out,
            "  #{:<3} {:<24} priority {:.3}",
            selection.rank, selection.candidate.id, selection.priority.total
        );
    }

    if !outcome.rejected.is_empty() {
        let _ = writeln!(out, "Rejected ({}):", outcome.rejected.len());
        for rejection in &outcome.rejected {
            let _ = writeln!(
                out,
                "  {:<29} priority {:.3}  {}",
                rejection.candidate_id, rejection.priority, rejection.reason
            );
        }
    }
    out
}

fn human_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Entries: {}", stats.entries);
    let _ = writeln!(out, "Expired: {}", stats.expired);
    for (role, count) in &stats.by_role {
        let _ = writeln!(out, "  {:<14} {}", role, count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParsedResult, Role};
    use crate::error::ErrorClass;
    use crate::triage::{select, CandidateRecord};
    use std::collections::BTreeMap;

    fn record() -> AnalysisRecord {
        let mut results = BTreeMap::new();
        results.insert(
            Role::Security,
            ParsedResult::failed(Role::Security, ErrorClass::RateLimited, "quota"),
        );
        AnalysisRecord::new("c1", results)
    }

    #[test]
    fn test_json_records() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_records(&[record()])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["candidate_id"], "c1");
    }

    #[test]
    fn test_human_records_show_placeholders() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_records(&[record()])
            .unwrap();
        assert!(output.contains("c1"));
        assert!(output.contains("failed [rate_limited]: quota"));
    }

    #[test]
    fn test_human_triage() {
        let candidates = vec![
            CandidateRecord::new("a", "alpha", "fa").with_cheap_score(2.0),
            CandidateRecord::new("b", "bravo", "fb").with_cheap_score(1.0),
        ];
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_triage(&select(&candidates, 0.5))
            .unwrap();
        assert!(output.contains("Selected (1):"));
        assert!(output.contains("below cutoff (rank 2)"));
    }

    #[test]
    fn test_yaml_stats() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_stats(&CacheStats::default())
            .unwrap();
        assert!(output.contains("entries: 0"));
    }
}
