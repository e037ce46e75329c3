//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { candidates } => {
                info!(candidates, "Starting triage");
            }
            ProgressEvent::TriageComplete {
                candidates,
                selected,
                duplicates,
            } => {
                info!(candidates, selected, duplicates, "Triage complete");
            }
            ProgressEvent::CandidateStarted {
                candidate_id,
                index,
                total,
            } => {
                info!(
                    candidate = %candidate_id,
                    progress = format!("{}/{}", index, total),
                    "Analyzing candidate"
                );
            }
            ProgressEvent::RoleComplete {
                candidate_id,
                role,
                confidence,
                from_cache,
                placeholder,
                duration,
            } => {
                if *placeholder {
                    warn!(
                        candidate = %candidate_id,
                        role = %role,
                        duration_ms = duration.as_millis(),
                        "Role degraded to placeholder"
                    );
                } else {
                    debug!(
                        candidate = %candidate_id,
                        role = %role,
                        confidence,
                        from_cache,
                        duration_ms = duration.as_millis(),
                        "Role complete"
                    );
                }
            }
            ProgressEvent::SpecialistsTimedOut {
                candidate_id,
                pending,
            } => {
                warn!(candidate = %candidate_id, pending, "Specialist stage timed out");
            }
            ProgressEvent::CandidateComplete {
                candidate_id,
                index,
                total,
                aggregate_confidence,
                duration,
            } => {
                info!(
                    candidate = %candidate_id,
                    progress = format!("{}/{}", index, total),
                    aggregate_confidence,
                    duration_ms = duration.as_millis(),
                    "Candidate analysis complete"
                );
            }
            ProgressEvent::Completed {
                records,
                total_time,
            } => {
                info!(
                    records,
                    total_time_ms = total_time.as_millis(),
                    "Pipeline complete"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Role;
    use std::time::Duration;

    #[test]
    fn test_logging_all_events() {
        let handler = LoggingHandler;

        let events = vec![
            ProgressEvent::Started { candidates: 3 },
            ProgressEvent::TriageComplete {
                candidates: 3,
                selected: 2,
                duplicates: 0,
            },
            ProgressEvent::CandidateStarted {
                candidate_id: "c1".to_string(),
                index: 1,
                total: 2,
            },
            ProgressEvent::RoleComplete {
                candidate_id: "c1".to_string(),
                role: Role::Quality,
                confidence: 0.7,
                from_cache: true,
                placeholder: false,
                duration: Duration::from_millis(3),
            },
            ProgressEvent::RoleComplete {
                candidate_id: "c1".to_string(),
                role: Role::Security,
                confidence: 0.0,
                from_cache: false,
                placeholder: true,
                duration: Duration::from_millis(30),
            },
            ProgressEvent::SpecialistsTimedOut {
                candidate_id: "c1".to_string(),
                pending: 1,
            },
            ProgressEvent::CandidateComplete {
                candidate_id: "c1".to_string(),
                index: 1,
                total: 2,
                aggregate_confidence: 0.4,
                duration: Duration::from_millis(40),
            },
            ProgressEvent::Completed {
                records: 2,
                total_time: Duration::from_secs(1),
            },
        ];

        for event in events {
            handler.on_progress(&event);
        }
    }
}
