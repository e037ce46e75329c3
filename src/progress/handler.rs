//! Progress handler trait and events

use crate::analysis::Role;
use std::time::Duration;

/// Events emitted while a batch moves through triage and analysis
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Batch received
    Started { candidates: usize },

    /// Admission finished
    TriageComplete {
        candidates: usize,
        selected: usize,
        duplicates: usize,
    },

    /// Analysis of one selected candidate began
    CandidateStarted {
        candidate_id: String,
        index: usize,
        total: usize,
    },

    /// A role reached a terminal result
    RoleComplete {
        candidate_id: String,
        role: Role,
        confidence: f64,
        from_cache: bool,
        placeholder: bool,
        duration: Duration,
    },

    /// The specialist stage hit the pipeline deadline
    SpecialistsTimedOut {
        candidate_id: String,
        pending: usize,
    },

    /// Analysis of one candidate finished
    CandidateComplete {
        candidate_id: String,
        index: usize,
        total: usize,
        aggregate_confidence: f64,
        duration: Duration,
    },

    /// Every selected candidate has a record
    Completed { records: usize, total_time: Duration },
}

/// Trait for handling progress events during a pipeline run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
