//! Admission: rank candidates, collapse duplicates, keep the top fraction
//!
//! Selection is a pure function of its input. Nothing here touches the clock,
//! the network or the cache.

pub mod candidate;
pub mod priority;

pub use candidate::{CandidateRecord, Dependency, StructuralFlags};
pub use priority::{PriorityPolicy, PriorityScore};

use crate::similarity::{DuplicateEdge, DuplicateGroup, SimilarityEngine, SimilarityWeights};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Slack for float error in `top_fraction × n` before rounding up
const CUTOFF_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    /// 1-based position among surviving candidates
    pub rank: usize,
    pub candidate: CandidateRecord,
    pub priority: PriorityScore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Collapsed into the representative of its duplicate group
    Duplicate { of: String },
    /// Survived deduplication but ranked past the cutoff
    BelowCutoff { rank: usize },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Duplicate { of } => write!(f, "duplicate of {}", of),
            RejectionReason::BelowCutoff { rank } => write!(f, "below cutoff (rank {})", rank),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub candidate_id: String,
    pub priority: f64,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageOutcome {
    /// Chosen candidates, best first
    pub selected: Vec<Selection>,
    pub rejected: Vec<Rejection>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub edges: Vec<DuplicateEdge>,
}

impl TriageOutcome {
    pub fn selected_ids(&self) -> Vec<&str> {
        self.selected
            .iter()
            .map(|s| s.candidate.id.as_str())
            .collect()
    }

    pub fn rejection(&self, id: &str) -> Option<&Rejection> {
        self.rejected.iter().find(|r| r.candidate_id == id)
    }
}

#[derive(Debug, Clone)]
pub struct Admission {
    policy: PriorityPolicy,
    engine: SimilarityEngine,
}

impl Default for Admission {
    fn default() -> Self {
        Self::new(
            PriorityPolicy::default(),
            SimilarityEngine::new(SimilarityWeights::default(), 0.8),
        )
    }
}

/// Representative order: higher priority, then higher cheap score, then smaller id
fn representative_order(
    a: (&CandidateRecord, &PriorityScore),
    b: (&CandidateRecord, &PriorityScore),
) -> Ordering {
    b.1.total
        .total_cmp(&a.1.total)
        .then_with(|| b.0.cheap_score.total_cmp(&a.0.cheap_score))
        .then_with(|| a.0.id.cmp(&b.0.id))
}

impl Admission {
    pub fn new(policy: PriorityPolicy, engine: SimilarityEngine) -> Self {
        Self { policy, engine }
    }

    /// Picks `ceil(top_fraction × survivors)` candidates.
    ///
    /// `top_fraction` is clamped to [0, 1].
    pub fn select(&self, candidates: &[CandidateRecord], top_fraction: f64) -> TriageOutcome {
        let top_fraction = if top_fraction.is_nan() {
            0.0
        } else {
            top_fraction.clamp(0.0, 1.0)
        };

        let scores = self.policy.score_all(candidates);
        let (components, edges) = self.engine.components(candidates);

        let mut rejected = Vec::new();
        let mut duplicate_of: HashMap<usize, usize> = HashMap::new();
        let mut duplicate_groups = Vec::new();

        for members in &components {
            let Some(&winner) = members.iter().min_by(|&&a, &&b| {
                representative_order((&candidates[a], &scores[a]), (&candidates[b], &scores[b]))
            }) else {
                continue;
            };

            for &member in members {
                if member != winner {
                    duplicate_of.insert(member, winner);
                }
            }

            let mut ids: Vec<String> = members.iter().map(|&i| candidates[i].id.clone()).collect();
            ids.sort();
            duplicate_groups.push(DuplicateGroup {
                representative: candidates[winner].id.clone(),
                members: ids,
            });
        }

        let mut survivors: Vec<usize> = Vec::with_capacity(candidates.len());
        for idx in 0..candidates.len() {
            match duplicate_of.get(&idx) {
                Some(&winner) => rejected.push(Rejection {
                    candidate_id: candidates[idx].id.clone(),
                    priority: scores[idx].total,
                    reason: RejectionReason::Duplicate {
                        of: candidates[winner].id.clone(),
                    },
                }),
                None => survivors.push(idx),
            }
        }

        survivors.sort_by(|&a, &b| {
            scores[b]
                .total
                .total_cmp(&scores[a].total)
                .then_with(|| candidates[a].id.cmp(&candidates[b].id))
        });

        let cutoff = ((top_fraction * survivors.len() as f64) - CUTOFF_EPSILON)
            .ceil()
            .max(0.0) as usize;
        let cutoff = cutoff.min(survivors.len());

        let mut selected = Vec::with_capacity(cutoff);
        for (position, &idx) in survivors.iter().enumerate() {
            let rank = position + 1;
            if position < cutoff {
                selected.push(Selection {
                    rank,
                    candidate: candidates[idx].clone(),
                    priority: scores[idx].clone(),
                });
            } else {
                rejected.push(Rejection {
                    candidate_id: candidates[idx].id.clone(),
                    priority: scores[idx].total,
                    reason: RejectionReason::BelowCutoff { rank },
                });
            }
        }

        debug!(
            edges = edges.len(),
            groups = duplicate_groups.len(),
            "Duplicate detection finished"
        );
        info!(
            candidates = candidates.len(),
            survivors = survivors.len(),
            selected = selected.len(),
            top_fraction,
            "Admission complete"
        );

        TriageOutcome {
            selected,
            rejected,
            duplicate_groups,
            edges,
        }
    }
}

/// Admission with default policy and similarity settings
pub fn select(candidates: &[CandidateRecord], top_fraction: f64) -> TriageOutcome {
    Admission::default().select(candidates, top_fraction)
}
