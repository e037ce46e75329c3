use super::candidate::CandidateRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunables for the admission ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityPolicy {
    /// Multiplier on the upstream heuristic score
    pub cheap_weight: f64,
    /// Bonus for a candidate modified at the same time as the newest one
    pub recency_weight: f64,
    /// Age (relative to the newest candidate) at which the recency bonus halves
    pub recency_half_life_days: f64,
    /// Bonus for a candidate with every structural flag set
    pub completeness_weight: f64,
    /// Bonus for a candidate whose primary language nobody else shares
    pub diversity_weight: f64,
    /// Symmetric cap on the summed bonuses
    pub max_bonus: f64,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            cheap_weight: 1.0,
            recency_weight: 1.0,
            recency_half_life_days: 90.0,
            completeness_weight: 1.0,
            diversity_weight: 0.5,
            max_bonus: 2.0,
        }
    }
}

/// Ranking score for one candidate in one admission pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityScore {
    pub candidate_id: String,
    pub base: f64,
    pub recency_bonus: f64,
    pub completeness_bonus: f64,
    pub diversity_bonus: f64,
    /// Sum of bonuses after capping
    pub bonus: f64,
    pub total: f64,
}

impl PriorityPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_bonus >= 0.0) {
            return Err(format!("max_bonus {} must be a non-negative number", self.max_bonus));
        }
        if !(self.recency_half_life_days > 0.0) {
            return Err(format!(
                "recency_half_life_days {} must be positive",
                self.recency_half_life_days
            ));
        }
        Ok(())
    }

    /// Scores every candidate, in input order.
    ///
    /// Recency is measured against the newest `last_modified` in the set, so
    /// the result depends only on the input, never on the wall clock.
    pub fn score_all(&self, candidates: &[CandidateRecord]) -> Vec<PriorityScore> {
        let newest = candidates.iter().filter_map(|c| c.last_modified).max();

        let mut language_counts: HashMap<&str, usize> = HashMap::new();
        for c in candidates {
            if let Some(lang) = c.primary_language.as_deref() {
                *language_counts.entry(lang).or_default() += 1;
            }
        }

        candidates
            .iter()
            .map(|c| self.score(c, newest, &language_counts))
            .collect()
    }

    fn score(
        &self,
        candidate: &CandidateRecord,
        newest: Option<DateTime<Utc>>,
        language_counts: &HashMap<&str, usize>,
    ) -> PriorityScore {
        let base = self.cheap_weight * candidate.cheap_score;

        let recency_bonus = match (candidate.last_modified, newest) {
            (Some(at), Some(newest)) => {
                let age_days = (newest - at).num_seconds().max(0) as f64 / 86_400.0;
                self.recency_weight * 0.5f64.powf(age_days / self.recency_half_life_days)
            }
            _ => 0.0,
        };

        let completeness_bonus = self.completeness_weight * candidate.flags.completeness();

        let diversity_bonus = candidate
            .primary_language
            .as_deref()
            .and_then(|lang| language_counts.get(lang))
            .map(|count| self.diversity_weight / *count as f64)
            .unwrap_or(0.0);

        // NaN and negative caps collapse to zero; scoring must not panic on
        // a policy that skipped validation
        let cap = self.max_bonus.max(0.0);
        let bonus = (recency_bonus + completeness_bonus + diversity_bonus).clamp(-cap, cap);

        PriorityScore {
            candidate_id: candidate.id.clone(),
            base,
            recency_bonus,
            completeness_bonus,
            diversity_bonus,
            bonus,
            total: base + bonus,
        }
    }
}
