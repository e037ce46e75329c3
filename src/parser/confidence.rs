use crate::analysis::FieldPresence;

pub const REQUIRED_WEIGHT: f64 = 0.4;
pub const OPTIONAL_WEIGHT: f64 = 0.6;
pub const NON_EMPTY_LIST_BONUS: f64 = 0.05;

/// Confidence in [0, 1] from how much of the role schema a result populates.
///
/// Every term is non-decreasing in the number of populated fields, so adding a
/// field can never lower the score.
pub fn score(presence: &FieldPresence) -> f64 {
    let required = fraction(presence.required_present, presence.required_total);
    let optional = fraction(presence.optional_present, presence.optional_total);
    let bonus = NON_EMPTY_LIST_BONUS * presence.non_empty_lists as f64;

    (REQUIRED_WEIGHT * required + OPTIONAL_WEIGHT * optional + bonus).clamp(0.0, 1.0)
}

fn fraction(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        present as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(rp: usize, rt: usize, op: usize, ot: usize, lists: usize) -> FieldPresence {
        FieldPresence {
            required_present: rp,
            required_total: rt,
            optional_present: op,
            optional_total: ot,
            non_empty_lists: lists,
        }
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(score(&presence(0, 2, 0, 3, 0)), 0.0);
        assert_eq!(score(&FieldPresence::default()), 0.0);
    }

    #[test]
    fn test_required_only() {
        assert!((score(&presence(2, 2, 0, 3, 0)) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_full_with_lists_is_clamped() {
        assert_eq!(score(&presence(2, 2, 3, 3, 3)), 1.0);
    }

    #[test]
    fn test_monotonic_in_populated_fields() {
        let mut previous = 0.0;
        for step in 0usize..=5 {
            let rp = step.min(2);
            let op = step.saturating_sub(2);
            let s = score(&presence(rp, 2, op, 3, op));
            assert!(s >= previous, "step {} dropped from {} to {}", step, previous, s);
            assert!((0.0..=1.0).contains(&s));
            previous = s;
        }
    }
}
