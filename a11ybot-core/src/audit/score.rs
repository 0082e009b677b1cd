//! Score calculation: reduces rule-engine violations to a 0–100 score.
//!
//! Penalties accumulate per violation (not per affected node) and the total is
//! clamped at zero, so a large number of violations of any severity drives the
//! score to 0.

use crate::types::{Impact, ImpactCounts, Violation};

/// Score of a page with no violations.
pub const PERFECT_SCORE: u8 = 100;

/// Penalty points for a single violation of the given impact.
pub fn penalty(impact: Impact) -> u32 {
    match impact {
        Impact::Critical => 5,
        Impact::Serious => 3,
        Impact::Moderate => 2,
        Impact::Minor | Impact::Unknown => 1,
    }
}

/// Compute the accessibility score for a set of violations.
pub fn score(violations: &[Violation]) -> u8 {
    let total: u32 = violations.iter().map(|v| penalty(v.impact)).sum();
    u32::from(PERFECT_SCORE).saturating_sub(total) as u8
}

/// Count violations per impact.
pub fn impact_counts(violations: &[Violation]) -> ImpactCounts {
    let mut counts = ImpactCounts::default();
    for v in violations {
        counts.increment(v.impact);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violations(impacts: &[Impact]) -> Vec<Violation> {
        impacts
            .iter()
            .map(|i| Violation::new(*i, format!("{i} rule")))
            .collect()
    }

    #[test]
    fn test_empty_is_perfect() {
        assert_eq!(score(&[]), 100);
    }

    #[test]
    fn test_mixed_penalties() {
        let v = violations(&[Impact::Critical, Impact::Serious, Impact::Minor]);
        assert_eq!(score(&v), 91);
    }

    #[test]
    fn test_unknown_counts_as_one() {
        let v = violations(&[Impact::Unknown, Impact::Unknown]);
        assert_eq!(score(&v), 98);
    }

    #[test]
    fn test_twenty_five_moderate_is_fifty() {
        let v = violations(&[Impact::Moderate; 25]);
        assert_eq!(score(&v), 50);
    }

    #[test]
    fn test_clamped_at_zero() {
        let v = violations(&[Impact::Moderate; 60]);
        assert_eq!(score(&v), 0);
        let v = violations(&[Impact::Critical; 1000]);
        assert_eq!(score(&v), 0);
    }

    #[test]
    fn test_penalty_is_per_violation_not_per_node() {
        let mut v = Violation::new(Impact::Critical, "many nodes");
        v.nodes = (0..40)
            .map(|i| crate::types::ViolationNode {
                selectors: vec![format!("#n{i}")],
                failure_summary: None,
            })
            .collect();
        assert_eq!(score(&[v]), 95);
    }

    #[test]
    fn test_impact_counts_sum_matches() {
        let v = violations(&[
            Impact::Critical,
            Impact::Critical,
            Impact::Moderate,
            Impact::Unknown,
        ]);
        let counts = impact_counts(&v);
        assert_eq!(counts.critical, 2);
        assert_eq!(counts.moderate, 1);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.total(), v.len());
    }
}
