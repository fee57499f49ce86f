//! Health scoring
//!
//! Two families of scores are kept side by side and persisted
//! independently so they can diverge visibly:
//!
//! # Progress scores (finding-weighted)
//!
//! ```text
//! weight(finding) = tier (T1=1 .. T4=4)
//! lenient = Σ weight(status != open)                        / Σ weight × 100
//! strict  = Σ weight(status ∈ {fixed, auto_resolved, fp})   / Σ weight × 100
//! ```
//!
//! Wontfix counts as addressed for the lenient score only.
//!
//! # Objective scores (potential-weighted)
//!
//! Each detector has a potential: an estimate of how many issues it could
//! report at most. A dimension scores
//!
//! ```text
//! Σ max(potential - Σ confidence_weight(failing), 0) / Σ potential × 100
//! ```
//!
//! and the objective score is the tier-weighted mean of dimension scores.
//! Under-reporting detectors therefore cannot inflate the objective score
//! the way they inflate the progress score.

mod dimensions;

pub use dimensions::{
    compute_dimension_scores, dimension_for, merge_potentials, scoring_detector, DetectorScore,
    Dimension, DimensionScore, DIMENSIONS,
};

use crate::models::{Finding, Status};
use std::collections::BTreeMap;

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Tier-weighted (lenient, strict) progress. An empty ledger scores 100.
pub fn weighted_progress<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> (f64, f64) {
    let (mut total, mut addressed, mut resolved) = (0u64, 0u64, 0u64);
    for f in findings {
        let w = u64::from(f.tier.weight());
        total += w;
        if f.status.is_addressed() {
            addressed += w;
        }
        if f.status.is_resolved() {
            resolved += w;
        }
    }
    if total == 0 {
        return (100.0, 100.0);
    }
    (
        round1(addressed as f64 / total as f64 * 100.0),
        round1(resolved as f64 / total as f64 * 100.0),
    )
}

fn weighted_mean(dims: &BTreeMap<String, DimensionScore>, pick: fn(&DimensionScore) -> f64) -> Option<f64> {
    let total: u32 = dims.values().map(|d| d.tier.weight()).sum();
    if total == 0 {
        return None;
    }
    let sum: f64 = dims
        .values()
        .map(|d| pick(d) * f64::from(d.tier.weight()))
        .sum();
    Some(round1(sum / f64::from(total)))
}

/// Tier-weighted mean of dimension scores as (objective, objective_strict).
/// `None` when no dimension could be scored.
pub fn objective_scores(dims: &BTreeMap<String, DimensionScore>) -> (Option<f64>, Option<f64>) {
    (
        weighted_mean(dims, |d| d.score),
        weighted_mean(dims, |d| d.strict),
    )
}

/// Estimated objective-score gain from resolving `n` open findings of
/// `detector`.
///
/// Each resolved finding removes the detector's mean failure weight. The
/// gain never decreases as `n` grows and never exceeds the dimension's
/// weighted share of the objective score.
pub fn compute_score_impact(
    dims: &BTreeMap<String, DimensionScore>,
    detector: &str,
    n: usize,
) -> f64 {
    let detector = scoring_detector(detector);
    let Some(dimension) = dimension_for(detector) else {
        return 0.0;
    };
    let Some(dim) = dims.get(dimension.name) else {
        return 0.0;
    };
    let Some(det) = dim.detectors.get(detector) else {
        return 0.0;
    };
    if det.issues == 0 || n == 0 || dim.checks == 0 {
        return 0.0;
    }

    let resolved = n.min(det.issues) as f64;
    let mean_weight = det.weighted_failures / det.issues as f64;
    let remaining = (det.weighted_failures - resolved * mean_weight).max(0.0);
    let new_pass = (det.potential as f64 - remaining).max(0.0);

    let dim_pass: f64 = dim.detectors.values().map(|d| d.pass).sum();
    let checks = dim.checks as f64;
    let old_score = dim_pass / checks * 100.0;
    let new_score = (dim_pass - det.pass + new_pass) / checks * 100.0;

    let total_weight: u32 = dims.values().map(|d| d.tier.weight()).sum();
    if total_weight == 0 {
        return 0.0;
    }
    let share = f64::from(dim.tier.weight()) / f64::from(total_weight);
    ((new_score - old_score) * share).max(0.0)
}

/// Open findings per detector, for status displays
pub fn open_by_detector<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    for f in findings {
        if f.status == Status::Open {
            *out.entry(f.detector.clone()).or_default() += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Tier};

    fn finding(id: &str, tier: Tier, status: Status) -> Finding {
        let mut f = Finding::new("unused", id, "", tier, Confidence::High, "x");
        f.status = status;
        f
    }

    #[test]
    fn test_empty_scores_100() {
        assert_eq!(weighted_progress(std::iter::empty()), (100.0, 100.0));
    }

    #[test]
    fn test_all_open_scores_zero() {
        let findings = [
            finding("a", Tier::T1, Status::Open),
            finding("b", Tier::T2, Status::Open),
            finding("c", Tier::T4, Status::Open),
        ];
        assert_eq!(weighted_progress(&findings), (0.0, 0.0));
    }

    #[test]
    fn test_wontfix_lenient_only() {
        let findings = [
            finding("a", Tier::T1, Status::Wontfix),
            finding("b", Tier::T3, Status::Fixed),
        ];
        // lenient 4/4, strict 3/4
        assert_eq!(weighted_progress(&findings), (100.0, 75.0));
    }

    #[test]
    fn test_tier_monotonicity() {
        let fixed = finding("a", Tier::T2, Status::Fixed);
        let low = [fixed.clone(), finding("b", Tier::T1, Status::Open)];
        let high = [fixed, finding("b", Tier::T3, Status::Open)];
        let (low_l, low_s) = weighted_progress(&low);
        let (high_l, high_s) = weighted_progress(&high);
        assert!(high_l < low_l);
        assert!(high_s < low_s);
    }

    fn dims_with_open(n: usize) -> BTreeMap<String, DimensionScore> {
        let findings: Vec<Finding> = (0..n)
            .map(|i| {
                let mut f = Finding::new("cycles", &format!("{i}.py"), "", Tier::T3, Confidence::High, "x");
                f.status = Status::Open;
                f
            })
            .chain((0..3).map(|i| {
                Finding::new("logs", &format!("l{i}.py"), "", Tier::T1, Confidence::High, "x")
            }))
            .collect();
        let potentials: BTreeMap<String, u64> =
            [("cycles".to_string(), 20), ("logs".to_string(), 50)].into_iter().collect();
        compute_dimension_scores(&findings, &potentials)
    }

    #[test]
    fn test_objective_is_tier_weighted() {
        let dims = dims_with_open(10);
        // Dependency health 50 (weight 4), Debug cleanliness 94 (weight 1)
        assert_eq!(dims["Dependency health"].score, 50.0);
        assert_eq!(dims["Debug cleanliness"].score, 94.0);
        let (objective, strict) = objective_scores(&dims);
        assert_eq!(objective, Some(58.8));
        assert_eq!(strict, Some(58.8));
        assert_eq!(objective_scores(&BTreeMap::new()), (None, None));
    }

    #[test]
    fn test_score_impact_monotonic_and_bounded() {
        let dims = dims_with_open(10);
        let share = 4.0 / 5.0;
        let bound = share * (100.0 - dims["Dependency health"].score);
        let mut last = 0.0;
        for n in 0..15 {
            let gain = compute_score_impact(&dims, "cycles", n);
            assert!(gain >= last, "gain dropped at n={n}");
            assert!(gain <= bound + 1e-9);
            last = gain;
        }
        assert!((last - bound).abs() < 1e-9);
        assert_eq!(compute_score_impact(&dims, "unknown", 3), 0.0);
    }
}
