//! Scoring dimensions and potential-based dimension scores

use crate::models::{Finding, Status, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named group of detectors scored together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub name: &'static str,
    pub tier: Tier,
    pub detectors: &'static [&'static str],
}

pub const DIMENSIONS: &[Dimension] = &[
    Dimension {
        name: "Import hygiene",
        tier: Tier::T1,
        detectors: &["unused"],
    },
    Dimension {
        name: "Debug cleanliness",
        tier: Tier::T1,
        detectors: &["logs"],
    },
    Dimension {
        name: "API surface",
        tier: Tier::T2,
        detectors: &["exports", "deprecated"],
    },
    Dimension {
        name: "File health",
        tier: Tier::T3,
        detectors: &["structural"],
    },
    Dimension {
        name: "Component design",
        tier: Tier::T3,
        detectors: &["props"],
    },
    Dimension {
        name: "Coupling",
        tier: Tier::T3,
        detectors: &["single_use", "coupling"],
    },
    Dimension {
        name: "Organization",
        tier: Tier::T3,
        detectors: &["orphaned", "flat_dirs", "naming", "facade"],
    },
    Dimension {
        name: "Code quality",
        tier: Tier::T3,
        detectors: &["smells", "react", "dict_keys"],
    },
    Dimension {
        name: "Duplication",
        tier: Tier::T3,
        detectors: &["dupes"],
    },
    Dimension {
        name: "Dependency health",
        tier: Tier::T4,
        detectors: &["cycles"],
    },
];

/// Structural signal detectors are scored as `structural`
pub fn scoring_detector(detector: &str) -> &str {
    match detector {
        "large" | "complexity" | "gods" | "concerns" => "structural",
        other => other,
    }
}

pub fn dimension_for(detector: &str) -> Option<&'static Dimension> {
    let detector = scoring_detector(detector);
    DIMENSIONS.iter().find(|d| d.detectors.contains(&detector))
}

/// Per-detector breakdown inside a dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorScore {
    pub potential: u64,
    /// Open findings
    pub issues: usize,
    /// Open and wontfix findings
    pub strict_issues: usize,
    pub weighted_failures: f64,
    pub strict_weighted_failures: f64,
    pub pass: f64,
    pub strict_pass: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionScore {
    pub score: f64,
    pub strict: f64,
    /// Sum of detector potentials
    pub checks: u64,
    pub issues: usize,
    pub tier: Tier,
    pub detectors: BTreeMap<String, DetectorScore>,
}

/// Sum per-language potentials into one map keyed by scoring detector
pub fn merge_potentials(
    by_lang: &BTreeMap<String, BTreeMap<String, u64>>,
) -> BTreeMap<String, u64> {
    let mut merged: BTreeMap<String, u64> = BTreeMap::new();
    for potentials in by_lang.values() {
        for (detector, &n) in potentials {
            *merged
                .entry(scoring_detector(detector).to_string())
                .or_default() += n;
        }
    }
    merged.retain(|_, n| *n > 0);
    merged
}

#[derive(Default)]
struct Failures {
    issues: usize,
    strict_issues: usize,
    weighted: f64,
    strict_weighted: f64,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Score every dimension that has at least one detector with a positive
/// potential. A detector's pass count is its potential minus its
/// confidence-weighted failures, floored at zero.
pub fn compute_dimension_scores<'a>(
    findings: impl IntoIterator<Item = &'a Finding>,
    potentials: &BTreeMap<String, u64>,
) -> BTreeMap<String, DimensionScore> {
    let mut failures: BTreeMap<&str, Failures> = BTreeMap::new();
    for f in findings {
        let lenient = f.status == Status::Open;
        let strict = matches!(f.status, Status::Open | Status::Wontfix);
        if !strict {
            continue;
        }
        let w = f.confidence.weight();
        let entry = failures.entry(scoring_detector(&f.detector)).or_default();
        if lenient {
            entry.issues += 1;
            entry.weighted += w;
        }
        entry.strict_issues += 1;
        entry.strict_weighted += w;
    }

    let mut out = BTreeMap::new();
    for dim in DIMENSIONS {
        let mut score = DimensionScore {
            tier: dim.tier,
            ..Default::default()
        };
        let (mut pass, mut strict_pass) = (0.0, 0.0);
        for &detector in dim.detectors {
            let potential = potentials.get(detector).copied().unwrap_or(0);
            if potential == 0 {
                continue;
            }
            let fail = failures.get(detector);
            let weighted = fail.map_or(0.0, |f| f.weighted);
            let strict_weighted = fail.map_or(0.0, |f| f.strict_weighted);
            let det = DetectorScore {
                potential,
                issues: fail.map_or(0, |f| f.issues),
                strict_issues: fail.map_or(0, |f| f.strict_issues),
                weighted_failures: weighted,
                strict_weighted_failures: strict_weighted,
                pass: (potential as f64 - weighted).max(0.0),
                strict_pass: (potential as f64 - strict_weighted).max(0.0),
            };
            pass += det.pass;
            strict_pass += det.strict_pass;
            score.checks += potential;
            score.issues += det.issues;
            score.detectors.insert(detector.to_string(), det);
        }
        if score.checks == 0 {
            continue;
        }
        score.score = round1(pass / score.checks as f64 * 100.0);
        score.strict = round1(strict_pass / score.checks as f64 * 100.0);
        out.insert(dim.name.to_string(), score);
    }
    out
}
