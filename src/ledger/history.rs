//! Bounded scan history and trend helpers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshots kept in the ledger
pub const MAX_HISTORY: usize = 20;

/// Strict-score movement at or below this is treated as no movement
const STAGNANT_DELTA: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionSnapshot {
    pub score: f64,
    pub strict: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSnapshot {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub strict_score: f64,
    pub objective_score: Option<f64>,
    pub objective_strict: Option<f64>,
    pub open: usize,
    pub diff_new: usize,
    pub diff_resolved: usize,
    pub dimension_scores: BTreeMap<String, DimensionSnapshot>,
}

/// Append and keep only the newest [`MAX_HISTORY`] entries
pub fn push_snapshot(history: &mut Vec<ScanSnapshot>, snapshot: ScanSnapshot) {
    history.push(snapshot);
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}

/// Dimensions whose strict score has not moved over the last 3-5 scans.
/// Only dimensions present in every one of those snapshots are considered.
pub fn stagnant_dimensions(history: &[ScanSnapshot]) -> Vec<String> {
    if history.len() < 3 {
        return Vec::new();
    }
    let window = &history[history.len().saturating_sub(5)..];
    let Some(last) = window.last() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for name in last.dimension_scores.keys() {
        let values: Option<Vec<f64>> = window
            .iter()
            .map(|s| s.dimension_scores.get(name).map(|d| d.strict))
            .collect();
        let Some(values) = values else {
            continue;
        };
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min);
        if max - min <= STAGNANT_DELTA {
            out.push(name.clone());
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GapTrend {
    Growing,
    Shrinking,
    Stable,
}

/// Direction of the gap between objective and objective-strict scores,
/// i.e. how much of the score rests on wontfix decisions.
pub fn wontfix_gap_trend(history: &[ScanSnapshot]) -> Option<GapTrend> {
    let gaps: Vec<f64> = history
        .iter()
        .rev()
        .take(5)
        .filter_map(|s| Some(s.objective_score? - s.objective_strict?))
        .collect();
    if gaps.len() < 2 {
        return None;
    }
    // newest first
    let delta = gaps[0] - gaps[gaps.len() - 1];
    Some(if delta > STAGNANT_DELTA {
        GapTrend::Growing
    } else if delta < -STAGNANT_DELTA {
        GapTrend::Shrinking
    } else {
        GapTrend::Stable
    })
}
