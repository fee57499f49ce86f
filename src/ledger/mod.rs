//! The finding ledger
//!
//! The persisted, authoritative record of every finding ever seen, plus
//! the configuration that shapes later scans (ignore patterns, zone
//! overrides, exclusions) and a bounded scan history.
//!
//! Mutations that take user input validate it first and leave the ledger
//! untouched on error. Every mutation ends with [`Ledger::recompute`] so
//! stats and scores always agree with the findings.

mod history;
mod merge;
mod pattern;
mod persist;

pub use history::{
    push_snapshot, stagnant_dimensions, wontfix_gap_trend, DimensionSnapshot, GapTrend,
    ScanSnapshot, MAX_HISTORY,
};
pub use merge::{ScanDiff, ScanOptions, SkipCounts, SUSPECT_THRESHOLD};
pub use pattern::{FindingPattern, IgnoreSet};
pub use persist::{load, save, LEDGER_VERSION};

use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Finding, Status, Tier};
use crate::scoring::{self, DimensionScore};
use crate::zones::Zone;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub ignore: Vec<String>,
    /// Relative file path -> zone name
    pub zone_overrides: BTreeMap<String, String>,
    /// Path substrings or globs skipped by auto-resolution
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub open: usize,
    pub fixed: usize,
    pub wontfix: usize,
    pub false_positive: usize,
    pub auto_resolved: usize,
}

impl StatusCounts {
    fn add(&mut self, status: Status) {
        match status {
            Status::Open => self.open += 1,
            Status::Fixed => self.fixed += 1,
            Status::Wontfix => self.wontfix += 1,
            Status::FalsePositive => self.false_positive += 1,
            Status::AutoResolved => self.auto_resolved += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.open + self.fixed + self.wontfix + self.false_positive + self.auto_resolved
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerStats {
    pub total: usize,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub by_tier: BTreeMap<u8, StatusCounts>,
}

impl LedgerStats {
    pub fn tally<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Self {
        let mut stats = LedgerStats::default();
        for f in findings {
            stats.counts.add(f.status);
            stats.by_tier.entry(f.tier.number()).or_default().add(f.status);
        }
        stats.total = stats.counts.total();
        stats
    }
}

/// Size of the scanned codebase for one language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodebaseMetrics {
    pub total_files: usize,
    pub total_loc: usize,
    pub total_directories: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub version: u64,
    pub created: DateTime<Utc>,
    pub last_scan: Option<DateTime<Utc>>,
    pub scan_count: u64,
    pub config: LedgerConfig,
    pub score: f64,
    pub strict_score: f64,
    pub stats: LedgerStats,
    pub findings: BTreeMap<String, Finding>,
    pub dimension_scores: BTreeMap<String, DimensionScore>,
    pub objective_score: Option<f64>,
    pub objective_strict: Option<f64>,
    /// Language -> detector -> potential
    pub potentials: BTreeMap<String, BTreeMap<String, u64>>,
    pub codebase_metrics: BTreeMap<String, CodebaseMetrics>,
    pub scan_history: Vec<ScanSnapshot>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            created: Utc::now(),
            last_scan: None,
            scan_count: 0,
            config: LedgerConfig::default(),
            score: 100.0,
            strict_score: 100.0,
            stats: LedgerStats::default(),
            findings: BTreeMap::new(),
            dimension_scores: BTreeMap::new(),
            objective_score: None,
            objective_strict: None,
            potentials: BTreeMap::new(),
            codebase_metrics: BTreeMap::new(),
            scan_history: Vec::new(),
        }
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute stats, progress scores and objective scores from the
    /// findings and stored potentials.
    pub fn recompute(&mut self) {
        self.stats = LedgerStats::tally(self.findings.values());
        let (score, strict) = scoring::weighted_progress(self.findings.values());
        self.score = score;
        self.strict_score = strict;

        let potentials = scoring::merge_potentials(&self.potentials);
        self.dimension_scores = if potentials.is_empty() {
            BTreeMap::new()
        } else {
            scoring::compute_dimension_scores(self.findings.values(), &potentials)
        };
        let (objective, objective_strict) = scoring::objective_scores(&self.dimension_scores);
        self.objective_score = objective;
        self.objective_strict = objective_strict;
    }

    /// Findings matching `pattern`, filtered to `status` unless `None`
    pub fn match_findings(
        &self,
        pattern: &str,
        status: Option<Status>,
    ) -> LedgerResult<Vec<&Finding>> {
        let pattern = FindingPattern::parse(pattern)?;
        Ok(self
            .findings
            .values()
            .filter(|f| status.map_or(true, |s| f.status == s))
            .filter(|f| pattern.matches(f))
            .collect())
    }

    /// Mark every open finding matching `pattern` as `status`.
    /// Returns the affected ids.
    pub fn resolve_findings(
        &mut self,
        pattern: &str,
        status: Status,
        note: Option<&str>,
    ) -> LedgerResult<Vec<String>> {
        if !status.is_manual_resolution() {
            return Err(LedgerError::InvalidResolution(status));
        }
        let ids: Vec<String> = self
            .match_findings(pattern, Some(Status::Open))?
            .into_iter()
            .map(|f| f.id.clone())
            .collect();

        let now = Utc::now();
        for id in &ids {
            if let Some(f) = self.findings.get_mut(id) {
                f.status = status;
                f.note = note.map(str::to_string);
                f.resolved_at = Some(now);
            }
        }
        self.recompute();
        info!("Resolved {} findings as {}", ids.len(), status);
        Ok(ids)
    }

    /// Persist an ignore pattern and drop every finding it matches.
    /// Returns how many findings were removed.
    pub fn add_ignore(&mut self, pattern: &str) -> LedgerResult<usize> {
        let compiled = FindingPattern::parse(pattern)?;
        let raw = compiled.as_str().to_string();
        if !self.config.ignore.contains(&raw) {
            self.config.ignore.push(raw);
        }
        let before = self.findings.len();
        self.findings
            .retain(|id, f| !compiled.ignores(id, &f.file));
        let removed = before - self.findings.len();
        self.recompute();
        info!("Ignore {:?}: removed {} findings", compiled.as_str(), removed);
        Ok(removed)
    }

    pub fn set_zone_override(&mut self, file: &str, zone: &str) -> LedgerResult<()> {
        let zone = Zone::parse(zone)?;
        self.config
            .zone_overrides
            .insert(file.to_string(), zone.as_str().to_string());
        Ok(())
    }

    /// Returns false when no override existed
    pub fn clear_zone_override(&mut self, file: &str) -> bool {
        self.config.zone_overrides.remove(file).is_some()
    }

    /// Open findings in priority order: tier ascending, high confidence
    /// first, larger `detail.count` first, then id.
    pub fn next_items(&self, tier: Option<Tier>, count: usize) -> Vec<&Finding> {
        let mut open: Vec<&Finding> = self
            .findings
            .values()
            .filter(|f| f.status == Status::Open)
            .filter(|f| tier.map_or(true, |t| f.tier == t))
            .collect();
        open.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| a.confidence.cmp(&b.confidence))
                .then_with(|| b.detail_count().cmp(&a.detail_count()))
                .then_with(|| a.id.cmp(&b.id))
        });
        open.truncate(count);
        open
    }

    /// Open findings reopened at least twice
    pub fn chronic_reopeners(&self) -> Vec<&Finding> {
        self.findings
            .values()
            .filter(|f| f.status == Status::Open && f.reopen_count >= 2)
            .collect()
    }
}
