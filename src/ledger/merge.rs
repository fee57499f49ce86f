//! Scan reconciliation
//!
//! Merges one scan's fresh findings into the ledger:
//!
//! 1. drop findings matched by ignore patterns
//! 2. insert new ids, refresh known ones in place, reopen fixed ones
//! 3. flag suspect detectors (had >= 5 open findings, now reported none)
//! 4. auto-resolve findings that disappeared, unless protected
//! 5. recompute stats and scores, append a history snapshot
//!
//! Never fails on inconsistent data: anything ambiguous is skipped and
//! counted in the returned [`ScanDiff`].

use super::history::{push_snapshot, DimensionSnapshot, ScanSnapshot};
use super::pattern::IgnoreSet;
use super::{CodebaseMetrics, Ledger};
use crate::models::{Finding, Status};
use crate::paths::{is_within, normalize_scope};
use crate::scoring::open_by_detector;
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Open findings a detector must have had before an empty result makes it
/// suspect
pub const SUSPECT_THRESHOLD: usize = 5;

/// Language key for potentials and metrics of language-less scans
const ALL_LANGUAGES: &str = "all";

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Language of this scan; findings tagged with another language are
    /// left alone
    pub lang: Option<String>,
    /// Relative path the scan was limited to
    pub scan_path: Option<String>,
    /// Auto-resolve even for detectors that suddenly report nothing
    pub force_resolve: bool,
    /// Path substrings or globs excluded from auto-resolution; persisted
    pub exclude: Vec<String>,
    pub potentials: Option<BTreeMap<String, u64>>,
    pub codebase_metrics: Option<CodebaseMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    /// Disappeared findings of another language
    pub other_lang: usize,
    /// Disappeared findings outside the scan path
    pub out_of_scope: usize,
    /// Disappeared findings under an exclusion
    pub excluded: usize,
    /// Disappeared findings of a suspect detector
    pub suspect: usize,
    /// Fresh findings whose id is owned by another language
    pub lang_collision: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanDiff {
    pub new: usize,
    pub auto_resolved: usize,
    pub reopened: usize,
    /// Fresh findings merged this scan
    pub total_current: usize,
    /// Fresh findings dropped by ignore patterns
    pub ignored: usize,
    pub skipped: SkipCounts,
    pub suspect_detectors: Vec<String>,
    pub chronic_reopeners: Vec<Finding>,
}

enum ExcludeRule {
    Substring(String),
    Glob(GlobMatcher),
}

impl ExcludeRule {
    fn compile(raw: &str) -> Option<ExcludeRule> {
        if raw.is_empty() {
            return None;
        }
        if !raw.contains('*') {
            return Some(ExcludeRule::Substring(raw.to_string()));
        }
        match GlobBuilder::new(raw).literal_separator(false).build() {
            Ok(glob) => Some(ExcludeRule::Glob(glob.compile_matcher())),
            Err(e) => {
                warn!("Ignoring invalid exclude pattern {:?}: {}", raw, e);
                None
            }
        }
    }

    fn matches(&self, file: &str) -> bool {
        match self {
            ExcludeRule::Substring(s) => file.contains(s.as_str()),
            ExcludeRule::Glob(g) => g.is_match(file),
        }
    }
}

impl Ledger {
    /// Merge a fresh scan. See the module docs for the protocol.
    pub fn merge_scan(&mut self, fresh: Vec<Finding>, opts: &ScanOptions) -> ScanDiff {
        let now = Utc::now();
        let lang = opts.lang.as_deref();
        let scope = normalize_scope(opts.scan_path.as_deref());
        let full_scan = scope.is_none();
        let lang_key = lang.unwrap_or(ALL_LANGUAGES).to_string();

        self.last_scan = Some(now);
        self.scan_count += 1;

        // Scoped scans only see part of the codebase
        if full_scan {
            if let Some(potentials) = &opts.potentials {
                self.potentials.insert(lang_key.clone(), potentials.clone());
            }
            if let Some(metrics) = opts.codebase_metrics {
                self.codebase_metrics.insert(lang_key, metrics);
            }
        } else if opts.potentials.is_some() {
            debug!("Scoped scan: potentials not stored");
        }

        for ex in &opts.exclude {
            if !ex.is_empty() && !self.config.exclude.contains(ex) {
                self.config.exclude.push(ex.clone());
            }
        }

        let mut diff = ScanDiff::default();
        let eligible = |f: &Finding| in_lang(f, lang) && in_scope(f, scope.as_deref());
        let prev_open = open_by_detector(self.findings.values().filter(|&f| eligible(f)));

        let (current_ids, fresh_by_detector) = self.upsert(fresh, lang, now, &mut diff);

        diff.suspect_detectors = if opts.force_resolve {
            Vec::new()
        } else {
            prev_open
                .iter()
                .filter(|(det, n)| {
                    **n >= SUSPECT_THRESHOLD
                        && fresh_by_detector.get(det.as_str()).copied().unwrap_or(0) == 0
                })
                .map(|(det, _)| det.clone())
                .collect()
        };
        for det in &diff.suspect_detectors {
            warn!(
                "Detector '{}' had {} open findings and reported none; treating as a failed run, not auto-resolving",
                det,
                prev_open.get(det).copied().unwrap_or(0)
            );
        }

        self.auto_resolve(&current_ids, lang, scope.as_deref(), now, &mut diff);

        self.recompute();
        let snapshot = ScanSnapshot {
            timestamp: now,
            score: self.score,
            strict_score: self.strict_score,
            objective_score: self.objective_score,
            objective_strict: self.objective_strict,
            open: self.stats.counts.open,
            diff_new: diff.new,
            diff_resolved: diff.auto_resolved,
            dimension_scores: self
                .dimension_scores
                .iter()
                .map(|(name, d)| {
                    (
                        name.clone(),
                        DimensionSnapshot {
                            score: d.score,
                            strict: d.strict,
                        },
                    )
                })
                .collect(),
        };
        push_snapshot(&mut self.scan_history, snapshot);

        diff.chronic_reopeners = self.chronic_reopeners().into_iter().cloned().collect();
        diff.total_current = current_ids.len();

        info!(
            "Scan merged: {} new, {} auto-resolved, {} reopened, {} current",
            diff.new, diff.auto_resolved, diff.reopened, diff.total_current
        );
        diff
    }

    fn upsert(
        &mut self,
        fresh: Vec<Finding>,
        lang: Option<&str>,
        now: DateTime<Utc>,
        diff: &mut ScanDiff,
    ) -> (BTreeSet<String>, BTreeMap<String, usize>) {
        let ignore = IgnoreSet::compile(&self.config.ignore);
        let mut current_ids = BTreeSet::new();
        let mut by_detector: BTreeMap<String, usize> = BTreeMap::new();

        for mut f in fresh {
            if ignore.is_ignored(&f.id, &f.file) {
                diff.ignored += 1;
                continue;
            }
            if let Some(lang) = lang {
                f.lang = Some(lang.to_string());
            }

            match self.findings.get_mut(&f.id) {
                Some(old) => {
                    if let (Some(old_lang), Some(new_lang)) = (&old.lang, &f.lang) {
                        if old_lang != new_lang {
                            warn!(
                                "Finding id {} already tracked for {}; skipping {} result",
                                f.id, old_lang, new_lang
                            );
                            diff.skipped.lang_collision += 1;
                            continue;
                        }
                    }
                    old.last_seen = now;
                    old.tier = f.tier;
                    old.confidence = f.confidence;
                    old.summary = f.summary;
                    old.detail = f.detail;
                    if old.lang.is_none() {
                        old.lang = f.lang;
                    }
                    if matches!(old.status, Status::Fixed | Status::AutoResolved) {
                        let prev = old.status;
                        old.reopen_count += 1;
                        old.status = Status::Open;
                        old.resolved_at = None;
                        old.note = Some(format!(
                            "Reopened (x{}): reappeared in scan (was {})",
                            old.reopen_count, prev
                        ));
                        diff.reopened += 1;
                    }
                    current_ids.insert(f.id);
                    *by_detector.entry(f.detector).or_default() += 1;
                }
                None => {
                    f.status = Status::Open;
                    f.first_seen = now;
                    f.last_seen = now;
                    f.resolved_at = None;
                    f.note = None;
                    f.reopen_count = 0;
                    current_ids.insert(f.id.clone());
                    *by_detector.entry(f.detector.clone()).or_default() += 1;
                    self.findings.insert(f.id.clone(), f);
                    diff.new += 1;
                }
            }
        }
        (current_ids, by_detector)
    }

    fn auto_resolve(
        &mut self,
        current_ids: &BTreeSet<String>,
        lang: Option<&str>,
        scope: Option<&str>,
        now: DateTime<Utc>,
        diff: &mut ScanDiff,
    ) {
        let excludes: Vec<ExcludeRule> = self
            .config
            .exclude
            .iter()
            .filter_map(|raw| ExcludeRule::compile(raw))
            .collect();
        let suspect: BTreeSet<&str> = diff.suspect_detectors.iter().map(String::as_str).collect();

        for (id, f) in self.findings.iter_mut() {
            if current_ids.contains(id) || !matches!(f.status, Status::Open | Status::Wontfix) {
                continue;
            }
            if !in_lang(f, lang) {
                diff.skipped.other_lang += 1;
                continue;
            }
            if !in_scope(f, scope) {
                diff.skipped.out_of_scope += 1;
                continue;
            }
            if excludes.iter().any(|ex| ex.matches(&f.file)) {
                diff.skipped.excluded += 1;
                continue;
            }
            if suspect.contains(f.detector.as_str()) {
                diff.skipped.suspect += 1;
                continue;
            }

            f.note = Some(if f.status == Status::Wontfix {
                "Fixed despite wontfix: disappeared from scan (was wontfix)".to_string()
            } else {
                "Disappeared from scan: likely fixed".to_string()
            });
            f.status = Status::AutoResolved;
            f.resolved_at = Some(now);
            diff.auto_resolved += 1;
        }
    }
}

fn in_lang(f: &Finding, lang: Option<&str>) -> bool {
    match (lang, f.lang.as_deref()) {
        (Some(scan), Some(own)) => scan == own,
        _ => true,
    }
}

fn in_scope(f: &Finding, scope: Option<&str>) -> bool {
    scope.map_or(true, |scope| is_within(&f.file, scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Tier};

    fn f(detector: &str, file: &str) -> Finding {
        Finding::new(detector, file, "", Tier::T2, Confidence::High, "x")
    }

    fn opts() -> ScanOptions {
        ScanOptions::default()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut ledger = Ledger::new();
        let scan = vec![f("unused", "a.py"), f("logs", "b.py")];
        let first = ledger.merge_scan(scan.clone(), &opts());
        assert_eq!(first.new, 2);
        let second = ledger.merge_scan(scan, &opts());
        assert_eq!((second.new, second.auto_resolved, second.reopened), (0, 0, 0));
        assert_eq!(second.total_current, 2);
        assert_eq!(ledger.scan_count, 2);
    }

    #[test]
    fn test_refresh_keeps_first_seen() {
        let mut ledger = Ledger::new();
        ledger.merge_scan(vec![f("unused", "a.py")], &opts());
        let first_seen = ledger.findings["unused::a.py"].first_seen;

        let mut changed = f("unused", "a.py");
        changed.tier = Tier::T4;
        changed.summary = "changed".into();
        ledger.merge_scan(vec![changed], &opts());
        let stored = &ledger.findings["unused::a.py"];
        assert_eq!(stored.first_seen, first_seen);
        assert_eq!(stored.tier, Tier::T4);
        assert_eq!(stored.summary, "changed");
    }

    #[test]
    fn test_disappeared_finding_auto_resolves() {
        let mut ledger = Ledger::new();
        ledger.merge_scan(vec![f("unused", "a.py"), f("unused", "b.py")], &opts());
        let diff = ledger.merge_scan(vec![f("unused", "a.py")], &opts());
        assert_eq!(diff.auto_resolved, 1);
        let gone = &ledger.findings["unused::b.py"];
        assert_eq!(gone.status, Status::AutoResolved);
        assert_eq!(gone.note.as_deref(), Some("Disappeared from scan: likely fixed"));
        assert!(gone.resolved_at.is_some());
    }

    #[test]
    fn test_wontfix_disappearing_is_flagged() {
        let mut ledger = Ledger::new();
        ledger.merge_scan(vec![f("unused", "a.py"), f("unused", "b.py")], &opts());
        ledger
            .resolve_findings("unused::a.py", Status::Wontfix, Some("legacy"))
            .unwrap();
        ledger.merge_scan(vec![f("unused", "b.py")], &opts());
        let f = &ledger.findings["unused::a.py"];
        assert_eq!(f.status, Status::AutoResolved);
        assert!(f.note.as_deref().unwrap_or("").contains("despite wontfix"));
    }

    #[test]
    fn test_false_positive_is_not_reopened() {
        let mut ledger = Ledger::new();
        ledger.merge_scan(vec![f("unused", "a.py")], &opts());
        ledger
            .resolve_findings("unused", Status::FalsePositive, None)
            .unwrap();
        let diff = ledger.merge_scan(vec![f("unused", "a.py")], &opts());
        assert_eq!(diff.reopened, 0);
        assert_eq!(ledger.findings["unused::a.py"].status, Status::FalsePositive);
    }

    #[test]
    fn test_suspect_detector_protection() {
        let mut ledger = Ledger::new();
        let five: Vec<Finding> = (0..5).map(|i| f("unused", &format!("{i}.py"))).collect();
        ledger.merge_scan(five.clone(), &opts());

        let diff = ledger.merge_scan(Vec::new(), &opts());
        assert_eq!(diff.suspect_detectors, vec!["unused"]);
        assert_eq!(diff.auto_resolved, 0);
        assert_eq!(diff.skipped.suspect, 5);
        assert_eq!(ledger.stats.counts.open, 5);

        let forced = ledger.merge_scan(
            Vec::new(),
            &ScanOptions {
                force_resolve: true,
                ..opts()
            },
        );
        assert!(forced.suspect_detectors.is_empty());
        assert_eq!(forced.auto_resolved, 5);
    }

    #[test]
    fn test_four_findings_are_not_enough_for_suspicion() {
        let mut ledger = Ledger::new();
        let four: Vec<Finding> = (0..4).map(|i| f("unused", &format!("{i}.py"))).collect();
        ledger.merge_scan(four, &opts());
        let diff = ledger.merge_scan(Vec::new(), &opts());
        assert!(diff.suspect_detectors.is_empty());
        assert_eq!(diff.auto_resolved, 4);
    }

    #[test]
    fn test_scope_language_and_exclusions() {
        let mut ledger = Ledger::new();
        let py = |file: &str| f("unused", file).with_lang("python");
        ledger.merge_scan(
            vec![py("src/a.py"), py("lib/b.py"), py("gen/c.py")],
            &ScanOptions {
                lang: Some("python".into()),
                ..opts()
            },
        );

        // A typescript scan never resolves python findings
        let ts = ledger.merge_scan(
            Vec::new(),
            &ScanOptions {
                lang: Some("typescript".into()),
                ..opts()
            },
        );
        assert_eq!(ts.skipped.other_lang, 3);
        assert_eq!(ts.auto_resolved, 0);

        let scoped = ledger.merge_scan(
            Vec::new(),
            &ScanOptions {
                lang: Some("python".into()),
                scan_path: Some("./src/".into()),
                exclude: vec!["gen/".into()],
                ..opts()
            },
        );
        assert_eq!(scoped.auto_resolved, 1);
        assert_eq!(scoped.skipped.out_of_scope, 2);
        assert_eq!(ledger.findings["unused::src/a.py"].status, Status::AutoResolved);
        assert_eq!(ledger.config.exclude, vec!["gen/"]);

        // Persisted exclusion still applies on the next full scan
        let full = ledger.merge_scan(
            Vec::new(),
            &ScanOptions {
                lang: Some("python".into()),
                ..opts()
            },
        );
        assert_eq!(full.skipped.excluded, 1);
        assert_eq!(full.auto_resolved, 1);
        assert_eq!(ledger.findings["unused::gen/c.py"].status, Status::Open);
    }

    #[test]
    fn test_language_collision_is_skipped() {
        let mut ledger = Ledger::new();
        ledger.merge_scan(
            vec![f("dupes", "shared/x")],
            &ScanOptions {
                lang: Some("python".into()),
                ..opts()
            },
        );
        let diff = ledger.merge_scan(
            vec![f("dupes", "shared/x")],
            &ScanOptions {
                lang: Some("typescript".into()),
                ..opts()
            },
        );
        assert_eq!(diff.skipped.lang_collision, 1);
        assert_eq!(diff.new, 0);
        assert_eq!(ledger.findings["dupes::shared/x"].lang.as_deref(), Some("python"));
    }

    #[test]
    fn test_ignored_findings_never_inserted() {
        let mut ledger = Ledger::new();
        ledger.add_ignore("logs::*").unwrap();
        let diff = ledger.merge_scan(vec![f("logs", "a.py"), f("unused", "a.py")], &opts());
        assert_eq!(diff.ignored, 1);
        assert_eq!(diff.new, 1);
        assert!(!ledger.findings.contains_key("logs::a.py"));
    }

    #[test]
    fn test_potentials_only_on_full_scans() {
        let mut ledger = Ledger::new();
        let potentials: BTreeMap<String, u64> = [("unused".to_string(), 40)].into_iter().collect();
        ledger.merge_scan(
            vec![f("unused", "src/a.py")],
            &ScanOptions {
                scan_path: Some("src".into()),
                potentials: Some(potentials.clone()),
                ..opts()
            },
        );
        assert!(ledger.potentials.is_empty());
        assert!(ledger.objective_score.is_none());

        ledger.merge_scan(
            vec![f("unused", "src/a.py")],
            &ScanOptions {
                potentials: Some(potentials),
                ..opts()
            },
        );
        assert_eq!(ledger.potentials["all"]["unused"], 40);
        assert_eq!(ledger.dimension_scores["Import hygiene"].score, 97.5);
        assert_eq!(ledger.objective_score, Some(97.5));
    }

    #[test]
    fn test_history_snapshot_appended() {
        let mut ledger = Ledger::new();
        for _ in 0..25 {
            ledger.merge_scan(vec![f("unused", "a.py")], &opts());
        }
        assert_eq!(ledger.scan_history.len(), 20);
        assert_eq!(ledger.scan_history[0].diff_new, 0);
        assert_eq!(ledger.scan_history[19].open, 1);
    }
}
