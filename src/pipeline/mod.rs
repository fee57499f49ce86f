//! Scan pipeline
//!
//! Runs one scan end to end:
//! 1. Build the import graph through the language plugin
//! 2. Run the graph analyses
//! 3. Normalize graph entries and raw detector records into findings
//! 4. Derive potentials and codebase metrics
//! 5. Merge into the ledger (reconcile, score, snapshot history)
//! 6. Save the ledger

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{auto_detect_lang, ProjectConfig};
use crate::graph::{self, DepGraph, GraphPolicy};
use crate::ledger::{self, CodebaseMetrics, Ledger, ScanDiff, ScanOptions};
use crate::normalize::{self, NormalizeContext, RawRecord};
use crate::paths::{self, normalize_scope, path_to_string};
use crate::plugins::{LanguagePlugin, PluginRegistry};
use crate::zones::{common_zone_rules, ZoneMap};

/// Detectors whose findings come from the import graph. Each file in the
/// graph is one opportunity to fail them.
pub const GRAPH_DETECTORS: &[&str] = &["cycles", "orphaned", "single_use", "coupling"];

/// Output of the external detectors for one scan:
///
/// ```json
/// {"records": [{"detector": "unused", "file": "/repo/a.py", "name": "os", "category": "imports"}],
///  "potentials": {"unused": 120},
///  "dynamic_imports": ["app.plugins.csv"]}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectorInput {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Detector -> number of checks it ran
    #[serde(default)]
    pub potentials: BTreeMap<String, u64>,
    /// Module specifiers that are only imported dynamically
    #[serde(default)]
    pub dynamic_imports: BTreeSet<String>,
}

impl DetectorInput {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading detector output {}", path.display()))?;
        let input = serde_json::from_str(&content)
            .with_context(|| format!("parsing detector output {}", path.display()))?;
        Ok(input)
    }
}

/// One scan of one repository
pub struct Pipeline<'a> {
    root: PathBuf,
    config: &'a ProjectConfig,
    registry: &'a PluginRegistry,
    lang: Option<String>,
    scan_path: Option<String>,
    force_resolve: bool,
    input: DetectorInput,
    state_path: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(root: &Path, config: &'a ProjectConfig, registry: &'a PluginRegistry) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            registry,
            lang: None,
            scan_path: None,
            force_resolve: false,
            input: DetectorInput::default(),
            state_path: None,
        }
    }

    /// Use this language instead of auto-detecting one
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Limit the scan to a relative path
    pub fn scoped(mut self, scan_path: impl Into<String>) -> Self {
        self.scan_path = Some(scan_path.into());
        self
    }

    /// Auto-resolve even for detectors that suddenly report nothing
    pub fn force_resolve(mut self, force: bool) -> Self {
        self.force_resolve = force;
        self
    }

    pub fn with_input(mut self, input: DetectorInput) -> Self {
        self.input = input;
        self
    }

    /// Ledger location, overriding the configured one
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| self.config.state_path(&self.root))
    }

    /// Run the scan and save the ledger
    pub fn run(self) -> Result<ScanStats> {
        let state_path = self.state_path();
        let lang = match &self.lang {
            Some(lang) => Some(lang.clone()),
            None => auto_detect_lang(&self.root, self.config),
        };
        let plugin = lang
            .as_deref()
            .map(|name| self.registry.get(name))
            .transpose()?;
        match &plugin {
            Some(p) => info!("Scanning {} as {}", self.root.display(), p.name()),
            None => info!("Scanning {} (no language detected, detector records only)", self.root.display()),
        }

        let mut ledger = ledger::load(&state_path)
            .with_context(|| format!("loading ledger {}", state_path.display()))?;

        let stats = self.scan_into(&mut ledger, plugin.as_deref())?;

        ledger::save(&mut ledger, &state_path)
            .with_context(|| format!("saving ledger {}", state_path.display()))?;
        Ok(stats)
    }

    /// Everything but load and save
    fn scan_into(&self, ledger: &mut Ledger, plugin: Option<&dyn LanguagePlugin>) -> Result<ScanStats> {
        let root = path_to_string(&self.root);
        let default_policy = GraphPolicy::default();

        let (graph, policy, zone_rules) = match plugin {
            Some(p) => (p.build_graph(&self.root)?, p.policy(), p.zone_rules()),
            None => (DepGraph::default(), &default_policy, common_zone_rules()),
        };

        let analysis = graph::analyze(&graph, policy, &root, &self.input.dynamic_imports);
        let zones = ZoneMap::new(zone_rules, &ledger.config.zone_overrides);
        let ctx = NormalizeContext::new(root.clone(), plugin.map(|p| p.name()), zones);
        let report = normalize::normalize(&self.input.records, &analysis, &ctx);

        let scope = normalize_scope(self.scan_path.as_deref());
        let mut fresh = report.findings;
        if let Some(scope) = &scope {
            fresh.retain(|f| paths::is_within(&f.file, scope));
        }
        let fresh_count = fresh.len();

        let mut potentials = self.input.potentials.clone();
        let mut codebase_metrics = None;
        if plugin.is_some() {
            for det in GRAPH_DETECTORS {
                potentials.insert(det.to_string(), graph.len() as u64);
            }
            codebase_metrics = Some(codebase_metrics_for(&graph, &root));
        }

        let opts = ScanOptions {
            lang: plugin.map(|p| p.name().to_string()),
            scan_path: scope,
            force_resolve: self.force_resolve,
            exclude: self.config.exclude.paths.clone(),
            potentials: Some(potentials),
            codebase_metrics,
        };
        let diff = ledger.merge_scan(fresh, &opts);
        debug!(
            "Merged {} fresh findings: {} new, {} auto-resolved, {} reopened",
            fresh_count, diff.new, diff.auto_resolved, diff.reopened
        );

        Ok(ScanStats {
            lang: opts.lang,
            files: graph.len(),
            edges: graph.edge_count(),
            cycles: analysis.cycles.len(),
            findings: fresh_count,
            malformed_records: report.skipped,
            suppressed: report.suppressed,
            score: ledger.score,
            strict_score: ledger.strict_score,
            objective_score: ledger.objective_score,
            objective_strict: ledger.objective_strict,
            diff,
        })
    }
}

/// File, line and directory totals of a graph
pub fn codebase_metrics_for(graph: &DepGraph, root: &str) -> CodebaseMetrics {
    let mut directories = BTreeSet::new();
    let mut total_loc = 0;
    for node in graph.nodes() {
        total_loc += node.loc;
        directories.insert(paths::parent_dir(&paths::rel_path(root, &node.path)).to_string());
    }
    CodebaseMetrics {
        total_files: graph.len(),
        total_loc,
        total_directories: directories.len(),
    }
}

/// Statistics from one scan
#[derive(Debug, Default)]
pub struct ScanStats {
    pub lang: Option<String>,
    /// Files in the import graph
    pub files: usize,
    pub edges: usize,
    pub cycles: usize,
    /// Findings reported this scan, after normalization
    pub findings: usize,
    pub malformed_records: usize,
    pub suppressed: usize,
    pub score: f64,
    pub strict_score: f64,
    pub objective_score: Option<f64>,
    pub objective_strict: Option<f64>,
    pub diff: ScanDiff,
}

impl ScanStats {
    /// Get a summary string.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} files", self.files),
            format!("{} findings", self.findings),
            format!("+{} new", self.diff.new),
            format!("-{} resolved", self.diff.auto_resolved),
        ];
        if self.diff.reopened > 0 {
            parts.push(format!("{} reopened", self.diff.reopened));
        }
        if self.malformed_records > 0 {
            parts.push(format!("{} malformed records skipped", self.malformed_records));
        }
        parts.join(", ")
    }
}
