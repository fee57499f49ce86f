//! Import graph and structural analyses
//!
//! The graph is an immutable petgraph arena built once per scan. All
//! analyses borrow it and take their language-specific knobs from a
//! [`GraphPolicy`]:
//!
//! - cycles: Tarjan SCC, deferred imports optionally excluded
//! - coupling: fan-in, fan-out, instability
//! - orphaned / single-use files
//! - boundary violations, boundary candidates, cross-module imports

pub mod coupling;
pub mod cycles;
pub mod model;
pub mod orphans;
pub mod policy;

pub use coupling::{
    coupling_for, coupling_score, detect_boundary_candidates, detect_boundary_violations,
    detect_cross_module_imports, BoundaryCandidate, BoundaryViolation, CouplingScore,
    CrossModuleImport,
};
pub use cycles::{detect_cycles, Cycle};
pub use model::{finalize, DepGraph, GraphBuilder, GraphNode, ImportKind, ImportManifest};
pub use orphans::{detect_orphaned_files, detect_single_use, OrphanEntry, SingleUseEntry};
pub use policy::{BoundaryRule, GraphPolicy};

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Everything the analyzer derives from one graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphAnalysis {
    pub file_count: usize,
    pub cycles: Vec<Cycle>,
    pub orphans: Vec<OrphanEntry>,
    pub single_use: Vec<SingleUseEntry>,
    pub boundary_violations: Vec<BoundaryViolation>,
    pub boundary_candidates: Vec<BoundaryCandidate>,
    pub cross_module: Vec<CrossModuleImport>,
}

/// Run every graph analysis under `policy`
pub fn analyze(
    graph: &DepGraph,
    policy: &GraphPolicy,
    root: &str,
    dynamic_targets: &BTreeSet<String>,
) -> GraphAnalysis {
    let cycles = detect_cycles(graph, policy.skip_deferred_cycles);
    let orphans = detect_orphaned_files(graph, policy, root, dynamic_targets);
    let single_use = detect_single_use(graph, policy, root);

    let mut boundary_violations = Vec::new();
    let mut boundary_candidates = Vec::new();
    for rule in &policy.boundaries {
        boundary_violations.extend(detect_boundary_violations(graph, rule, root));
        boundary_candidates.extend(detect_boundary_candidates(graph, rule, policy, root));
    }

    let cross_module = policy
        .cross_module_prefix
        .as_deref()
        .map(|prefix| detect_cross_module_imports(graph, prefix, root))
        .unwrap_or_default();

    debug!(
        "Graph analysis: {} cycles, {} orphans, {} single-use, {} boundary violations",
        cycles.len(),
        orphans.len(),
        single_use.len(),
        boundary_violations.len()
    );

    GraphAnalysis {
        file_count: graph.len(),
        cycles,
        orphans,
        single_use,
        boundary_violations,
        boundary_candidates,
        cross_module,
    }
}
