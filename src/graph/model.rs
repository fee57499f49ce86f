//! Immutable import graph
//!
//! Nodes are files (absolute paths), edges are resolved import relations.
//! A `DepGraph` is built once per scan through [`GraphBuilder`] and is never
//! mutated afterwards; every analysis borrows it.
//!
//! Import targets that were never registered as files are external
//! dependencies: they stay in the node's `imports` set (and in its
//! `import_count`) but never become edges.

use crate::errors::{LedgerError, LedgerResult};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Kind of an import edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// Module-level import, evaluated at load time
    Direct,
    /// Import inside a function body, evaluated lazily
    Deferred,
}

/// A file in the import graph with its derived counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub path: String,
    pub loc: usize,
    pub imports: BTreeSet<String>,
    /// Subset of `imports` that are deferred
    pub deferred_imports: BTreeSet<String>,
    pub importers: BTreeSet<String>,
    pub import_count: usize,
    pub importer_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PendingFile {
    loc: usize,
    imports: BTreeSet<String>,
    deferred_imports: BTreeSet<String>,
}

/// Owned-collection builder for [`DepGraph`].
///
/// Per-file builders can be filled concurrently and combined with
/// [`GraphBuilder::merge`]; the result does not depend on merge order.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    files: BTreeMap<String, PendingFile>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file. Registering twice keeps the larger line count.
    pub fn add_file(&mut self, path: impl Into<String>, loc: usize) -> &mut Self {
        let entry = self.files.entry(path.into()).or_default();
        entry.loc = entry.loc.max(loc);
        self
    }

    /// Record a load-time import. The source file is registered implicitly.
    pub fn add_import(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.files
            .entry(from.into())
            .or_default()
            .imports
            .insert(to.into());
        self
    }

    /// Record an import deferred to a function body
    pub fn add_deferred_import(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> &mut Self {
        let to = to.into();
        let entry = self.files.entry(from.into()).or_default();
        entry.imports.insert(to.clone());
        entry.deferred_imports.insert(to);
        self
    }

    /// Union of two builders
    pub fn merge(mut self, other: GraphBuilder) -> GraphBuilder {
        for (path, pending) in other.files {
            let entry = self.files.entry(path).or_default();
            entry.loc = entry.loc.max(pending.loc);
            entry.imports.extend(pending.imports);
            entry.deferred_imports.extend(pending.deferred_imports);
        }
        self
    }

    pub fn build(self) -> DepGraph {
        finalize(self)
    }
}

/// Turn the raw edge sets into a graph whose importer sets and counts are
/// recomputed from scratch.
pub fn finalize(builder: GraphBuilder) -> DepGraph {
    let files = builder.files;

    let mut importers: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for (path, pending) in &files {
        for target in &pending.imports {
            if files.contains_key(target) {
                importers
                    .entry(target.as_str())
                    .or_default()
                    .insert(path.clone());
            }
        }
    }

    let mut graph: DiGraph<GraphNode, ImportKind> =
        DiGraph::with_capacity(files.len(), files.values().map(|f| f.imports.len()).sum());
    let mut index: FxHashMap<String, NodeIndex> = FxHashMap::default();

    // BTreeMap order: node indices follow sorted paths
    for (path, pending) in &files {
        let node_importers = importers.remove(path.as_str()).unwrap_or_default();
        let node = GraphNode {
            path: path.clone(),
            loc: pending.loc,
            import_count: pending.imports.len(),
            importer_count: node_importers.len(),
            imports: pending.imports.clone(),
            deferred_imports: pending.deferred_imports.clone(),
            importers: node_importers,
        };
        let idx = graph.add_node(node);
        index.insert(path.clone(), idx);
    }

    for (path, pending) in &files {
        let src = index[path];
        for target in &pending.imports {
            if let Some(&dst) = index.get(target) {
                let kind = if pending.deferred_imports.contains(target) {
                    ImportKind::Deferred
                } else {
                    ImportKind::Direct
                };
                graph.add_edge(src, dst, kind);
            }
        }
    }

    debug!(
        "Finalized import graph: {} files, {} internal edges",
        graph.node_count(),
        graph.edge_count()
    );

    DepGraph { graph, index }
}

/// Finalized, read-only import graph
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    graph: DiGraph<GraphNode, ImportKind>,
    index: FxHashMap<String, NodeIndex>,
}

impl DepGraph {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of import edges between files of the graph
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn node(&self, path: &str) -> Option<&GraphNode> {
        self.index.get(path).map(|&idx| &self.graph[idx])
    }

    /// All nodes, sorted by path
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Files `path` imports, deferred imports included. External targets
    /// never became edges and are not listed. Sorted.
    pub fn import_targets(&self, path: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .edges(idx)
            .map(|e| self.graph[e.target()].path.as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub(crate) fn node_at(&self, idx: usize) -> &GraphNode {
        &self.graph[NodeIndex::new(idx)]
    }

    /// Sorted, de-duplicated successor indices of node `idx` over the
    /// effective edge set.
    pub(crate) fn successors(&self, idx: usize, skip_deferred: bool) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .edges(NodeIndex::new(idx))
            .filter(|e| !(skip_deferred && *e.weight() == ImportKind::Deferred))
            .map(|e| e.target().index())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Per-file entry of an import manifest
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub loc: usize,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub deferred_imports: Vec<String>,
}

/// Import graph exchanged with language-specific graph builders:
///
/// ```json
/// {"files": {"/repo/src/a.py": {"loc": 120, "imports": ["/repo/src/b.py"], "deferred_imports": []}}}
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ImportManifest {
    #[serde(default)]
    pub files: BTreeMap<String, ManifestEntry>,
}

impl ImportManifest {
    pub fn load(path: &Path) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LedgerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LedgerResult<Self> {
        serde_json::from_str(content).map_err(|e| LedgerError::Manifest(e.to_string()))
    }

    /// Build the graph, one partial builder per file, merged in parallel
    pub fn into_graph(self) -> DepGraph {
        self.files
            .into_par_iter()
            .map(|(path, entry)| {
                let mut builder = GraphBuilder::new();
                builder.add_file(path.clone(), entry.loc);
                for target in entry.imports {
                    builder.add_import(path.clone(), target);
                }
                for target in entry.deferred_imports {
                    builder.add_deferred_import(path.clone(), target);
                }
                builder
            })
            .reduce(GraphBuilder::new, GraphBuilder::merge)
            .build()
    }
}
