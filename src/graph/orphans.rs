//! Orphaned and single-use file detection

use super::model::DepGraph;
use super::policy::GraphPolicy;
use crate::paths::{self, rel_path};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanEntry {
    pub file: String,
    pub loc: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleUseEntry {
    pub file: String,
    pub loc: usize,
    /// Relative path of the one importer
    pub sole_importer: String,
}

/// Does a dynamic import specifier (`import("./pages/Home")`,
/// `importlib.import_module("pkg.plugins.csv")`) refer to `rel_path`?
fn is_dynamically_imported(rel_path: &str, dynamic_targets: &BTreeSet<String>) -> bool {
    if dynamic_targets.is_empty() {
        return false;
    }
    let stem = paths::strip_extension(rel_path);
    // pkg/index.ts is reachable as "pkg"
    let dir_module = match paths::file_name(stem) {
        "index" | "__init__" | "mod" => Some(paths::parent_dir(stem)),
        _ => None,
    };
    dynamic_targets.iter().any(|spec| {
        let spec = spec
            .trim_start_matches("./")
            .trim_start_matches("../")
            .trim_start_matches("@/")
            .trim_start_matches("~/");
        // A specifier may name the file with or without its extension, or
        // as a dotted module path
        let mut forms = vec![spec.to_string(), paths::strip_extension(spec).to_string()];
        if !spec.contains('/') {
            forms.push(spec.replace('.', "/"));
        }
        let matches = |candidate: &str, form: &str| {
            candidate == form || candidate.ends_with(&format!("/{form}"))
        };
        forms.iter().filter(|form| !form.is_empty()).any(|form| {
            matches(rel_path, form)
                || matches(stem, form)
                || dir_module.is_some_and(|dir| !dir.is_empty() && matches(dir, form))
        })
    })
}

/// Files nobody imports that are not entry points, barrels, dynamic-import
/// targets or trivially small. Sorted by LOC descending, then path.
pub fn detect_orphaned_files(
    graph: &DepGraph,
    policy: &GraphPolicy,
    root: &str,
    dynamic_targets: &BTreeSet<String>,
) -> Vec<OrphanEntry> {
    let mut out: Vec<OrphanEntry> = graph
        .nodes()
        .filter(|node| node.importer_count == 0)
        .filter(|node| node.loc >= policy.min_orphan_loc)
        .filter(|node| !policy.is_barrel(&node.path))
        .filter(|node| {
            let rel = rel_path(root, &node.path);
            !policy.is_entry(&rel) && !is_dynamically_imported(&rel, dynamic_targets)
        })
        .map(|node| OrphanEntry {
            file: node.path.clone(),
            loc: node.loc,
        })
        .collect();
    out.sort_by(|a, b| b.loc.cmp(&a.loc).then_with(|| a.file.cmp(&b.file)));
    out
}

/// Files with exactly one importer, sized for inlining. Sorted by LOC
/// descending, then path.
pub fn detect_single_use(graph: &DepGraph, policy: &GraphPolicy, root: &str) -> Vec<SingleUseEntry> {
    let mut out: Vec<SingleUseEntry> = graph
        .nodes()
        .filter(|node| node.importer_count == 1)
        .filter(|node| !policy.is_barrel(&node.path))
        .filter(|node| (policy.single_use_min_loc..=policy.single_use_max_loc).contains(&node.loc))
        .filter_map(|node| {
            let importer = node.importers.iter().next()?;
            Some(SingleUseEntry {
                file: node.path.clone(),
                loc: node.loc,
                sole_importer: rel_path(root, importer),
            })
        })
        .collect();
    out.sort_by(|a, b| b.loc.cmp(&a.loc).then_with(|| a.file.cmp(&b.file)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn policy() -> GraphPolicy {
        GraphPolicy {
            entry_patterns: vec!["__main__".into()],
            barrel_names: ["__init__.py".to_string()].into_iter().collect(),
            ..Default::default()
        }
    }

    fn sample() -> DepGraph {
        let mut b = GraphBuilder::new();
        b.add_file("/r/app/__main__.py", 30)
            .add_file("/r/app/__init__.py", 15)
            .add_file("/r/app/core.py", 120)
            .add_file("/r/app/dead.py", 45)
            .add_file("/r/app/tiny.py", 3)
            .add_file("/r/app/plugins/csv.py", 60)
            .add_import("/r/app/__main__.py", "/r/app/core.py");
        b.build()
    }

    #[test]
    fn test_orphans_respect_policy() {
        let dynamic: BTreeSet<String> = ["app.plugins.csv".to_string()].into_iter().collect();
        let orphans = detect_orphaned_files(&sample(), &policy(), "/r", &dynamic);
        let files: Vec<&str> = orphans.iter().map(|o| o.file.as_str()).collect();
        assert_eq!(files, vec!["/r/app/dead.py"]);
    }

    #[test]
    fn test_orphans_sorted_by_loc_desc() {
        let orphans = detect_orphaned_files(&sample(), &policy(), "/r", &BTreeSet::new());
        let files: Vec<&str> = orphans.iter().map(|o| o.file.as_str()).collect();
        assert_eq!(files, vec!["/r/app/plugins/csv.py", "/r/app/dead.py"]);
    }

    #[test]
    fn test_dynamic_import_matching() {
        let targets: BTreeSet<String> = ["./pages/Home".to_string()].into_iter().collect();
        assert!(is_dynamically_imported("src/pages/Home.tsx", &targets));
        assert!(!is_dynamically_imported("src/pages/HomeView.tsx", &targets));

        let pkg: BTreeSet<String> = ["./widgets".to_string()].into_iter().collect();
        assert!(is_dynamically_imported("src/widgets/index.ts", &pkg));
    }

    #[test]
    fn test_dynamic_import_with_extension_is_not_orphaned() {
        let mut b = GraphBuilder::new();
        b.add_file("/r/src/Home.tsx", 40).add_file("/r/src/Away.tsx", 40);
        let graph = b.build();
        let dynamic: BTreeSet<String> = ["./Home.tsx".to_string()].into_iter().collect();

        let orphans = detect_orphaned_files(&graph, &policy(), "/r", &dynamic);
        let files: Vec<&str> = orphans.iter().map(|o| o.file.as_str()).collect();
        assert_eq!(files, vec!["/r/src/Away.tsx"]);
    }

    #[test]
    fn test_single_use() {
        let found = detect_single_use(&sample(), &policy(), "/r");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "/r/app/core.py");
        assert_eq!(found[0].sole_importer, "app/__main__.py");

        let strict = GraphPolicy {
            single_use_max_loc: 100,
            ..policy()
        };
        assert!(detect_single_use(&sample(), &strict, "/r").is_empty());
    }
}
