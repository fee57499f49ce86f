//! Coupling metrics and directory-boundary analyses

use super::model::{DepGraph, GraphNode};
use super::policy::{BoundaryRule, GraphPolicy};
use crate::paths::rel_path;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CouplingScore {
    pub fan_in: usize,
    pub fan_out: usize,
    /// fan_out / (fan_in + fan_out), rounded to 2 decimals; 0 when isolated
    pub instability: f64,
    pub importers: Vec<String>,
    pub imports: Vec<String>,
}

pub fn coupling_score(node: &GraphNode, root: &str) -> CouplingScore {
    let fan_in = node.importer_count;
    let fan_out = node.import_count;
    let total = fan_in + fan_out;
    let instability = if total == 0 {
        0.0
    } else {
        (fan_out as f64 / total as f64 * 100.0).round() / 100.0
    };
    let mut importers: Vec<String> = node.importers.iter().map(|p| rel_path(root, p)).collect();
    let mut imports: Vec<String> = node.imports.iter().map(|p| rel_path(root, p)).collect();
    importers.sort();
    imports.sort();
    CouplingScore {
        fan_in,
        fan_out,
        instability,
        importers,
        imports,
    }
}

/// Coupling of `path`; a file outside the graph scores all zeros
pub fn coupling_for(graph: &DepGraph, path: &str, root: &str) -> CouplingScore {
    graph
        .node(path)
        .map(|node| coupling_score(node, root))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryViolation {
    /// Absolute path of the importing file
    pub file: String,
    /// Relative path of the forbidden target
    pub target: String,
    /// First path segment under the forbidden prefix
    pub area: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryCandidate {
    pub file: String,
    /// The one forbidden-side area all importers come from
    pub sole_area: String,
    pub importer_count: usize,
    pub loc: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossModuleImport {
    pub file: String,
    pub target: String,
    pub source_module: String,
    pub target_module: String,
}

fn area_under<'a>(rel: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = rel.strip_prefix(prefix)?;
    let area = rest.split('/').next().unwrap_or(rest);
    if area.is_empty() {
        None
    } else {
        Some(area)
    }
}

/// Files under `rule.protected` importing files under `rule.forbidden_from`.
/// Sorted by file, then target.
pub fn detect_boundary_violations(
    graph: &DepGraph,
    rule: &BoundaryRule,
    root: &str,
) -> Vec<BoundaryViolation> {
    let label = rule.display_label();
    let mut out = Vec::new();
    for node in graph.nodes() {
        let rel = rel_path(root, &node.path);
        if !rel.starts_with(rule.protected.as_str()) {
            continue;
        }
        for target in graph.import_targets(&node.path) {
            let target_rel = rel_path(root, target);
            if let Some(area) = area_under(&target_rel, &rule.forbidden_from) {
                out.push(BoundaryViolation {
                    file: node.path.clone(),
                    area: area.to_string(),
                    target: target_rel,
                    label: label.clone(),
                });
            }
        }
    }
    out
}

/// Protected files used only from one forbidden-side area: candidates to
/// move into that area.
pub fn detect_boundary_candidates(
    graph: &DepGraph,
    rule: &BoundaryRule,
    policy: &GraphPolicy,
    root: &str,
) -> Vec<BoundaryCandidate> {
    let mut out = Vec::new();
    for node in graph.nodes() {
        let rel = rel_path(root, &node.path);
        if !rel.starts_with(rule.protected.as_str()) || policy.is_barrel(&node.path) {
            continue;
        }
        if node.importer_count == 0 {
            continue;
        }
        let mut areas = BTreeSet::new();
        let mut all_forbidden = true;
        for importer in &node.importers {
            match area_under(&rel_path(root, importer), &rule.forbidden_from) {
                Some(area) => {
                    areas.insert(area.to_string());
                }
                None => {
                    all_forbidden = false;
                    break;
                }
            }
        }
        if all_forbidden && areas.len() == 1 {
            if let Some(area) = areas.into_iter().next() {
                out.push(BoundaryCandidate {
                    file: node.path.clone(),
                    sole_area: area,
                    importer_count: node.importer_count,
                    loc: node.loc,
                });
            }
        }
    }
    out.sort_by(|a, b| b.loc.cmp(&a.loc).then_with(|| a.file.cmp(&b.file)));
    out
}

/// Imports from `prefix/<A>/...` into `prefix/<B>/...` with A != B.
/// Files directly under `prefix` belong to no module.
pub fn detect_cross_module_imports(
    graph: &DepGraph,
    prefix: &str,
    root: &str,
) -> Vec<CrossModuleImport> {
    let prefix = format!("{}/", prefix.trim_end_matches('/'));
    let module_of = |rel: &str| -> Option<String> {
        let rest = rel.strip_prefix(prefix.as_str())?;
        let (module, _) = rest.split_once('/')?;
        Some(module.to_string())
    };

    let mut out = Vec::new();
    for node in graph.nodes() {
        let rel = rel_path(root, &node.path);
        let Some(source_module) = module_of(&rel) else {
            continue;
        };
        for target in graph.import_targets(&node.path) {
            let target_rel = rel_path(root, target);
            if let Some(target_module) = module_of(&target_rel) {
                if target_module != source_module {
                    out.push(CrossModuleImport {
                        file: node.path.clone(),
                        target: target_rel,
                        source_module: source_module.clone(),
                        target_module,
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    #[test]
    fn test_instability() {
        let mut b = GraphBuilder::new();
        b.add_file("/r/a.py", 10)
            .add_file("/r/b.py", 10)
            .add_file("/r/c.py", 10)
            .add_import("/r/a.py", "/r/b.py")
            .add_import("/r/b.py", "/r/c.py")
            .add_import("/r/b.py", "json");
        let g = b.build();

        let score = coupling_for(&g, "/r/b.py", "/r");
        assert_eq!(score.fan_in, 1);
        assert_eq!(score.fan_out, 2);
        assert_eq!(score.instability, 0.67);
        assert_eq!(score.importers, vec!["a.py"]);
        assert_eq!(score.imports, vec!["c.py", "json"]);

        let isolated = coupling_for(&g, "/r/nope.py", "/r");
        assert_eq!(isolated.instability, 0.0);
        assert_eq!(coupling_for(&g, "/r/c.py", "/r").instability, 0.0);
    }

    fn layered() -> DepGraph {
        let mut b = GraphBuilder::new();
        b.add_file("/r/shared/util.py", 40)
            .add_file("/r/shared/helpers.py", 30)
            .add_file("/r/tools/lint/run.py", 50)
            .add_file("/r/tools/fmt/run.py", 50)
            .add_import("/r/shared/util.py", "/r/tools/lint/run.py")
            .add_import("/r/tools/lint/run.py", "/r/shared/helpers.py")
            .add_import("/r/tools/lint/run.py", "/r/tools/fmt/run.py");
        b.build()
    }

    #[test]
    fn test_boundary_violation() {
        let rule = BoundaryRule::new("shared/", "tools/", "");
        let violations = detect_boundary_violations(&layered(), &rule, "/r");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file, "/r/shared/util.py");
        assert_eq!(violations[0].target, "tools/lint/run.py");
        assert_eq!(violations[0].area, "lint");
        assert_eq!(violations[0].label, "shared→tools");
    }

    #[test]
    fn test_external_targets_are_not_violations() {
        let mut b = GraphBuilder::new();
        b.add_file("/r/shared/util.py", 40)
            .add_import("/r/shared/util.py", "/r/tools/gen/schema.py")
            .add_import("/r/shared/util.py", "tools/cli");
        let rule = BoundaryRule::new("shared/", "tools/", "");
        assert!(detect_boundary_violations(&b.build(), &rule, "/r").is_empty());

        let mut b = GraphBuilder::new();
        b.add_file("/r/tools/lint/run.py", 40)
            .add_import("/r/tools/lint/run.py", "/r/tools/fmt/missing.py");
        assert!(detect_cross_module_imports(&b.build(), "tools", "/r").is_empty());
    }

    #[test]
    fn test_boundary_candidate() {
        let rule = BoundaryRule::new("shared/", "tools/", "");
        let candidates =
            detect_boundary_candidates(&layered(), &rule, &GraphPolicy::default(), "/r");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].file, "/r/shared/helpers.py");
        assert_eq!(candidates[0].sole_area, "lint");
    }

    #[test]
    fn test_cross_module_imports() {
        let found = detect_cross_module_imports(&layered(), "tools", "/r");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_module, "lint");
        assert_eq!(found[0].target_module, "fmt");
        assert_eq!(found[0].target, "tools/fmt/run.py");
    }
}
