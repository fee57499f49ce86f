//! Graph-analysis entries to findings

use super::{NormalizeContext, NormalizeReport};
use crate::graph::GraphAnalysis;
use crate::models::{Confidence, Finding, Tier};
use crate::paths;
use crate::zones::Zone;
use serde_json::{json, Map, Value};

/// Single-use files in this LOC range are right-sized abstractions
const SINGLE_USE_OK_LOC: std::ops::RangeInclusive<usize> = 50..=200;

/// Cycle names list this many files, then `+N`
const CYCLE_NAME_FILES: usize = 4;

fn detail(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn cycles(analysis: &GraphAnalysis, ctx: &NormalizeContext, out: &mut NormalizeReport) {
    for cycle in &analysis.cycles {
        let files: Vec<String> = cycle.files.iter().map(|f| ctx.rel(f)).collect();
        let Some(first) = files.first() else {
            continue;
        };
        let mut name = files
            .iter()
            .take(CYCLE_NAME_FILES)
            .cloned()
            .collect::<Vec<_>>()
            .join("::");
        if files.len() > CYCLE_NAME_FILES {
            name.push_str(&format!("::+{}", files.len() - CYCLE_NAME_FILES));
        }
        let tier = if cycle.length <= 3 { Tier::T3 } else { Tier::T4 };
        let mut chain = files.iter().take(5).cloned().collect::<Vec<_>>().join(" -> ");
        if files.len() > 5 {
            chain.push_str(&format!(" -> +{}", files.len() - 5));
        }
        out.findings.push(
            Finding::new(
                "cycles",
                first,
                &name,
                tier,
                Confidence::High,
                format!("Import cycle ({} files): {chain}", cycle.length),
            )
            .with_detail(detail(json!({"files": files, "length": cycle.length}))),
        );
    }
}

fn orphans(analysis: &GraphAnalysis, ctx: &NormalizeContext, out: &mut NormalizeReport) {
    for entry in &analysis.orphans {
        if ctx.zone_of(&entry.file) != Zone::Production {
            out.suppressed += 1;
            continue;
        }
        let file = ctx.rel(&entry.file);
        out.findings.push(
            Finding::new(
                "orphaned",
                &file,
                "",
                Tier::T3,
                Confidence::Medium,
                format!(
                    "Orphaned file ({} LOC): zero importers, not an entry point",
                    entry.loc
                ),
            )
            .with_detail(detail(json!({"loc": entry.loc}))),
        );
    }
}

fn single_use(analysis: &GraphAnalysis, ctx: &NormalizeContext, out: &mut NormalizeReport) {
    for entry in &analysis.single_use {
        let file = ctx.rel(&entry.file);
        let colocated = paths::parent_dir(&file) == paths::parent_dir(&entry.sole_importer);
        if SINGLE_USE_OK_LOC.contains(&entry.loc)
            || colocated
            || ctx.zone_of(&entry.file) != Zone::Production
        {
            out.suppressed += 1;
            continue;
        }
        out.findings.push(
            Finding::new(
                "single_use",
                &file,
                "",
                Tier::T3,
                Confidence::Medium,
                format!(
                    "Single-use ({} LOC): only imported by {}",
                    entry.loc, entry.sole_importer
                ),
            )
            .with_detail(detail(json!({
                "loc": entry.loc,
                "sole_importer": entry.sole_importer,
            }))),
        );
    }
}

fn coupling(analysis: &GraphAnalysis, ctx: &NormalizeContext, out: &mut NormalizeReport) {
    for v in &analysis.boundary_violations {
        let file = ctx.rel(&v.file);
        out.findings.push(
            Finding::new(
                "coupling",
                &file,
                &format!("boundary::{}", v.target),
                Tier::T3,
                Confidence::High,
                format!("Boundary violation ({}): imports {} [{}]", v.label, v.target, v.area),
            )
            .with_detail(detail(json!({
                "kind": "boundary_violation",
                "target": v.target,
                "area": v.area,
                "label": v.label,
            }))),
        );
    }

    for c in &analysis.cross_module {
        let file = ctx.rel(&c.file);
        out.findings.push(
            Finding::new(
                "coupling",
                &file,
                &format!("cross::{}", c.target),
                Tier::T2,
                Confidence::High,
                format!(
                    "Cross-module import: {} -> {} ({})",
                    c.source_module, c.target_module, c.target
                ),
            )
            .with_detail(detail(json!({
                "kind": "cross_module",
                "target": c.target,
                "source_module": c.source_module,
                "target_module": c.target_module,
            }))),
        );
    }

    for c in &analysis.boundary_candidates {
        let file = ctx.rel(&c.file);
        out.findings.push(
            Finding::new(
                "coupling",
                &file,
                &format!("candidate::{}", c.sole_area),
                Tier::T3,
                Confidence::Medium,
                format!(
                    "Only used by {} ({} importers, {} LOC): consider moving it there",
                    c.sole_area, c.importer_count, c.loc
                ),
            )
            .with_detail(detail(json!({
                "kind": "boundary_candidate",
                "sole_area": c.sole_area,
                "importer_count": c.importer_count,
                "loc": c.loc,
            }))),
        );
    }
}

/// Turn a [`GraphAnalysis`] into findings. Orphan and single-use entries
/// only count for production files.
pub fn normalize_graph(analysis: &GraphAnalysis, ctx: &NormalizeContext) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    cycles(analysis, ctx, &mut report);
    orphans(analysis, ctx, &mut report);
    single_use(analysis, ctx, &mut report);
    coupling(analysis, ctx, &mut report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BoundaryViolation, Cycle, OrphanEntry, SingleUseEntry};
    use crate::zones::{common_zone_rules, ZoneMap};
    use std::collections::BTreeMap;

    fn ctx() -> NormalizeContext {
        NormalizeContext::new("/r", None, ZoneMap::new(common_zone_rules(), &BTreeMap::new()))
    }

    fn cycle(files: &[&str]) -> Cycle {
        Cycle {
            files: files.iter().map(|f| f.to_string()).collect(),
            length: files.len(),
        }
    }

    #[test]
    fn test_cycle_tiers_and_names() {
        let analysis = GraphAnalysis {
            cycles: vec![
                cycle(&["/r/a", "/r/b", "/r/c", "/r/d", "/r/e", "/r/f"]),
                cycle(&["/r/x", "/r/y"]),
            ],
            ..Default::default()
        };
        let report = normalize_graph(&analysis, &ctx());
        let big = &report.findings[0];
        assert_eq!(big.id, "cycles::a::a::b::c::d::+2");
        assert_eq!(big.tier, Tier::T4);
        assert_eq!(big.summary, "Import cycle (6 files): a -> b -> c -> d -> e -> +1");
        let small = &report.findings[1];
        assert_eq!(small.id, "cycles::x::x::y");
        assert_eq!(small.tier, Tier::T3);
    }

    #[test]
    fn test_orphans_only_in_production() {
        let analysis = GraphAnalysis {
            orphans: vec![
                OrphanEntry { file: "/r/app/dead.py".into(), loc: 40 },
                OrphanEntry { file: "/r/tests/helper.py".into(), loc: 40 },
            ],
            ..Default::default()
        };
        let report = normalize_graph(&analysis, &ctx());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].id, "orphaned::app/dead.py");
        assert_eq!(report.suppressed, 1);
    }

    #[test]
    fn test_single_use_suppression() {
        let entry = |file: &str, loc: usize, importer: &str| SingleUseEntry {
            file: file.into(),
            loc,
            sole_importer: importer.into(),
        };
        let analysis = GraphAnalysis {
            single_use: vec![
                entry("/r/lib/small.py", 30, "app/main.py"),
                entry("/r/lib/sized.py", 120, "app/main.py"),
                entry("/r/app/near.py", 30, "app/main.py"),
            ],
            ..Default::default()
        };
        let report = normalize_graph(&analysis, &ctx());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].id, "single_use::lib/small.py");
        assert_eq!(report.suppressed, 2);
    }

    #[test]
    fn test_boundary_violation_finding() {
        let analysis = GraphAnalysis {
            boundary_violations: vec![BoundaryViolation {
                file: "/r/shared/util.py".into(),
                target: "tools/lint/run.py".into(),
                area: "lint".into(),
                label: "shared→tools".into(),
            }],
            ..Default::default()
        };
        let report = normalize_graph(&analysis, &ctx());
        let f = &report.findings[0];
        assert_eq!(f.id, "coupling::shared/util.py::boundary::tools/lint/run.py");
        assert_eq!(f.tier, Tier::T3);
        assert_eq!(f.confidence, Confidence::High);
    }
}
