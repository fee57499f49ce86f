//! Scan command - run one scan and merge it into the ledger

use anyhow::Result;
use console::style;
use std::path::Path;

use super::Workspace;
use crate::pipeline::{DetectorInput, Pipeline};
use crate::plugins::PluginRegistry;

pub fn run(
    ws: &Workspace,
    lang: Option<String>,
    input: Option<&Path>,
    scope: Option<String>,
    force_resolve: bool,
) -> Result<()> {
    let registry = PluginRegistry::with_builtins(&ws.config);
    let mut pipeline = Pipeline::new(&ws.root, &ws.config, &registry)
        .with_state_path(&ws.state_path)
        .force_resolve(force_resolve);
    if let Some(lang) = lang {
        pipeline = pipeline.with_lang(lang);
    }
    if let Some(scope) = scope {
        pipeline = pipeline.scoped(scope);
    }
    if let Some(input) = input {
        pipeline = pipeline.with_input(DetectorInput::load(input)?);
    }

    let stats = pipeline.run()?;
    let diff = &stats.diff;

    println!(
        "\n{} {}",
        style("Scan complete:").bold(),
        stats.summary()
    );
    if let Some(lang) = &stats.lang {
        println!(
            "  Graph ({}): {} files, {} edges, {} cycles",
            style(lang).cyan(),
            stats.files,
            stats.edges,
            stats.cycles
        );
    }
    println!(
        "  Score: {} (strict {})",
        style(format!("{:.1}", stats.score)).green().bold(),
        style(format!("{:.1}", stats.strict_score)).yellow()
    );
    if let (Some(objective), Some(strict)) = (stats.objective_score, stats.objective_strict) {
        println!(
            "  Objective: {} (strict {})",
            style(format!("{objective:.1}")).green().bold(),
            style(format!("{strict:.1}")).yellow()
        );
    }
    if diff.ignored > 0 {
        println!("  {} findings dropped by ignore patterns", style(diff.ignored).dim());
    }
    for det in &diff.suspect_detectors {
        println!(
            "  {} '{}' reported nothing after previously reporting findings; not auto-resolving (use --force-resolve)",
            style("[!!]").yellow(),
            det
        );
    }
    if !diff.chronic_reopeners.is_empty() {
        println!(
            "\n  {} {} findings keep coming back:",
            style("[!!]").yellow(),
            diff.chronic_reopeners.len()
        );
        for f in diff.chronic_reopeners.iter().take(5) {
            println!(
                "    {} {} {}",
                style(format!("x{}", f.reopen_count)).red(),
                f.id,
                style(&f.summary).dim()
            );
        }
    }
    println!();
    Ok(())
}
