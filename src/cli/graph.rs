//! Cycles command - list import cycles in the current graph

use anyhow::{anyhow, Result};
use console::style;

use super::Workspace;
use crate::config::auto_detect_lang;
use crate::graph::detect_cycles;
use crate::paths::{path_to_string, rel_path};
use crate::plugins::PluginRegistry;

pub fn cycles(ws: &Workspace, lang: Option<String>, include_deferred: bool) -> Result<()> {
    let lang = lang
        .or_else(|| auto_detect_lang(&ws.root, &ws.config))
        .ok_or_else(|| anyhow!("No language detected; pass --lang"))?;
    let registry = PluginRegistry::with_builtins(&ws.config);
    let plugin = registry.get(&lang)?;
    let graph = plugin.build_graph(&ws.root)?;

    let cycles = detect_cycles(&graph, !include_deferred);
    if cycles.is_empty() {
        println!("{}", style("No import cycles.").green());
        return Ok(());
    }

    let root = path_to_string(&ws.root);
    println!("\n{} import cycles\n", style(cycles.len()).red().bold());
    for (idx, cycle) in cycles.iter().enumerate() {
        println!(
            "  {} {} files",
            style(format!("{:>3}.", idx + 1)).dim(),
            style(cycle.length).bold()
        );
        for file in &cycle.files {
            println!("       {} {}", style("└─").dim(), rel_path(&root, file));
        }
    }
    println!();
    Ok(())
}
