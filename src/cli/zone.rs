//! Zone command - inspect and override file zones

use anyhow::Result;
use console::style;

use super::Workspace;
use crate::config::auto_detect_lang;
use crate::paths::{path_to_string, rel_path};
use crate::plugins::PluginRegistry;
use crate::zones::{common_zone_rules, ZoneMap};

pub fn show(ws: &Workspace, lang: Option<String>) -> Result<()> {
    let ledger = ws.load_ledger()?;
    let lang = lang.or_else(|| auto_detect_lang(&ws.root, &ws.config));
    let Some(lang) = lang else {
        println!("{}", style("No language detected; pass --lang").dim());
        return Ok(());
    };
    let registry = PluginRegistry::with_builtins(&ws.config);
    let plugin = registry.get(&lang)?;
    let graph = plugin.build_graph(&ws.root)?;

    let root = path_to_string(&ws.root);
    let zones = ZoneMap::new(plugin.zone_rules(), &ledger.config.zone_overrides);
    let files: Vec<String> = graph.nodes().map(|n| rel_path(&root, &n.path)).collect();
    let classified = zones.classify(files.iter().map(String::as_str));

    println!();
    for (zone, files) in &classified {
        println!("  {} ({})", style(zone).bold(), files.len());
        for file in files.iter().take(10) {
            let pinned = if ledger.config.zone_overrides.contains_key(file) {
                " (override)"
            } else {
                ""
            };
            println!("    {}{}", file, style(pinned).dim());
        }
        if files.len() > 10 {
            println!("    {}", style(format!("... and {} more", files.len() - 10)).dim());
        }
    }
    println!();
    Ok(())
}

fn rel_file(ws: &Workspace, file: &str) -> String {
    rel_path(&path_to_string(&ws.root), file)
}

pub fn set(ws: &Workspace, file: &str, zone: &str) -> Result<()> {
    let mut ledger = ws.load_ledger()?;
    let file = rel_file(ws, file);
    ledger.set_zone_override(&file, zone)?;
    ws.save_ledger(&mut ledger)?;
    println!("Zone of {} set to {}", style(&file).cyan(), style(zone).bold());
    Ok(())
}

pub fn clear(ws: &Workspace, file: &str) -> Result<()> {
    let mut ledger = ws.load_ledger()?;
    let file = rel_file(ws, file);
    if !ledger.clear_zone_override(&file) {
        println!("{}", style(format!("No zone override for {file}")).dim());
        return Ok(());
    }
    ws.save_ledger(&mut ledger)?;
    let zones = ZoneMap::new(common_zone_rules(), &ledger.config.zone_overrides);
    println!(
        "Cleared zone override for {} (shared rules say {})",
        style(&file).cyan(),
        zones.zone_of(&file)
    );
    Ok(())
}
