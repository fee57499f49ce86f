//! Status command - scores, counts and dimension health

use anyhow::Result;
use console::style;
use serde_json::json;

use super::Workspace;
use crate::ledger::{stagnant_dimensions, wontfix_gap_trend, GapTrend};
use crate::models::Tier;
use crate::scoring;

pub fn run(ws: &Workspace, as_json: bool) -> Result<()> {
    let ledger = ws.load_ledger()?;

    if as_json {
        let doc = json!({
            "score": ledger.score,
            "strict_score": ledger.strict_score,
            "objective_score": ledger.objective_score,
            "objective_strict": ledger.objective_strict,
            "stats": ledger.stats,
            "dimension_scores": ledger.dimension_scores,
            "codebase_metrics": ledger.codebase_metrics,
            "scan_count": ledger.scan_count,
            "last_scan": ledger.last_scan,
            "open_by_detector": scoring::open_by_detector(ledger.findings.values()),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("\nhealthledger Status\n");
    println!("  Repository: {}", style(ws.root.display()).cyan());
    println!("  Ledger: {}", style(ws.state_path.display()).dim());

    let Some(last_scan) = ledger.last_scan else {
        println!(
            "\n  {} No scans yet. Run {}\n",
            style("[--]").dim(),
            style("healthledger scan").cyan()
        );
        return Ok(());
    };
    println!(
        "  Scans: {} (last {})",
        ledger.scan_count,
        style(last_scan.format("%Y-%m-%d %H:%M UTC")).dim()
    );
    for (lang, m) in &ledger.codebase_metrics {
        println!(
            "  {}: {} files, {} lines, {} directories",
            style(lang).cyan(),
            m.total_files,
            m.total_loc,
            m.total_directories
        );
    }

    println!();
    println!(
        "  Score: {}  strict {}",
        style(format!("{:.1}", ledger.score)).green().bold(),
        style(format!("{:.1}", ledger.strict_score)).yellow()
    );
    if let (Some(objective), Some(strict)) = (ledger.objective_score, ledger.objective_strict) {
        println!(
            "  Objective: {}  strict {}",
            style(format!("{objective:.1}")).green().bold(),
            style(format!("{strict:.1}")).yellow()
        );
    }

    let c = &ledger.stats.counts;
    println!(
        "\n  {} findings: {} open, {} fixed, {} auto-resolved, {} wontfix, {} false positive",
        ledger.stats.total,
        style(c.open).red(),
        style(c.fixed).green(),
        style(c.auto_resolved).green(),
        style(c.wontfix).yellow(),
        style(c.false_positive).dim()
    );
    for tier in Tier::ALL {
        if let Some(t) = ledger.stats.by_tier.get(&tier.number()) {
            println!("    {}: {} open of {}", tier, t.open, t.total());
        }
    }

    if !ledger.dimension_scores.is_empty() {
        println!("\n  Dimensions:");
        for (name, dim) in &ledger.dimension_scores {
            println!(
                "    {:<20} {:>5.1}  strict {:>5.1}  {} issues / {} checks  ({})",
                name, dim.score, dim.strict, dim.issues, dim.checks, dim.tier
            );
        }
    }

    let stagnant = stagnant_dimensions(&ledger.scan_history);
    if !stagnant.is_empty() {
        println!(
            "\n  {} No strict-score movement lately: {}",
            style("[--]").dim(),
            stagnant.join(", ")
        );
    }
    if let Some(GapTrend::Growing) = wontfix_gap_trend(&ledger.scan_history) {
        println!(
            "  {} The gap between objective and strict scores is growing (wontfix debt)",
            style("[!!]").yellow()
        );
    }
    let chronic = ledger.chronic_reopeners();
    if !chronic.is_empty() {
        println!(
            "  {} {} findings reopened twice or more",
            style("[!!]").yellow(),
            chronic.len()
        );
    }
    println!();
    Ok(())
}
