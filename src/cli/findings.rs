//! Finding commands - show, next, resolve, ignore

use anyhow::{anyhow, Result};
use console::style;

use super::Workspace;
use crate::models::{Finding, Status, Tier};
use crate::scoring::compute_score_impact;

fn print_finding(idx: usize, finding: &Finding) {
    let tier = match finding.tier {
        Tier::T1 => style(finding.tier.to_string()).green(),
        Tier::T2 => style(finding.tier.to_string()).cyan(),
        Tier::T3 => style(finding.tier.to_string()).yellow(),
        Tier::T4 => style(finding.tier.to_string()).red(),
    };
    println!(
        "  {} {} {} {}",
        style(format!("{idx:>3}.")).dim(),
        tier,
        style(&finding.summary).bold(),
        style(format!("({})", finding.confidence)).dim()
    );
    println!("       {} {}", style("└─").dim(), style(&finding.id).dim());
    if finding.status != Status::Open {
        let note = finding.note.as_deref().unwrap_or("");
        println!("       {} {} {}", style("└─").dim(), finding.status, style(note).dim());
    }
}

pub fn show(ws: &Workspace, pattern: &str, status: &str, top: Option<usize>, as_json: bool) -> Result<()> {
    let ledger = ws.load_ledger()?;
    let status = match status {
        "all" => None,
        s => Some(Status::parse(s).ok_or_else(|| anyhow!("unknown status {s:?}"))?),
    };
    let mut matches = ledger.match_findings(pattern, status)?;
    if let Some(top) = top {
        matches.truncate(top);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }
    if matches.is_empty() {
        println!("{}", style(format!("No findings match {pattern:?}")).dim());
        return Ok(());
    }
    println!("\n{} findings match {}\n", matches.len(), style(pattern).cyan());
    for (idx, finding) in matches.iter().enumerate() {
        print_finding(idx + 1, finding);
    }
    println!();
    Ok(())
}

pub fn next(ws: &Workspace, tier: Option<u8>, count: usize) -> Result<()> {
    let ledger = ws.load_ledger()?;
    let tier = tier.map(Tier::try_from).transpose().map_err(|e| anyhow!(e))?;
    let items = ledger.next_items(tier, count);
    if items.is_empty() {
        println!("{}", style("No open findings. Nothing to do.").green());
        return Ok(());
    }
    println!();
    for (idx, finding) in items.iter().enumerate() {
        print_finding(idx + 1, finding);
        let impact = compute_score_impact(&ledger.dimension_scores, &finding.detector, 1);
        if impact > 0.0 {
            println!(
                "       {} fixing this is worth about +{:.1} objective points",
                style("└─").dim(),
                impact
            );
        }
    }
    println!();
    Ok(())
}

pub fn resolve(ws: &Workspace, status: &str, patterns: &[String], note: Option<&str>) -> Result<()> {
    let status = Status::parse(status).ok_or_else(|| anyhow!("unknown status {status:?}"))?;
    let mut ledger = ws.load_ledger()?;
    let mut resolved = 0;
    for pattern in patterns {
        let ids = ledger.resolve_findings(pattern, status, note)?;
        if ids.is_empty() {
            println!("  {} no open findings match {}", style("[--]").dim(), pattern);
        }
        resolved += ids.len();
    }
    ws.save_ledger(&mut ledger)?;
    println!(
        "Marked {} findings as {}. Score: {:.1} (strict {:.1})",
        style(resolved).cyan(),
        status,
        ledger.score,
        ledger.strict_score
    );
    Ok(())
}

pub fn ignore(ws: &Workspace, pattern: &str) -> Result<()> {
    let mut ledger = ws.load_ledger()?;
    let removed = ledger.add_ignore(pattern)?;
    ws.save_ledger(&mut ledger)?;
    println!(
        "Ignoring {}: removed {} findings",
        style(pattern).cyan(),
        style(removed).cyan()
    );
    Ok(())
}
