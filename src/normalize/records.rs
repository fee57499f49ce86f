//! Raw detector records to findings

use super::{fields_key, NormalizeContext, NormalizeReport, RawRecord};
use crate::models::{Confidence, Finding, Tier};
use crate::paths;
use rayon::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Detectors whose per-file signals merge into one `structural` finding
const STRUCTURAL_SIGNALS: &[&str] = &["large", "complexity", "gods", "concerns", "structural"];

/// Duplicate pairs where both functions are smaller than this are noise
const MIN_DUPE_LOC: u64 = 8;

type Fields = Map<String, Value>;

enum Outcome {
    Findings(Vec<Finding>),
    Suppressed,
    Malformed(String),
}

fn req_str<'a>(fields: &'a Fields, key: &str) -> Result<&'a str, String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing string field '{key}'"))
}

fn opt_str<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn req_u64(fields: &Fields, key: &str) -> Result<u64, String> {
    fields
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("missing integer field '{key}'"))
}

fn req_file(rec: &RawRecord) -> Result<&str, String> {
    if rec.file.is_empty() {
        Err("missing 'file'".to_string())
    } else {
        Ok(&rec.file)
    }
}

fn explicit_tier(fields: &Fields) -> Result<Tier, String> {
    let n = req_u64(fields, "tier")?;
    Tier::from_number(n).ok_or_else(|| format!("tier out of range: {n}"))
}

fn explicit_confidence(fields: &Fields) -> Result<Confidence, String> {
    let raw = req_str(fields, "confidence")?;
    Confidence::parse(raw).ok_or_else(|| format!("unknown confidence '{raw}'"))
}

/// Fields not already consumed into identity/tier/confidence/summary
fn leftover_detail(fields: &Fields) -> Fields {
    fields
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "name" | "tier" | "confidence" | "summary"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn detail(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn unused(rec: &RawRecord, ctx: &NormalizeContext) -> Result<Outcome, String> {
    let file = ctx.rel(req_file(rec)?);
    let name = req_str(&rec.fields, "name")?;
    let category = opt_str(&rec.fields, "category").unwrap_or("symbols");
    let tier = if category == "imports" { Tier::T1 } else { Tier::T2 };
    let finding = Finding::new(
        "unused",
        &file,
        name,
        tier,
        Confidence::High,
        format!("Unused {category}: {name}"),
    )
    .with_detail(detail(json!({
        "line": rec.fields.get("line").cloned().unwrap_or(Value::Null),
        "category": category,
    })));
    Ok(Outcome::Findings(vec![finding]))
}

fn logs(rec: &RawRecord, ctx: &NormalizeContext) -> Result<Outcome, String> {
    let file = ctx.rel(req_file(rec)?);
    let name = match (opt_str(&rec.fields, "tag"), rec.fields.get("line").and_then(Value::as_u64)) {
        (Some(tag), _) => tag.to_string(),
        (None, Some(line)) => line.to_string(),
        (None, None) => return Err("needs 'tag' or 'line'".to_string()),
    };
    let summary = match opt_str(&rec.fields, "content") {
        Some(content) => format!("Debug log: {content}"),
        None => format!("Debug log ({name})"),
    };
    let finding = Finding::new("logs", &file, &name, Tier::T1, Confidence::High, summary)
        .with_detail(leftover_detail(&rec.fields));
    Ok(Outcome::Findings(vec![finding]))
}

fn symbol_finding(
    detector: &str,
    tier: Tier,
    label: &str,
    rec: &RawRecord,
    ctx: &NormalizeContext,
) -> Result<Outcome, String> {
    let file = ctx.rel(req_file(rec)?);
    let name = req_str(&rec.fields, "name")?;
    let finding = Finding::new(
        detector,
        &file,
        name,
        tier,
        Confidence::High,
        format!("{label}: {name}"),
    )
    .with_detail(leftover_detail(&rec.fields));
    Ok(Outcome::Findings(vec![finding]))
}

struct DupeSide<'a> {
    file: String,
    name: &'a str,
    line: u64,
    loc: u64,
}

fn dupe_side<'a>(fields: &'a Fields, key: &str, ctx: &NormalizeContext) -> Result<DupeSide<'a>, String> {
    let side = fields
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| format!("missing object field '{key}'"))?;
    Ok(DupeSide {
        file: ctx.rel(req_str(side, "file")?),
        name: req_str(side, "name")?,
        line: side.get("line").and_then(Value::as_u64).unwrap_or(0),
        loc: req_u64(side, "loc")?,
    })
}

fn dupes(rec: &RawRecord, ctx: &NormalizeContext) -> Result<Outcome, String> {
    let a = dupe_side(&rec.fields, "fn_a", ctx)?;
    let b = dupe_side(&rec.fields, "fn_b", ctx)?;
    if a.loc < MIN_DUPE_LOC && b.loc < MIN_DUPE_LOC {
        return Ok(Outcome::Suppressed);
    }
    let exact = match opt_str(&rec.fields, "kind") {
        Some("exact") => true,
        Some("near") => false,
        other => return Err(format!("unknown dupe kind {other:?}")),
    };
    let similarity = rec.fields.get("similarity").and_then(Value::as_f64).unwrap_or(1.0);

    let (first, second) = if (a.file.as_str(), a.name) <= (b.file.as_str(), b.name) {
        (&a, &b)
    } else {
        (&b, &a)
    };
    let name = format!("{}::{}::{}", first.name, second.file, second.name);
    let (tier, confidence, kind) = if exact {
        (Tier::T2, Confidence::High, "Exact")
    } else {
        (Tier::T3, Confidence::Medium, "Near")
    };
    let summary = format!(
        "{kind} dupe: {} ({}:{}) <-> {} ({}:{}) [{:.0}%]",
        a.name,
        a.file,
        a.line,
        b.name,
        b.file,
        b.line,
        similarity * 100.0
    );
    let finding = Finding::new("dupes", &first.file, &name, tier, confidence, summary)
        .with_detail(leftover_detail(&rec.fields));
    Ok(Outcome::Findings(vec![finding]))
}

/// One smell record lists matches across files; findings are per
/// (file, smell).
fn smells(rec: &RawRecord, ctx: &NormalizeContext) -> Result<Outcome, String> {
    let smell_id = req_str(&rec.fields, "id")?;
    let label = opt_str(&rec.fields, "label").unwrap_or(smell_id);
    let severity = opt_str(&rec.fields, "severity").unwrap_or("medium");
    let matches = rec
        .fields
        .get("matches")
        .and_then(Value::as_array)
        .ok_or("missing array field 'matches'")?;

    let mut by_file: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for m in matches {
        let m = m.as_object().ok_or("smell match is not an object")?;
        let file = ctx.rel(req_str(m, "file")?);
        let line = m.get("line").and_then(Value::as_u64).unwrap_or(0);
        by_file.entry(file).or_default().push(line);
    }

    let tier = if severity == "high" { Tier::T2 } else { Tier::T3 };
    let confidence = if severity == "low" {
        Confidence::Low
    } else {
        Confidence::Medium
    };
    let findings = by_file
        .into_iter()
        .map(|(file, mut lines)| {
            lines.sort_unstable();
            let count = lines.len();
            lines.truncate(10);
            Finding::new(
                "smells",
                &file,
                smell_id,
                tier,
                confidence,
                format!("{count}x {label}"),
            )
            .with_detail(detail(json!({
                "smell_id": smell_id,
                "severity": severity,
                "count": count,
                "lines": lines,
            })))
        })
        .collect();
    Ok(Outcome::Findings(findings))
}

/// Detectors outside the table must carry their own tier and confidence
fn explicit(rec: &RawRecord, ctx: &NormalizeContext) -> Result<Outcome, String> {
    let file = ctx.rel(req_file(rec)?);
    let tier = explicit_tier(&rec.fields)?;
    let confidence = explicit_confidence(&rec.fields)?;
    let name = opt_str(&rec.fields, "name").unwrap_or("");
    let summary = match (opt_str(&rec.fields, "summary"), name) {
        (Some(summary), _) => summary.to_string(),
        (None, "") => format!("{} issue", rec.detector),
        (None, name) => format!("{}: {name}", rec.detector),
    };
    let finding = Finding::new(&rec.detector, &file, name, tier, confidence, summary)
        .with_detail(leftover_detail(&rec.fields));
    Ok(Outcome::Findings(vec![finding]))
}

fn normalize_one(rec: &RawRecord, ctx: &NormalizeContext) -> Outcome {
    let result = match rec.detector.as_str() {
        "unused" => unused(rec, ctx),
        "logs" => logs(rec, ctx),
        "deprecated" => symbol_finding("deprecated", Tier::T1, "Deprecated", rec, ctx),
        "exports" => symbol_finding("exports", Tier::T2, "Unused export", rec, ctx),
        "dupes" => dupes(rec, ctx),
        "smells" => smells(rec, ctx),
        "" => Err("missing detector name".to_string()),
        _ => explicit(rec, ctx),
    };
    result.unwrap_or_else(Outcome::Malformed)
}

#[derive(Default)]
struct SignalGroup {
    signals: BTreeSet<String>,
    detail: Fields,
}

/// Merge per-file complexity signals: 3+ signals is a decomposition job
fn structural(records: &[&RawRecord], ctx: &NormalizeContext) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    let mut sorted: Vec<&RawRecord> = records.to_vec();
    sorted.sort_by(|a, b| {
        (a.file.as_str(), a.detector.as_str())
            .cmp(&(b.file.as_str(), b.detector.as_str()))
            .then_with(|| opt_str(&a.fields, "signal").cmp(&opt_str(&b.fields, "signal")))
            .then_with(|| fields_key(&a.fields).cmp(&fields_key(&b.fields)))
    });

    let mut groups: BTreeMap<String, SignalGroup> = BTreeMap::new();
    for rec in sorted {
        let file = match req_file(rec) {
            Ok(file) => ctx.rel(file),
            Err(reason) => {
                warn!("Skipping malformed {} record: {}", rec.detector, reason);
                report.skipped += 1;
                continue;
            }
        };
        let signal = opt_str(&rec.fields, "signal")
            .map(str::to_string)
            .unwrap_or_else(|| rec.detector.clone());
        let group = groups.entry(file).or_default();
        group.signals.insert(signal);
        for (k, v) in &rec.fields {
            if k != "signal" {
                group.detail.insert(k.clone(), v.clone());
            }
        }
    }

    for (file, mut group) in groups {
        let count = group.signals.len();
        let (tier, confidence) = if count >= 3 {
            (Tier::T4, Confidence::High)
        } else {
            (Tier::T3, Confidence::Medium)
        };
        let signals: Vec<String> = group.signals.into_iter().collect();
        let summary = format!("Needs decomposition: {}", signals.join(" / "));
        group.detail.insert("signals".to_string(), json!(signals));
        report.findings.push(
            Finding::new("structural", &file, "", tier, confidence, summary)
                .with_detail(group.detail),
        );
    }
    report
}

/// Normalize raw detector records. Structural signals are grouped per file
/// first; every other record maps independently and runs in parallel.
pub fn normalize_records(records: &[RawRecord], ctx: &NormalizeContext) -> NormalizeReport {
    let (signal_records, other): (Vec<&RawRecord>, Vec<&RawRecord>) = records
        .iter()
        .partition(|r| STRUCTURAL_SIGNALS.contains(&r.detector.as_str()));

    let outcomes: Vec<Outcome> = other
        .par_iter()
        .map(|rec| normalize_one(rec, ctx))
        .collect();

    let mut report = structural(&signal_records, ctx);
    for (rec, outcome) in other.iter().zip(outcomes) {
        match outcome {
            Outcome::Findings(findings) => report.findings.extend(findings),
            Outcome::Suppressed => report.suppressed += 1,
            Outcome::Malformed(reason) => {
                warn!(
                    "Skipping malformed {} record for {:?}: {}",
                    rec.detector, rec.file, reason
                );
                report.skipped += 1;
            }
        }
    }

    debug!(
        "{} raw records -> {} findings",
        records.len(),
        report.findings.len()
    );
    report
}
