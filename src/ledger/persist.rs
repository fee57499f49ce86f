//! Ledger persistence
//!
//! The ledger is one pretty-printed JSON document. Writes go to a temp
//! file first and are renamed into place, so a failed write never leaves a
//! truncated ledger behind. Documents carry a `version`; older versions
//! are migrated on load and newer ones are rejected.

use super::Ledger;
use crate::errors::{LedgerError, LedgerResult};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Current document version
pub const LEDGER_VERSION: u64 = 2;

/// Load a ledger. A missing file yields a fresh ledger.
pub fn load(path: &Path) -> LedgerResult<Ledger> {
    if !path.exists() {
        debug!("No ledger at {}, starting fresh", path.display());
        return Ok(Ledger::new());
    }
    let content = fs::read_to_string(path).map_err(|source| LedgerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc: Value = serde_json::from_str(&content).map_err(|source| LedgerError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    // Version 1 documents predate the field defaulting
    let version = doc.get("version").and_then(Value::as_u64).unwrap_or(1);
    if version > LEDGER_VERSION {
        return Err(LedgerError::UnsupportedVersion {
            found: version,
            supported: LEDGER_VERSION,
        });
    }
    let migrated = version < LEDGER_VERSION;
    if migrated {
        migrate_v1(&mut doc);
    }

    let mut ledger: Ledger = serde_json::from_value(doc).map_err(|source| LedgerError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if migrated {
        info!("Migrated ledger {} from version {}", path.display(), version);
        ledger.recompute();
    }
    Ok(ledger)
}

/// Recompute stats and scores, then write atomically
pub fn save(ledger: &mut Ledger, path: &Path) -> LedgerResult<()> {
    ledger.recompute();
    ledger.version = LEDGER_VERSION;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LedgerError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut json = serde_json::to_string_pretty(ledger).map_err(|e| LedgerError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    json.push('\n');

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).map_err(|source| LedgerError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| LedgerError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Saved ledger to {}", path.display());
    Ok(())
}

fn migrate_finding(id: &str, finding: &mut Map<String, Value>, fallback_time: &Value) {
    finding.entry("id").or_insert_with(|| json!(id));
    let detector = id.split("::").next().unwrap_or_default().to_string();
    finding.entry("detector").or_insert_with(|| json!(detector));
    finding.entry("file").or_insert_with(|| json!(""));
    finding.entry("summary").or_insert_with(|| json!(""));
    finding.entry("first_seen").or_insert_with(|| fallback_time.clone());
    finding.entry("last_seen").or_insert_with(|| fallback_time.clone());
    finding.entry("reopen_count").or_insert_with(|| json!(0));

    let tier_ok = finding
        .get("tier")
        .and_then(Value::as_u64)
        .is_some_and(|t| (1..=4).contains(&t));
    if !tier_ok {
        finding.insert("tier".into(), json!(3));
    }
    let confidence_ok = matches!(
        finding.get("confidence").and_then(Value::as_str),
        Some("high" | "medium" | "low")
    );
    if !confidence_ok {
        finding.insert("confidence".into(), json!("medium"));
    }
    // Early ledgers used a single "resolved" status
    if finding.get("status").and_then(Value::as_str) == Some("resolved") {
        finding.insert("status".into(), json!("fixed"));
    }
    if finding.get("detail").is_some_and(|d| !d.is_object()) {
        finding.insert("detail".into(), json!({}));
    }
}

/// Version 1 history entries may lack a timestamp and may record a
/// dimension as a bare score. Entries that are not objects are dropped.
fn migrate_history(history: &mut Vec<Value>, fallback_time: &Value) {
    history.retain(Value::is_object);
    for entry in history.iter_mut().filter_map(Value::as_object_mut) {
        if !entry.get("timestamp").is_some_and(Value::is_string) {
            entry.insert("timestamp".into(), fallback_time.clone());
        }
        match entry.get_mut("dimension_scores") {
            Some(Value::Object(dims)) => {
                for value in dims.values_mut() {
                    if let Some(score) = value.as_f64() {
                        *value = json!({"score": score, "strict": score});
                    }
                }
                dims.retain(|_, v| v.is_object());
            }
            Some(_) => {
                entry.remove("dimension_scores");
            }
            None => {}
        }
    }
}

/// Fill in everything version 1 left out. Derived fields (stats, scores,
/// dimension scores) are dropped and recomputed after loading; scan history
/// is kept.
fn migrate_v1(doc: &mut Value) {
    let Some(root) = doc.as_object_mut() else {
        return;
    };
    root.insert("version".into(), json!(LEDGER_VERSION));
    let created = root
        .get("created")
        .filter(|v| v.is_string())
        .cloned()
        .unwrap_or_else(|| json!(Utc::now().to_rfc3339()));
    root.insert("created".into(), created.clone());

    for key in ["stats", "dimension_scores", "objective_score", "objective_strict"] {
        root.remove(key);
    }

    match root.get_mut("scan_history") {
        Some(Value::Array(history)) => migrate_history(history, &created),
        Some(_) => {
            root.remove("scan_history");
        }
        None => {}
    }

    if let Some(findings) = root.get_mut("findings").and_then(Value::as_object_mut) {
        for (id, finding) in findings.iter_mut() {
            if let Some(obj) = finding.as_object_mut() {
                migrate_finding(id, obj, &created);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Status, Tier};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_fresh_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger = load(&dir.path().join("state.json")).unwrap();
        assert_eq!(ledger.version, LEDGER_VERSION);
        assert!(ledger.findings.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut ledger = Ledger::new();
        let f = crate::models::Finding::new("unused", "a.py", "os", Tier::T1, Confidence::High, "x");
        ledger.findings.insert(f.id.clone(), f);
        ledger.add_ignore("vendor/*").unwrap();

        save(&mut ledger, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(loaded.stats.total, 1);
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"version": 9, "findings": {}}"#).unwrap();
        assert!(matches!(
            load(&path),
            Err(LedgerError::UnsupportedVersion { found: 9, supported: 2 })
        ));
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(LedgerError::Parse { .. })));
    }

    #[test]
    fn test_v1_document_migrates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{
                "version": 1,
                "created": "2024-03-01T10:00:00+00:00",
                "last_scan": null,
                "scan_count": 4,
                "config": {"ignore": ["logs::*"]},
                "score": 12,
                "stats": {"open": 2},
                "scan_history": [
                    {"timestamp": "2024-03-01T10:00:00+00:00", "score": 10, "strict_score": 10,
                     "open": 2, "dimension_scores": {"Import hygiene": 80}},
                    {"score": 12, "strict_score": 12, "open": 2},
                    "garbage"
                ],
                "findings": {
                    "unused::a.py::os": {
                        "id": "unused::a.py::os", "detector": "unused", "file": "a.py",
                        "tier": 1, "confidence": "high", "summary": "Unused import: os",
                        "detail": {}, "status": "open", "note": null,
                        "first_seen": "2024-03-01T10:00:00+00:00",
                        "last_seen": "2024-03-02T10:00:00+00:00",
                        "resolved_at": null
                    },
                    "smells::b.py::todo": {
                        "file": "b.py", "summary": "3x TODO", "status": "resolved"
                    }
                }
            }"#,
        )
        .unwrap();

        let ledger = load(&path).unwrap();
        assert_eq!(ledger.version, LEDGER_VERSION);
        assert_eq!(ledger.scan_count, 4);
        assert_eq!(ledger.config.ignore, vec!["logs::*"]);

        let smell = &ledger.findings["smells::b.py::todo"];
        assert_eq!(smell.detector, "smells");
        assert_eq!(smell.tier, Tier::T3);
        assert_eq!(smell.confidence, Confidence::Medium);
        assert_eq!(smell.status, Status::Fixed);
        assert_eq!(smell.reopen_count, 0);

        // Recorded history survives the migration
        assert_eq!(ledger.scan_history.len(), 2);
        assert_eq!(ledger.scan_history[0].score, 10.0);
        assert_eq!(ledger.scan_history[0].dimension_scores["Import hygiene"].strict, 80.0);
        assert_eq!(ledger.scan_history[1].timestamp.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        // Recomputed, not carried over
        assert_eq!(ledger.stats.total, 2);
        assert_eq!(ledger.stats.counts.open, 1);
        assert_eq!(ledger.score, 75.0);
    }
}
