//! Finding normalization
//!
//! Pure transform from raw detector records and graph-analysis entries to
//! canonical [`Finding`]s. Identity comes from [`finding_id`]; tier and
//! confidence come from a per-detector policy table.
//!
//! Malformed records are logged and skipped, never fatal. Records are
//! processed in parallel and the output is sorted by id and de-duplicated,
//! so the resulting set does not depend on input order.
//!
//! [`finding_id`]: crate::models::finding_id

mod graph;
mod records;

pub use graph::normalize_graph;
pub use records::normalize_records;

use crate::models::Finding;
use crate::paths::rel_path;
use crate::zones::{Zone, ZoneMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// A record as emitted by an external detector. Only `detector` is
/// universal; the remaining fields depend on the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub detector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(detector: &str, file: &str, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            detector: detector.to_string(),
            file: file.to_string(),
            fields,
        }
    }
}

/// Where and for which language the records were produced
#[derive(Debug, Clone, Default)]
pub struct NormalizeContext {
    /// Project root; record paths are made relative to it
    pub root: String,
    pub lang: Option<String>,
    pub zones: ZoneMap,
}

impl NormalizeContext {
    pub fn new(root: impl Into<String>, lang: Option<&str>, zones: ZoneMap) -> Self {
        Self {
            root: root.into(),
            lang: lang.map(str::to_string),
            zones,
        }
    }

    pub fn rel(&self, path: &str) -> String {
        rel_path(&self.root, path)
    }

    pub fn zone_of(&self, path: &str) -> Zone {
        self.zones.zone_of(&self.rel(path))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub findings: Vec<Finding>,
    /// Malformed records
    pub skipped: usize,
    /// Well-formed records dropped by policy (tiny dupes, right-sized
    /// single-use files, vendored files)
    pub suppressed: usize,
}

impl NormalizeReport {
    pub(crate) fn absorb(&mut self, other: NormalizeReport) {
        self.findings.extend(other.findings);
        self.skipped += other.skipped;
        self.suppressed += other.suppressed;
    }

    /// Drop findings in excluded zones, tag the language, then sort by id
    /// and keep one finding per id.
    pub(crate) fn finish(mut self, ctx: &NormalizeContext) -> NormalizeReport {
        let before = self.findings.len();
        self.findings
            .retain(|f| !ctx.zones.zone_of(&f.file).is_excluded());
        self.suppressed += before - self.findings.len();

        if let Some(lang) = &ctx.lang {
            for finding in &mut self.findings {
                finding.lang = Some(lang.clone());
            }
        }

        self.findings.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then_with(|| a.tier.cmp(&b.tier))
                .then_with(|| a.confidence.cmp(&b.confidence))
                .then_with(|| a.summary.cmp(&b.summary))
                .then_with(|| fields_key(&a.detail).cmp(&fields_key(&b.detail)))
        });
        self.findings.dedup_by(|later, earlier| later.id == earlier.id);
        self
    }
}

/// Canonical text of a field map, for total-order tie-breaks
pub(crate) fn fields_key(fields: &Map<String, Value>) -> String {
    Value::Object(fields.clone()).to_string()
}

/// Normalize one scan's worth of input
pub fn normalize(
    records: &[RawRecord],
    analysis: &crate::graph::GraphAnalysis,
    ctx: &NormalizeContext,
) -> NormalizeReport {
    let mut report = normalize_records(records, ctx);
    report.absorb(normalize_graph(analysis, ctx));
    let report = report.finish(ctx);
    info!(
        "Normalized {} findings ({} malformed records skipped, {} suppressed)",
        report.findings.len(),
        report.skipped,
        report.suppressed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphAnalysis;
    use crate::zones::common_zone_rules;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn ctx() -> NormalizeContext {
        NormalizeContext::new(
            "/repo",
            Some("python"),
            ZoneMap::new(common_zone_rules(), &BTreeMap::new()),
        )
    }

    #[test]
    fn test_raw_record_flattens_fields() {
        let rec: RawRecord = serde_json::from_value(json!({
            "detector": "unused", "file": "/repo/a.py", "name": "os", "line": 3
        }))
        .unwrap();
        assert_eq!(rec.detector, "unused");
        assert_eq!(rec.fields["name"], json!("os"));
        assert!(!rec.fields.contains_key("detector"));
    }

    #[test]
    fn test_vendor_findings_dropped_and_lang_tagged() {
        let records = vec![
            RawRecord::new("logs", "/repo/vendor/x.py", json!({"line": 4})),
            RawRecord::new("logs", "/repo/app.py", json!({"line": 9})),
        ];
        let report = normalize(&records, &GraphAnalysis::default(), &ctx());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].file, "app.py");
        assert_eq!(report.findings[0].lang.as_deref(), Some("python"));
        assert_eq!(report.suppressed, 1);
    }

    #[test]
    fn test_output_is_order_invariant() {
        let mut records = vec![
            RawRecord::new("unused", "/repo/a.py", json!({"name": "os", "category": "imports"})),
            RawRecord::new("logs", "/repo/b.py", json!({"line": 2})),
            RawRecord::new("exports", "/repo/c.py", json!({"name": "helper"})),
            RawRecord::new("unused", "/repo/a.py", json!({"name": "os", "category": "imports"})),
        ];
        let forward = normalize(&records, &GraphAnalysis::default(), &ctx());
        records.reverse();
        let backward = normalize(&records, &GraphAnalysis::default(), &ctx());

        let ids = |r: &NormalizeReport| r.findings.iter().map(|f| f.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&forward), ids(&backward));
        assert_eq!(
            ids(&forward),
            vec!["exports::c.py::helper", "logs::b.py::2", "unused::a.py::os"]
        );
    }

    #[test]
    fn test_duplicate_ids_keep_the_same_detail() {
        let mut records = vec![
            RawRecord::new("exports", "/repo/c.py", json!({"name": "helper", "line": 9})),
            RawRecord::new("exports", "/repo/c.py", json!({"name": "helper", "line": 4})),
        ];
        let forward = normalize(&records, &GraphAnalysis::default(), &ctx());
        records.reverse();
        let backward = normalize(&records, &GraphAnalysis::default(), &ctx());

        assert_eq!(forward.findings.len(), 1);
        assert_eq!(forward.findings[0].detail, backward.findings[0].detail);
        assert_eq!(forward.findings[0].detail["line"], json!(4));
    }
}
