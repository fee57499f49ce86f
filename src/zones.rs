//! File zone classification
//!
//! Every scanned file belongs to one zone. Zones decide which findings are
//! worth tracking: vendored and generated code is dropped entirely, and
//! orphan/single-use analysis only applies to production files.
//!
//! Rules are checked in order and the first match wins; per-file overrides
//! stored in the ledger beat every rule.

use crate::errors::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    #[default]
    Production,
    Test,
    Config,
    Generated,
    Script,
    Vendor,
}

impl Zone {
    pub const ALL: [Zone; 6] = [
        Zone::Production,
        Zone::Test,
        Zone::Config,
        Zone::Generated,
        Zone::Script,
        Zone::Vendor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Zone::Production => "production",
            Zone::Test => "test",
            Zone::Config => "config",
            Zone::Generated => "generated",
            Zone::Script => "script",
            Zone::Vendor => "vendor",
        }
    }

    pub fn parse(s: &str) -> LedgerResult<Zone> {
        Zone::ALL
            .into_iter()
            .find(|z| z.as_str() == s)
            .ok_or_else(|| LedgerError::InvalidZone(s.to_string()))
    }

    /// Findings in these zones are never tracked
    pub fn is_excluded(self) -> bool {
        matches!(self, Zone::Vendor | Zone::Generated)
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A zone and the path patterns that select it.
///
/// Pattern forms, matched against the relative path:
/// - contains `/` (`tests/`, `/migrations/`): directory match, anywhere in the path
/// - starts with `.` (`.d.ts`, `.min.js`): suffix match
/// - anything else (`test_`, `conftest`): substring of the file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRule {
    pub zone: Zone,
    pub patterns: Vec<String>,
}

impl ZoneRule {
    pub fn new(zone: Zone, patterns: &[&str]) -> Self {
        Self {
            zone,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns.iter().any(|p| pattern_matches(p, rel_path))
    }
}

fn pattern_matches(pattern: &str, rel_path: &str) -> bool {
    if pattern.contains('/') {
        let dir = pattern.trim_matches('/');
        if dir.is_empty() {
            return false;
        }
        let padded = format!("/{rel_path}");
        padded.contains(&format!("/{dir}/"))
    } else if pattern.starts_with('.') {
        rel_path.ends_with(pattern)
    } else {
        crate::paths::file_name(rel_path).contains(pattern)
    }
}

/// Rules shared by every language, checked after the language's own rules
pub fn common_zone_rules() -> Vec<ZoneRule> {
    vec![
        ZoneRule::new(
            Zone::Vendor,
            &["vendor/", "third_party/", "node_modules/", "site-packages/"],
        ),
        ZoneRule::new(
            Zone::Generated,
            &["generated/", "__generated__/", "generated.", "_pb2.py", ".min.js"],
        ),
        ZoneRule::new(Zone::Test, &["tests/", "test/", "__tests__/", "spec/"]),
        ZoneRule::new(Zone::Script, &["scripts/", "bin/"]),
    ]
}

/// Zone assignment for one scan
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    rules: Vec<ZoneRule>,
    overrides: BTreeMap<String, Zone>,
}

impl ZoneMap {
    pub fn new(rules: Vec<ZoneRule>, overrides: &BTreeMap<String, String>) -> Self {
        // Overrides were validated when set; unknown values are ignored
        let overrides = overrides
            .iter()
            .filter_map(|(file, zone)| Zone::parse(zone).ok().map(|z| (file.clone(), z)))
            .collect();
        Self { rules, overrides }
    }

    pub fn zone_of(&self, rel_path: &str) -> Zone {
        if let Some(zone) = self.overrides.get(rel_path) {
            return *zone;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(rel_path))
            .map(|rule| rule.zone)
            .unwrap_or_default()
    }

    /// Group files by zone for display
    pub fn classify<'a>(&self, files: impl IntoIterator<Item = &'a str>) -> BTreeMap<Zone, Vec<String>> {
        let mut out: BTreeMap<Zone, Vec<String>> = BTreeMap::new();
        for file in files {
            out.entry(self.zone_of(file)).or_default().push(file.to_string());
        }
        for files in out.values_mut() {
            files.sort();
        }
        out
    }
}
