//! Core data models for healthledger
//!
//! A `Finding` is a normalized issue with a stable identity and a
//! lifecycle. Findings are owned by the [`Ledger`](crate::ledger::Ledger);
//! everything else works on borrowed views or clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Build the deterministic identity of a finding.
///
/// The id only depends on the detector, the file path relative to the
/// project root and an optional name, so it is stable across runs and
/// independent of the order in which detectors report:
///
/// - `detector::relative_file` when `name` is empty
/// - `detector::relative_file::name` otherwise
pub fn finding_id(detector: &str, rel_file: &str, name: &str) -> String {
    if name.is_empty() {
        format!("{detector}::{rel_file}")
    } else {
        format!("{detector}::{rel_file}::{name}")
    }
}

/// Severity/effort class. T1 is mechanical cleanup, T4 a major structural
/// refactor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    T1,
    T2,
    #[default]
    T3,
    T4,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::T1, Tier::T2, Tier::T3, Tier::T4];

    pub fn number(self) -> u8 {
        match self {
            Tier::T1 => 1,
            Tier::T2 => 2,
            Tier::T3 => 3,
            Tier::T4 => 4,
        }
    }

    /// Scoring weight. Structural issues dominate mechanical ones.
    pub fn weight(self) -> u32 {
        u32::from(self.number())
    }

    pub fn from_number(n: u64) -> Option<Tier> {
        match n {
            1 => Some(Tier::T1),
            2 => Some(Tier::T2),
            3 => Some(Tier::T3),
            4 => Some(Tier::T4),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::from_number(u64::from(value)).ok_or_else(|| format!("tier must be 1-4, got {value}"))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.number()
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.number())
    }
}

/// How sure the detector is about a finding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    /// Weight of one failing finding in dimension scoring
    pub fn weight(self) -> f64 {
        match self {
            Confidence::High => 1.0,
            Confidence::Medium => 0.7,
            Confidence::Low => 0.3,
        }
    }

    pub fn parse(s: &str) -> Option<Confidence> {
        match s.to_lowercase().as_str() {
            "high" => Some(Confidence::High),
            "medium" => Some(Confidence::Medium),
            "low" => Some(Confidence::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Lifecycle status of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    Fixed,
    Wontfix,
    FalsePositive,
    AutoResolved,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Open,
        Status::Fixed,
        Status::Wontfix,
        Status::FalsePositive,
        Status::AutoResolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Fixed => "fixed",
            Status::Wontfix => "wontfix",
            Status::FalsePositive => "false_positive",
            Status::AutoResolved => "auto_resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        Status::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// Anything but open counts as addressed for the lenient score
    pub fn is_addressed(self) -> bool {
        self != Status::Open
    }

    /// Genuinely resolved: wontfix does not count
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            Status::Fixed | Status::AutoResolved | Status::FalsePositive
        )
    }

    /// Statuses a human may set through `resolve_findings`
    pub fn is_manual_resolution(self) -> bool {
        matches!(
            self,
            Status::Fixed | Status::Wontfix | Status::FalsePositive
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized issue with persistent identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub detector: String,
    /// Path relative to the project root
    pub file: String,
    pub tier: Tier,
    pub confidence: Confidence,
    pub summary: String,
    #[serde(default)]
    pub detail: Map<String, Value>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub note: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reopen_count: u32,
    #[serde(default)]
    pub lang: Option<String>,
}

impl Finding {
    /// Create an open finding with a stable id. `file` must already be
    /// relative to the project root.
    pub fn new(
        detector: &str,
        rel_file: &str,
        name: &str,
        tier: Tier,
        confidence: Confidence,
        summary: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: finding_id(detector, rel_file, name),
            detector: detector.to_string(),
            file: rel_file.to_string(),
            tier,
            confidence,
            summary: summary.into(),
            detail: Map::new(),
            status: Status::Open,
            note: None,
            first_seen: now,
            last_seen: now,
            resolved_at: None,
            reopen_count: 0,
            lang: None,
        }
    }

    pub fn with_detail(mut self, detail: Map<String, Value>) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Integer `detail.count`, used as a priority tie-breaker
    pub fn detail_count(&self) -> u64 {
        self.detail
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_id_with_and_without_name() {
        assert_eq!(finding_id("orphaned", "src/a.py", ""), "orphaned::src/a.py");
        assert_eq!(
            finding_id("unused", "src/a.py", "os"),
            "unused::src/a.py::os"
        );
    }

    #[test]
    fn test_tier_weights_are_monotonic() {
        let weights: Vec<u32> = Tier::ALL.iter().map(|t| t.weight()).collect();
        assert_eq!(weights, vec![1, 2, 3, 4]);
        assert!(Tier::T4 > Tier::T1);
    }

    #[test]
    fn test_tier_serde_rejects_out_of_range() {
        assert_eq!(serde_json::to_string(&Tier::T2).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Tier>("4").unwrap(), Tier::T4);
        assert!(serde_json::from_str::<Tier>("5").is_err());
        assert!(serde_json::from_str::<Tier>("0").is_err());
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in Status::ALL {
            assert_eq!(Status::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!(Status::Wontfix.is_addressed());
        assert!(!Status::Wontfix.is_resolved());
        assert!(Status::FalsePositive.is_resolved());
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse("HIGH"), Some(Confidence::High));
        assert_eq!(Confidence::parse("nope"), None);
        assert!(Confidence::High.weight() > Confidence::Low.weight());
    }
}
