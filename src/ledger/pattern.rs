//! Finding patterns shared by ignore, resolve and match
//!
//! Grammar, tried in order:
//! - exact finding id
//! - glob (contains `*`): matched against the id or the file
//! - id prefix (contains `::`), e.g. `logs::` or `unused::src/a.py`
//! - bare detector name, e.g. `unused`
//! - file path, exact or as a directory prefix
//!
//! Ignore rules use a narrower reading: a glob is matched against the id
//! when it contains `::` and against the file otherwise, and a plain
//! pattern only matches the exact file.

use crate::errors::{LedgerError, LedgerResult};
use crate::models::Finding;
use crate::paths;
use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

#[derive(Debug, Clone)]
enum Kind {
    Glob(GlobMatcher),
    IdPrefix,
    Plain,
}

#[derive(Debug, Clone)]
pub struct FindingPattern {
    raw: String,
    kind: Kind,
}

impl FindingPattern {
    /// Validate and compile a pattern. Empty patterns and malformed globs
    /// are rejected.
    pub fn parse(raw: &str) -> LedgerResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }
        let kind = if trimmed.contains('*') {
            // `*` crosses `/` so `src/*` covers nested files
            let glob = GlobBuilder::new(trimmed)
                .literal_separator(false)
                .build()
                .map_err(|e| LedgerError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: e.kind().to_string(),
                })?;
            Kind::Glob(glob.compile_matcher())
        } else if trimmed.contains("::") {
            Kind::IdPrefix
        } else {
            Kind::Plain
        };
        Ok(Self {
            raw: trimmed.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Full grammar, used by resolve and match
    pub fn matches(&self, finding: &Finding) -> bool {
        if finding.id == self.raw {
            return true;
        }
        match &self.kind {
            Kind::Glob(glob) => glob.is_match(&finding.id) || glob.is_match(&finding.file),
            Kind::IdPrefix => finding.id.starts_with(&self.raw),
            Kind::Plain => {
                finding.detector == self.raw || paths::is_within(&finding.file, &self.raw)
            }
        }
    }

    /// Ignore grammar: exact file, id prefix, or glob
    pub fn ignores(&self, id: &str, file: &str) -> bool {
        match &self.kind {
            Kind::Glob(glob) => {
                let target = if self.raw.contains("::") { id } else { file };
                glob.is_match(target)
            }
            Kind::IdPrefix => id.starts_with(&self.raw),
            Kind::Plain => file == self.raw || file == self.raw.trim_start_matches("./"),
        }
    }
}

/// Compiled ignore list from a ledger's config
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<FindingPattern>,
}

impl IgnoreSet {
    /// Patterns were validated when added; anything unparsable in a
    /// hand-edited ledger is logged and skipped.
    pub fn compile(raw: &[String]) -> Self {
        let patterns = raw
            .iter()
            .filter_map(|p| match FindingPattern::parse(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid ignore pattern: {}", e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_ignored(&self, id: &str, file: &str) -> bool {
        self.patterns.iter().any(|p| p.ignores(id, file))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Tier};

    fn finding(detector: &str, file: &str, name: &str) -> Finding {
        Finding::new(detector, file, name, Tier::T1, Confidence::High, "x")
    }

    #[test]
    fn test_match_grammar() {
        let f = finding("unused", "src/pkg/a.py", "os");
        let yes = [
            "unused::src/pkg/a.py::os",
            "unused::*",
            "*a.py*",
            "src/*",
            "unused::src/",
            "unused",
            "src/pkg",
            "src/pkg/",
            "src/pkg/a.py",
        ];
        for p in yes {
            assert!(FindingPattern::parse(p).unwrap().matches(&f), "{p}");
        }
        let no = ["logs", "logs::*", "src/pk", "unused::lib/", "lib/*"];
        for p in no {
            assert!(!FindingPattern::parse(p).unwrap().matches(&f), "{p}");
        }
    }

    #[test]
    fn test_ignore_grammar() {
        let ignore = |p: &str, id: &str, file: &str| FindingPattern::parse(p).unwrap().ignores(id, file);
        assert!(ignore("logs::*", "logs::a.py::3", "a.py"));
        assert!(!ignore("logs::*", "unused::a.py::os", "a.py"));
        assert!(ignore("vendor/*", "unused::vendor/x.py::os", "vendor/x.py"));
        assert!(ignore("smells::", "smells::a.py::todo", "a.py"));
        assert!(ignore("a.py", "unused::a.py::os", "a.py"));
        assert!(ignore("./a.py", "unused::a.py::os", "a.py"));
        // A plain ignore is an exact file, not a directory or detector
        assert!(!ignore("src", "unused::src/a.py::os", "src/a.py"));
        assert!(!ignore("unused", "unused::a.py::os", "a.py"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(matches!(
            FindingPattern::parse("  "),
            Err(LedgerError::InvalidPattern { .. })
        ));
        assert!(matches!(
            FindingPattern::parse("src/[abc*"),
            Err(LedgerError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_ignore_set_skips_invalid() {
        let set = IgnoreSet::compile(&["[bad*".to_string(), "logs::*".to_string()]);
        assert!(!set.is_empty());
        assert!(set.is_ignored("logs::a.py::1", "a.py"));
    }
}
