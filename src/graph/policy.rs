//! Externally injected policy for the graph analyses
//!
//! The algorithms are language-agnostic; everything language-specific
//! (what counts as an entry point, which file names are barrels, which
//! directories must not depend on each other) is configuration.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `protected/` files must not import `forbidden_from/` files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryRule {
    /// Relative path prefix, e.g. `shared/`
    pub protected: String,
    /// Relative path prefix, e.g. `tools/`
    pub forbidden_from: String,
    #[serde(default)]
    pub label: String,
}

impl BoundaryRule {
    pub fn new(protected: &str, forbidden_from: &str, label: &str) -> Self {
        Self {
            protected: protected.to_string(),
            forbidden_from: forbidden_from.to_string(),
            label: label.to_string(),
        }
    }

    /// Label for display, derived from the prefixes when unset
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!(
                "{}→{}",
                self.protected.trim_end_matches('/'),
                self.forbidden_from.trim_end_matches('/')
            )
        } else {
            self.label.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphPolicy {
    /// Substrings of relative paths that mark entry points
    pub entry_patterns: Vec<String>,
    /// File names of re-export-only modules
    pub barrel_names: BTreeSet<String>,
    pub boundaries: Vec<BoundaryRule>,
    /// Directory whose direct children are independent modules
    pub cross_module_prefix: Option<String>,
    pub min_orphan_loc: usize,
    pub single_use_min_loc: usize,
    pub single_use_max_loc: usize,
    pub skip_deferred_cycles: bool,
}

impl Default for GraphPolicy {
    fn default() -> Self {
        Self {
            entry_patterns: Vec::new(),
            barrel_names: BTreeSet::new(),
            boundaries: Vec::new(),
            cross_module_prefix: None,
            min_orphan_loc: 10,
            single_use_min_loc: 20,
            single_use_max_loc: 300,
            skip_deferred_cycles: true,
        }
    }
}

impl GraphPolicy {
    pub fn is_barrel(&self, path: &str) -> bool {
        self.barrel_names.contains(paths::file_name(path))
    }

    pub fn is_entry(&self, rel_path: &str) -> bool {
        self.entry_patterns
            .iter()
            .any(|pattern| rel_path.contains(pattern.as_str()))
    }
}
