//! Project-level configuration support
//!
//! Loads per-project configuration from `healthledger.toml` in the
//! repository root.
//!
//! # Configuration Format
//!
//! ```toml
//! # healthledger.toml
//! state_path = ".healthledger/state.json"
//!
//! [exclude]
//! paths = ["node_modules", "dist"]
//!
//! [languages.python]
//! extensions = ["py"]
//! manifest = ".healthledger/imports.python.json"
//! entry_patterns = ["__main__", "conftest", "manage.py"]
//! barrel_names = ["__init__.py"]
//!
//! [[languages.python.boundaries]]
//! protected = "shared/"
//! forbidden_from = "tools/"
//! label = "shared→tools"
//!
//! [[languages.python.zones]]
//! zone = "test"
//! patterns = ["tests/", "test_"]
//! ```
//!
//! `python`, `typescript` and `go` have built-in defaults. A configured
//! language with one of those names is layered on top of the defaults;
//! any other name defines a new language.

use crate::graph::{BoundaryRule, GraphPolicy};
use crate::zones::{Zone, ZoneRule};
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "healthledger.toml";

/// Ledger location relative to the repository root
pub const DEFAULT_STATE_PATH: &str = ".healthledger/state.json";

/// Built-in languages in auto-detection order
const BUILTIN_LANGUAGES: &[&str] = &["typescript", "python", "go"];

/// Scan exclusions
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ExcludeConfig {
    /// Path substrings or globs
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Settings for one language
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct LanguageConfig {
    /// File extensions without the dot
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Import manifest written by the language's graph builder
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    #[serde(default)]
    pub entry_patterns: Vec<String>,

    #[serde(default)]
    pub barrel_names: Vec<String>,

    #[serde(default)]
    pub boundaries: Vec<BoundaryRule>,

    /// Checked before the rules shared by all languages
    #[serde(default)]
    pub zones: Vec<ZoneRule>,

    #[serde(default)]
    pub cross_module_prefix: Option<String>,

    /// Files at the repository root that identify a project in this language
    #[serde(default)]
    pub markers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl LanguageConfig {
    /// Defaults for a built-in language
    pub fn builtin(name: &str) -> Option<LanguageConfig> {
        let config = match name {
            "python" => LanguageConfig {
                extensions: strings(&["py"]),
                entry_patterns: strings(&[
                    "__main__",
                    "conftest",
                    "manage.py",
                    "setup.py",
                    "wsgi",
                    "asgi",
                    "cli.py",
                ]),
                barrel_names: strings(&["__init__.py"]),
                zones: vec![
                    ZoneRule::new(Zone::Test, &["test_", "_test.py", "conftest"]),
                    ZoneRule::new(Zone::Config, &["setup.py", "settings.py", "config.py"]),
                    ZoneRule::new(Zone::Generated, &["migrations/"]),
                ],
                markers: strings(&["pyproject.toml", "setup.py", "setup.cfg"]),
                ..Default::default()
            },
            "typescript" => LanguageConfig {
                extensions: strings(&["ts", "tsx", "js", "jsx"]),
                entry_patterns: strings(&[
                    "main.",
                    "index.",
                    "App.",
                    "vite.config",
                    "next.config",
                    "pages/",
                    "app/",
                ]),
                barrel_names: strings(&["index.ts", "index.tsx", "index.js", "index.jsx"]),
                zones: vec![
                    ZoneRule::new(
                        Zone::Test,
                        &[".test.ts", ".test.tsx", ".spec.ts", ".spec.tsx", ".test.js", ".spec.js"],
                    ),
                    ZoneRule::new(Zone::Config, &[".config.ts", ".config.js", ".config.mjs"]),
                    ZoneRule::new(Zone::Generated, &[".d.ts"]),
                ],
                markers: strings(&["package.json"]),
                ..Default::default()
            },
            "go" => LanguageConfig {
                extensions: strings(&["go"]),
                entry_patterns: strings(&["main.go"]),
                zones: vec![ZoneRule::new(Zone::Test, &["_test.go"])],
                markers: strings(&["go.mod"]),
                ..Default::default()
            },
            _ => return None,
        };
        Some(config)
    }

    /// Layer configured settings on top of these. Non-empty lists and set
    /// options replace; boundaries and zone rules are appended, with the
    /// configured zone rules checked first.
    pub fn overlay(mut self, other: &LanguageConfig) -> LanguageConfig {
        if !other.extensions.is_empty() {
            self.extensions = other.extensions.clone();
        }
        if other.manifest.is_some() {
            self.manifest = other.manifest.clone();
        }
        if !other.entry_patterns.is_empty() {
            self.entry_patterns = other.entry_patterns.clone();
        }
        if !other.barrel_names.is_empty() {
            self.barrel_names = other.barrel_names.clone();
        }
        self.boundaries.extend(other.boundaries.iter().cloned());
        let mut zones = other.zones.clone();
        zones.append(&mut self.zones);
        self.zones = zones;
        if other.cross_module_prefix.is_some() {
            self.cross_module_prefix = other.cross_module_prefix.clone();
        }
        if !other.markers.is_empty() {
            self.markers = other.markers.clone();
        }
        self
    }

    /// Manifest path, defaulting to `.healthledger/imports.<lang>.json`
    pub fn manifest_path(&self, lang: &str) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!(".healthledger/imports.{lang}.json")))
    }

    pub fn graph_policy(&self) -> GraphPolicy {
        GraphPolicy {
            entry_patterns: self.entry_patterns.clone(),
            barrel_names: self.barrel_names.iter().cloned().collect(),
            boundaries: self.boundaries.clone(),
            cross_module_prefix: self.cross_module_prefix.clone(),
            ..Default::default()
        }
    }
}

/// Project-level configuration loaded from healthledger.toml
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// Ledger file, relative to the repository root
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    #[serde(default)]
    pub exclude: ExcludeConfig,

    #[serde(default)]
    pub languages: BTreeMap<String, LanguageConfig>,
}

impl ProjectConfig {
    pub fn state_path(&self, repo_path: &Path) -> PathBuf {
        let rel = self
            .state_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));
        repo_path.join(rel)
    }

    /// Effective settings for a language: built-in defaults with the
    /// configured section layered on top
    pub fn language(&self, name: &str) -> Option<LanguageConfig> {
        match (LanguageConfig::builtin(name), self.languages.get(name)) {
            (Some(base), Some(configured)) => Some(base.overlay(configured)),
            (Some(base), None) => Some(base),
            (None, Some(configured)) => Some(configured.clone()),
            (None, None) => None,
        }
    }

    /// Built-in languages in detection order, then configured ones by name
    pub fn language_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_LANGUAGES.iter().map(|s| s.to_string()).collect();
        for name in self.languages.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Detect the project language from marker files at the repository root
pub fn auto_detect_lang(repo_path: &Path, config: &ProjectConfig) -> Option<String> {
    config.language_names().into_iter().find(|name| {
        config.language(name).is_some_and(|lang| {
            lang.markers
                .iter()
                .any(|marker| repo_path.join(marker).exists())
        })
    })
}

/// Load project configuration from the repository root
///
/// A missing file yields defaults. A file that fails to parse is reported
/// and also yields defaults.
pub fn load_project_config(repo_path: &Path) -> ProjectConfig {
    let toml_path = repo_path.join(CONFIG_FILE);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", toml_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests;
