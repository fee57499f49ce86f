//! Configuration module for healthledger
//!
//! This module handles:
//! - Project-level configuration (healthledger.toml)
//! - Per-language graph policy and zone overrides
//! - Ledger location and scan exclusions

mod project_config;

pub use project_config::{
    auto_detect_lang,
    load_project_config,
    ExcludeConfig,
    LanguageConfig,
    ProjectConfig,
    CONFIG_FILE,
    DEFAULT_STATE_PATH,
};
