//! healthledger - recurring code-health analysis
//!
//! Builds an import graph, detects cycles and coupling problems, turns
//! detector output into canonical findings, reconciles them against a
//! persistent ledger across scans and scores the codebase.
//!
//! ```no_run
//! use healthledger::config::load_project_config;
//! use healthledger::pipeline::Pipeline;
//! use healthledger::plugins::PluginRegistry;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let root = Path::new(".");
//! let config = load_project_config(root);
//! let registry = PluginRegistry::with_builtins(&config);
//! let stats = Pipeline::new(root, &config, &registry).run()?;
//! println!("{}", stats.summary());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod plugins;
pub mod scoring;
pub mod zones;

pub use errors::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use models::{finding_id, Confidence, Finding, Status, Tier};
