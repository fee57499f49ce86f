//! CLI command definitions and handlers

mod findings;
mod graph;
mod scan;
mod status;
mod zone;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{load_project_config, ProjectConfig};
use crate::ledger::{self, Ledger};

/// healthledger - recurring code-health analysis
///
/// Tracks findings across scans in a persistent ledger and scores the
/// codebase by tier-weighted progress and detector potentials.
#[derive(Parser, Debug)]
#[command(name = "healthledger")]
#[command(
    version,
    about = "Code-health ledger: import-graph cycles and coupling, finding lifecycle, tier-weighted scores",
    after_help = "\
Examples:
  healthledger scan --input detectors.json    Merge a scan into the ledger
  healthledger status                         Scores, counts and dimensions
  healthledger next --count 5                 Highest-priority open findings
  healthledger resolve wontfix 'logs::*' --note 'kept for ops'
  healthledger zone set scripts/seed.py script"
)]
pub struct Cli {
    /// Path to repository
    #[arg(long, short = 'p', global = true, default_value = ".")]
    pub path: PathBuf,

    /// Ledger file (default: state_path from healthledger.toml)
    #[arg(long, global = true, env = "HEALTHLEDGER_STATE")]
    pub state: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the import graph, normalize detector output and merge it into the ledger
    Scan {
        /// Language plugin to use (default: auto-detect from marker files)
        #[arg(long)]
        lang: Option<String>,

        /// Detector output JSON ({"records": [...], "potentials": {...}})
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Limit the scan to this relative path
        #[arg(long)]
        scope: Option<String>,

        /// Auto-resolve even when a detector suddenly reports nothing
        #[arg(long)]
        force_resolve: bool,
    },

    /// Show scores, finding counts and per-dimension health
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List findings matching a pattern (id, glob, id prefix, detector or path)
    Show {
        pattern: String,

        /// Status filter
        #[arg(long, default_value = "open", value_parser = ["open", "fixed", "wontfix", "false_positive", "auto_resolved", "all"])]
        status: String,

        /// Maximum findings to show
        #[arg(long)]
        top: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the highest-priority open findings
    Next {
        /// Only this tier (1-4)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        tier: Option<u8>,

        #[arg(long, short = 'n', default_value = "1")]
        count: usize,
    },

    /// Mark open findings as fixed, wontfix or false_positive
    Resolve {
        #[arg(value_parser = ["fixed", "wontfix", "false_positive"])]
        status: String,

        /// Finding patterns
        #[arg(required = true)]
        patterns: Vec<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Add an ignore pattern and drop every finding it matches
    Ignore { pattern: String },

    /// Inspect or override file zones
    Zone {
        #[command(subcommand)]
        action: ZoneAction,
    },

    /// List import cycles in the current graph
    Cycles {
        /// Language plugin to use (default: auto-detect from marker files)
        #[arg(long)]
        lang: Option<String>,

        /// Count deferred (function-level) imports as edges
        #[arg(long)]
        include_deferred: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ZoneAction {
    /// Group the graph's files by zone
    Show {
        #[arg(long)]
        lang: Option<String>,
    },
    /// Pin a file to a zone
    Set { file: String, zone: String },
    /// Remove a file's zone override
    Clear { file: String },
}

/// Repository, configuration and ledger location shared by all commands
pub(crate) struct Workspace {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub state_path: PathBuf,
}

impl Workspace {
    fn open(path: &Path, state: Option<PathBuf>) -> Result<Self> {
        let root = path
            .canonicalize()
            .with_context(|| format!("Path does not exist: {}", path.display()))?;
        let config = load_project_config(&root);
        let state_path = state.unwrap_or_else(|| config.state_path(&root));
        Ok(Self {
            root,
            config,
            state_path,
        })
    }

    pub fn load_ledger(&self) -> Result<Ledger> {
        ledger::load(&self.state_path)
            .with_context(|| format!("loading ledger {}", self.state_path.display()))
    }

    pub fn save_ledger(&self, ledger: &mut Ledger) -> Result<()> {
        ledger::save(ledger, &self.state_path)
            .with_context(|| format!("saving ledger {}", self.state_path.display()))
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let ws = Workspace::open(&cli.path, cli.state)?;
    match cli.command {
        Commands::Scan {
            lang,
            input,
            scope,
            force_resolve,
        } => scan::run(&ws, lang, input.as_deref(), scope, force_resolve),

        Commands::Status { json } => status::run(&ws, json),

        Commands::Show {
            pattern,
            status,
            top,
            json,
        } => findings::show(&ws, &pattern, &status, top, json),

        Commands::Next { tier, count } => findings::next(&ws, tier, count),

        Commands::Resolve {
            status,
            patterns,
            note,
        } => findings::resolve(&ws, &status, &patterns, note.as_deref()),

        Commands::Ignore { pattern } => findings::ignore(&ws, &pattern),

        Commands::Zone { action } => match action {
            ZoneAction::Show { lang } => zone::show(&ws, lang),
            ZoneAction::Set { file, zone } => zone::set(&ws, &file, &zone),
            ZoneAction::Clear { file } => zone::clear(&ws, &file),
        },

        Commands::Cycles {
            lang,
            include_deferred,
        } => graph::cycles(&ws, lang, include_deferred),
    }
}
