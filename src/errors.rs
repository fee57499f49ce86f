//! Error types for the ledger and graph layers
//!
//! Data inconsistencies inside a scan never surface here: the reconciler
//! degrades by skipping. These errors cover rejected configuration
//! mutations and persistence failures, which the caller must see.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Status;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid zone {0:?}. Valid: config, generated, production, script, test, vendor")]
    InvalidZone(String),

    #[error("Cannot resolve findings as {0}: expected fixed, wontfix or false_positive")]
    InvalidResolution(Status),

    #[error("Ledger version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid import manifest: {0}")]
    Manifest(String),

    #[error("Unknown language {name:?}. Available: {available}")]
    UnknownLanguage { name: String, available: String },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
