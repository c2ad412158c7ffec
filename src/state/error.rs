//! Error types for the persistent state files.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing the ledger / rate-limit state files.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed state file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
