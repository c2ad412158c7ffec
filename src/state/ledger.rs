//! Persistent per-match failure ledger.
//!
//! Loaded once at process start, mutated purely in memory during the run,
//! and flushed to disk exactly once at the end of a successful run. A crash
//! mid-run loses in-run increments and they are simply re-attempted from the
//! prior persisted count: at-least-once accounting for failures, while the
//! downloaded data itself is never lost, only re-fetched.

use std::collections::HashMap;
use std::path::PathBuf;

use super::StateError;

#[derive(Debug)]
pub struct FailureLedger {
    path: PathBuf,
    data: HashMap<String, u32>,
}

impl FailureLedger {
    /// Load the ledger; a missing file is an empty ledger.
    pub fn load(path: PathBuf) -> Result<Self, StateError> {
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StateError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(StateError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };
        Ok(Self { path, data })
    }

    /// Consecutive failures recorded for a match; zero when absent.
    pub fn failure_count(&self, match_id: &str) -> u32 {
        self.data.get(match_id).copied().unwrap_or(0)
    }

    /// Increment and return the new count.
    pub fn record_failure(&mut self, match_id: &str) -> u32 {
        let count = self.data.entry(match_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// A successful fetch erases the failure history entirely.
    pub fn record_success(&mut self, match_id: &str) {
        self.data.remove(match_id);
    }

    /// Whether the match is still worth retrying.
    pub fn is_eligible(&self, match_id: &str, cutoff: u32) -> bool {
        self.failure_count(match_id) < cutoff
    }

    /// Flush to disk. Called once, on the success path only.
    pub fn persist(&self) -> Result<(), StateError> {
        let raw = serde_json::to_string(&self.data).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, raw).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
