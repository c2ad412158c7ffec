//! Persistent rate-limit backoff governor.
//!
//! State lifecycle: absent while no backoff is in effect; created/doubled on
//! every observed rate-limit failure; deleted only after a run completes with
//! no rate-limit error. All operations are synchronous file reads and writes
//! with no in-memory caching, so the state survives process restarts and is
//! always consulted fresh.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::StateError;

/// On-disk backoff state. Field names match the original file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub last_backoff_mins: i64,
    pub delay_until_unix: i64,
}

pub struct RateLimitGovernor {
    path: PathBuf,
    initial_backoff_mins: i64,
}

fn current_unix_time_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl RateLimitGovernor {
    pub fn new(path: PathBuf, initial_backoff_mins: i64) -> Self {
        Self {
            path,
            initial_backoff_mins,
        }
    }

    fn load(&self) -> Result<Option<RateLimitInfo>, StateError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let info = serde_json::from_str(&raw).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(info))
    }

    /// Seconds until the backoff window closes; zero or negative means a run
    /// may proceed. Positive means the run must abort before any network call.
    pub fn remaining_backoff_secs(&self) -> Result<i64, StateError> {
        match self.load()? {
            Some(info) => Ok(info.delay_until_unix - current_unix_time_secs()),
            None => Ok(0),
        }
    }

    /// Double the backoff and persist the new window.
    ///
    /// With no prior state, synthesizes `last_backoff = initial / 2` so the
    /// first observed failure yields exactly the configured initial backoff.
    /// Growth is unbounded: the original applied no ceiling, and that
    /// behavior is preserved rather than silently capped.
    pub fn record_rate_limit_failure(&self) -> Result<RateLimitInfo, StateError> {
        let prior = self.load()?.unwrap_or(RateLimitInfo {
            last_backoff_mins: self.initial_backoff_mins / 2,
            delay_until_unix: 0,
        });
        let new_backoff = prior.last_backoff_mins * 2;
        let info = RateLimitInfo {
            last_backoff_mins: new_backoff,
            delay_until_unix: current_unix_time_secs() + 60 * new_backoff,
        };
        tracing::info!("Backing off for [{}] mins", new_backoff);
        let raw = serde_json::to_string(&info).map_err(|source| StateError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, raw).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(info)
    }

    /// Remove the persisted window. Called only after a run with no
    /// rate-limit error; a missing file is not an error.
    pub fn clear(&self) -> Result<(), StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
