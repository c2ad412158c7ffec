//! Roster loading — the externally maintained mapping from player names to
//! their linked game accounts.
//!
//! The roster file is read-only input: a JSON array of
//! `{ "name": ..., "accounts": [{ "platform", "tag", "unoId" }] }` records.
//! One real player may have several accounts (cross-platform identities);
//! they are grouped under a lowercased name key for CLI selection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Failed to read roster file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse roster file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No player found for [{0}]")]
    UnknownPlayer(String),
}

#[derive(Debug, Clone, Deserialize)]
struct RosterEntry {
    name: String,
    accounts: Vec<RosterAccount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterAccount {
    platform: String,
    tag: String,
    uno_id: String,
}

/// One linked game account of a real player, flattened for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMapping {
    pub player_name: String,
    pub platform: String,
    pub tag: String,
    /// Stable per-account identifier; half of the output dedup key.
    pub uno_id: String,
}

/// A named group of accounts belonging to one real player.
#[derive(Debug, Clone)]
pub struct PlayerGroup {
    pub name: String,
    pub accounts: Vec<AccountMapping>,
}

/// The full account mapping, keyed by lowercased player name.
#[derive(Debug, Clone)]
pub struct Roster {
    groups: BTreeMap<String, Vec<AccountMapping>>,
}

impl Roster {
    /// Load and flatten the roster file. Loaded once per run; immutable after.
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<RosterEntry> =
            serde_json::from_str(&raw).map_err(|source| RosterError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut groups = BTreeMap::new();
        for entry in entries {
            let accounts: Vec<AccountMapping> = entry
                .accounts
                .into_iter()
                .map(|account| AccountMapping {
                    player_name: entry.name.clone(),
                    platform: account.platform,
                    tag: account.tag,
                    uno_id: account.uno_id,
                })
                .collect();
            groups.insert(entry.name.to_lowercase(), accounts);
        }
        Ok(Self { groups })
    }

    /// Resolve the run's player groups: one named group, or all of them.
    pub fn select(&self, player: Option<&str>) -> Result<Vec<PlayerGroup>, RosterError> {
        match player {
            Some(name) => {
                let key = name.to_lowercase();
                let accounts = self
                    .groups
                    .get(&key)
                    .ok_or_else(|| RosterError::UnknownPlayer(name.to_string()))?;
                Ok(vec![PlayerGroup {
                    name: key,
                    accounts: accounts.clone(),
                }])
            }
            None => Ok(self
                .groups
                .iter()
                .map(|(name, accounts)| PlayerGroup {
                    name: name.clone(),
                    accounts: accounts.clone(),
                })
                .collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
