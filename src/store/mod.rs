//! Output store — one JSON file per `(match, account)` pair.
//!
//! The store is the source of truth for "already downloaded": the filename
//! deterministically encodes the `(matchId, unoId)` pair and the downloaded
//! index is rebuilt by scanning filenames at the start of every run. There is
//! no separate persisted index, so correctness rests on the encoding being
//! exact and collision-free. Files are written at most once and never
//! overwritten; other processes may read them freely.

pub mod error;

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

pub use error::StoreError;

const FILE_PREFIX: &str = "match_";
const FILE_SUFFIX: &str = ".json";

/// Downloaded pairs, rebuilt fresh each run: `matchId -> {unoId, ...}`.
#[derive(Debug, Default)]
pub struct DownloadedIndex {
    by_match: HashMap<String, HashSet<String>>,
}

impl DownloadedIndex {
    pub fn contains(&self, match_id: &str, uno_id: &str) -> bool {
        self.by_match
            .get(match_id)
            .is_some_and(|accounts| accounts.contains(uno_id))
    }

    fn insert(&mut self, match_id: String, uno_id: String) {
        self.by_match.entry(match_id).or_default().insert(uno_id);
    }

    /// Number of distinct `(matchId, unoId)` pairs.
    pub fn len(&self) -> usize {
        self.by_match.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_match.is_empty()
    }
}

pub struct OutputStore {
    dir: PathBuf,
}

/// `match_{matchId}_{unoId}.json`. The inverse of [`parse_file_name`].
fn file_name(match_id: &str, uno_id: &str) -> String {
    format!("{FILE_PREFIX}{match_id}_{uno_id}{FILE_SUFFIX}")
}

/// Parse a stored filename back into its `(matchId, unoId)` pair.
///
/// Splits on the last interior underscore. Match ids may contain
/// underscores as long as account ids do not; both are numeric strings in
/// practice, which keeps the encoding collision-free.
fn parse_file_name(name: &str) -> Option<(String, String)> {
    let inner = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    let (match_id, uno_id) = inner.rsplit_once('_')?;
    if match_id.is_empty() || uno_id.is_empty() {
        return None;
    }
    Some((match_id.to_string(), uno_id.to_string()))
}

impl OutputStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Scan filenames and rebuild the downloaded index. Non-matching entries
    /// (foreign files, subdirectories) are ignored.
    pub fn scan_downloaded(&self) -> Result<DownloadedIndex, StoreError> {
        let mut index = DownloadedIndex::default();
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some((match_id, uno_id)) = parse_file_name(name) {
                index.insert(match_id, uno_id);
            }
        }
        Ok(index)
    }

    pub fn is_downloaded(&self, match_id: &str, uno_id: &str) -> bool {
        self.dir.join(file_name(match_id, uno_id)).exists()
    }

    /// Write the raw remote payload for a pair.
    ///
    /// Returns `false` if the file already exists: an earlier successful
    /// fetch owns that pair and is never overwritten.
    pub fn write(
        &self,
        match_id: &str,
        uno_id: &str,
        payload: &serde_json::Value,
    ) -> Result<bool, StoreError> {
        let path = self.dir.join(file_name(match_id, uno_id));
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let raw = serde_json::to_vec(payload).map_err(StoreError::Serialize)?;
        file.write_all(&raw)
            .map_err(|source| StoreError::Io { path, source })?;
        Ok(true)
    }
}
