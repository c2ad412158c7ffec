//! Scriptable in-memory [`StatsApi`] for engine tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use serde_json::json;

use crate::remote::{MatchRecord, RemoteError, StatsApi};
use crate::roster::AccountMapping;
use crate::types::{MatchCandidate, Mode};

/// Mock service holding a fixed universe of matches.
///
/// By default every history call returns the whole universe as one page and
/// every range call returns the universe matches inside `[start, end)`.
/// Tests can script explicit pages, per-call failures (by HTTP status), and
/// ids that never appear in range responses.
pub(crate) struct MockApi {
    universe: Vec<MatchCandidate>,
    missing: HashSet<String>,
    pages: Mutex<Option<VecDeque<Vec<MatchCandidate>>>>,
    history_failures: Mutex<VecDeque<Option<u16>>>,
    range_failures: Mutex<VecDeque<Option<u16>>>,
    /// `(tag, mode, start, end)` per history call.
    pub history_calls: Mutex<Vec<(String, Mode, i64, i64)>>,
    /// `(start, end)` per range call.
    pub range_calls: Mutex<Vec<(i64, i64)>>,
}

impl MockApi {
    pub fn new(universe: Vec<MatchCandidate>) -> Self {
        Self {
            universe,
            missing: HashSet::new(),
            pages: Mutex::new(None),
            history_failures: Mutex::new(VecDeque::new()),
            range_failures: Mutex::new(VecDeque::new()),
            history_calls: Mutex::new(Vec::new()),
            range_calls: Mutex::new(Vec::new()),
        }
    }

    /// Ids that exist in listings but never come back from a range fetch.
    pub fn with_missing(mut self, ids: &[&str]) -> Self {
        self.missing = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Serve these exact pages (in order) instead of the universe; exhausted
    /// queue yields empty pages.
    pub fn script_pages(&self, pages: Vec<Vec<MatchCandidate>>) {
        *self.pages.lock().unwrap() = Some(pages.into());
    }

    /// Per-call history outcomes: `Some(status)` fails that call.
    pub fn script_history_failures(&self, outcomes: Vec<Option<u16>>) {
        *self.history_failures.lock().unwrap() = outcomes.into();
    }

    /// Per-call range outcomes: `Some(status)` fails that call.
    pub fn script_range_failures(&self, outcomes: Vec<Option<u16>>) {
        *self.range_failures.lock().unwrap() = outcomes.into();
    }

    pub fn reset_counters(&self) {
        self.history_calls.lock().unwrap().clear();
        self.range_calls.lock().unwrap().clear();
    }
}

fn scripted_failure(queue: &Mutex<VecDeque<Option<u16>>>) -> Option<RemoteError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .flatten()
        .map(|status| RemoteError::HttpStatus {
            status,
            endpoint: "mock".to_string(),
        })
}

#[async_trait::async_trait]
impl StatsApi for MockApi {
    async fn ensure_logged_in(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn fetch_history_page(
        &self,
        tag: &str,
        _platform: &str,
        mode: Mode,
        start: i64,
        end: i64,
    ) -> Result<Vec<MatchCandidate>, RemoteError> {
        self.history_calls
            .lock()
            .unwrap()
            .push((tag.to_string(), mode, start, end));
        if let Some(err) = scripted_failure(&self.history_failures) {
            return Err(err);
        }
        if let Some(pages) = self.pages.lock().unwrap().as_mut() {
            return Ok(pages.pop_front().unwrap_or_default());
        }
        Ok(self.universe.clone())
    }

    async fn fetch_range(
        &self,
        _tag: &str,
        _platform: &str,
        _mode: Mode,
        start: i64,
        end: i64,
    ) -> Result<Vec<MatchRecord>, RemoteError> {
        self.range_calls.lock().unwrap().push((start, end));
        if let Some(err) = scripted_failure(&self.range_failures) {
            return Err(err);
        }
        Ok(self
            .universe
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp < end)
            .filter(|c| !self.missing.contains(&c.match_id))
            .map(|c| MatchRecord {
                match_id: c.match_id.clone(),
                payload: json!({"matchID": c.match_id, "utcStartSeconds": c.timestamp}),
            })
            .collect())
    }
}

/// A single-account mapping for tests.
pub(crate) fn account() -> AccountMapping {
    AccountMapping {
        player_name: "Alice".to_string(),
        platform: "battle".to_string(),
        tag: "Alice#1234".to_string(),
        uno_id: "111".to_string(),
    }
}

/// Build candidates from `(id, timestamp)` pairs.
pub(crate) fn candidates(pairs: &[(&str, i64)]) -> Vec<MatchCandidate> {
    pairs
        .iter()
        .map(|(id, ts)| MatchCandidate {
            match_id: id.to_string(),
            timestamp: *ts,
        })
        .collect()
}

/// A universe of `n` matches with distinct ids and ascending timestamps.
pub(crate) fn universe(n: usize) -> Vec<MatchCandidate> {
    (0..n)
        .map(|i| MatchCandidate {
            match_id: format!("m{i}"),
            timestamp: 1_000 + i as i64,
        })
        .collect()
}
