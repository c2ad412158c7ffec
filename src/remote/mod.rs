//! Remote game-statistics service boundary.
//!
//! The engine only ever talks to the service through the [`StatsApi`] trait,
//! so tests can substitute an in-memory implementation and the HTTP details
//! stay confined to [`api`]. Match payloads are opaque `serde_json::Value`
//! blobs; the service's schema is a versioned external dependency, not part
//! of this crate's contract.

pub mod api;
pub mod error;
pub mod session;

pub use api::HttpStatsApi;
pub use error::RemoteError;
pub use session::{Session, DEFAULT_BASE_URL};

use crate::types::{MatchCandidate, Mode};

/// Full match record returned by a range fetch. The payload is stored
/// verbatim; only the id is interpreted, to match records back to requests.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub match_id: String,
    pub payload: serde_json::Value,
}

/// Capability surface of the remote service.
///
/// `fetch_history_page` lists match summaries for pagination (up to
/// [`PAGE_RESULT_LIMIT`](crate::sync::pagination::PAGE_RESULT_LIMIT) per
/// call); `fetch_range` returns full records for a timestamp window (up to
/// the per-call item cap). `start`/`end` form a `[start, end)` window in
/// Unix seconds; `end = 0` means "now".
#[async_trait::async_trait]
pub trait StatsApi: Send + Sync {
    /// Log in if the session has not authenticated yet. Explicit
    /// precondition for every retrieval; must run after the backoff gate.
    async fn ensure_logged_in(&self) -> Result<(), RemoteError>;

    async fn fetch_history_page(
        &self,
        tag: &str,
        platform: &str,
        mode: Mode,
        start: i64,
        end: i64,
    ) -> Result<Vec<MatchCandidate>, RemoteError>;

    async fn fetch_range(
        &self,
        tag: &str,
        platform: &str,
        mode: Mode,
        start: i64,
        end: i64,
    ) -> Result<Vec<MatchRecord>, RemoteError>;
}
