//! Batched, bounded-concurrency match fetching.
//!
//! Candidates that survive dedup and the failure cutoff are grouped into
//! passes of `W*B`: `B` items per physical range request (the service's own
//! per-call cap) and `W` requests in flight at once. Passes are strictly
//! sequential (all chunks of a pass settle before the next pass starts), so
//! worst-case in-flight requests stay bounded and a rate-limit response is
//! attributable to one pass. Ledger and store updates happen only after a
//! pass settles, on the orchestrating task, so they need no locking.

use std::collections::HashMap;

use futures_util::future::join_all;

use crate::remote::{MatchRecord, RemoteError, StatsApi};
use crate::roster::AccountMapping;
use crate::state::FailureLedger;
use crate::store::{DownloadedIndex, OutputStore};
use crate::types::{MatchCandidate, Mode};

/// Items per physical range request; fixed by the service's per-call cap.
pub const REMOTE_BATCH_LIMIT: usize = 20;

/// Default number of range requests in flight within one pass.
pub const CONCURRENT_BATCHES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    /// `B`: candidates per physical call.
    pub batch_limit: usize,
    /// `W`: chunks dispatched concurrently per pass.
    pub concurrent_batches: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            batch_limit: REMOTE_BATCH_LIMIT,
            concurrent_batches: CONCURRENT_BATCHES,
        }
    }
}

impl BatchLimits {
    // Clamped to 1 so a zero limit degrades to serial fetching instead of
    // panicking in `chunks`.
    fn chunk_size(&self) -> usize {
        self.batch_limit.max(1)
    }

    fn pass_size(&self) -> usize {
        self.chunk_size() * self.concurrent_batches.max(1)
    }
}

/// Per-account, per-mode outcome of a scheduling run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Records written to the output store.
    pub stored: u64,
    /// Failure-ledger increments (chunk failures and not-found records).
    pub failed: u64,
    /// Candidates excluded up front: already downloaded or over the cutoff.
    pub skipped: u64,
    /// A chunk failed with the rate-limit signature; no further passes ran.
    pub rate_limited: bool,
}

/// Candidates still worth fetching for this account.
pub fn select_eligible<'a>(
    candidates: &'a [MatchCandidate],
    uno_id: &str,
    downloaded: &DownloadedIndex,
    ledger: &FailureLedger,
    cutoff: u32,
) -> Vec<&'a MatchCandidate> {
    candidates
        .iter()
        .filter(|c| !downloaded.contains(&c.match_id, uno_id))
        .filter(|c| ledger.is_eligible(&c.match_id, cutoff))
        .collect()
}

/// One physical range request covering a chunk of candidates.
async fn fetch_chunk(
    api: &dyn StatsApi,
    account: &AccountMapping,
    mode: Mode,
    chunk: &[&MatchCandidate],
) -> Result<Vec<MatchRecord>, RemoteError> {
    // Chunks are timestamp-sorted; the window spans the chunk, end exclusive.
    match (chunk.first(), chunk.last()) {
        (Some(first), Some(last)) => {
            api.fetch_range(
                &account.tag,
                &account.platform,
                mode,
                first.timestamp,
                last.timestamp + 1,
            )
            .await
        }
        _ => Ok(Vec::new()),
    }
}

/// Fetch every eligible candidate for one account and mode, applying each
/// record's outcome to the store (success) or ledger (failure).
#[allow(clippy::too_many_arguments)] // One parameter per collaborator
pub async fn download_matches(
    api: &dyn StatsApi,
    account: &AccountMapping,
    mode: Mode,
    candidates: &[MatchCandidate],
    store: &OutputStore,
    downloaded: &DownloadedIndex,
    ledger: &mut FailureLedger,
    cutoff: u32,
    limits: BatchLimits,
    no_progress_bar: bool,
) -> anyhow::Result<BatchOutcome> {
    let mut eligible = select_eligible(candidates, &account.uno_id, downloaded, ledger, cutoff);
    eligible.sort_by_key(|c| c.timestamp);

    let mut outcome = BatchOutcome {
        skipped: (candidates.len() - eligible.len()) as u64,
        ..Default::default()
    };

    tracing::info!(
        tag = %account.tag,
        %mode,
        eligible = eligible.len(),
        skipped = outcome.skipped,
        "Fetching matches by batch"
    );

    let pb = super::create_progress_bar(no_progress_bar, eligible.len() as u64);

    for pass in eligible.chunks(limits.pass_size()) {
        let chunk_futures: Vec<_> = pass
            .chunks(limits.chunk_size())
            .map(|chunk| async move {
                let result = fetch_chunk(api, account, mode, chunk).await;
                (chunk, result)
            })
            .collect();
        let results = join_all(chunk_futures).await;

        // The pass has settled; apply outcomes serially.
        for (chunk, result) in results {
            match result {
                Err(e) => {
                    if e.is_rate_limited() {
                        outcome.rate_limited = true;
                    }
                    if let (Some(first), Some(last)) = (chunk.first(), chunk.last()) {
                        pb.suspend(|| {
                            tracing::error!(
                                %mode,
                                "Chunk [{} {}]-[{} {}] failed: {e}",
                                first.match_id,
                                first.timestamp,
                                last.match_id,
                                last.timestamp,
                            )
                        });
                    }
                    for candidate in chunk {
                        ledger.record_failure(&candidate.match_id);
                        outcome.failed += 1;
                    }
                    pb.inc(chunk.len() as u64);
                }
                Ok(records) => {
                    let by_id: HashMap<&str, &MatchRecord> = records
                        .iter()
                        .map(|r| (r.match_id.as_str(), r))
                        .collect();
                    for candidate in chunk {
                        match by_id.get(candidate.match_id.as_str()) {
                            Some(record) => {
                                if !store.write(
                                    &candidate.match_id,
                                    &account.uno_id,
                                    &record.payload,
                                )? {
                                    tracing::debug!(
                                        match_id = %candidate.match_id,
                                        "Already on disk, kept existing file"
                                    );
                                }
                                ledger.record_success(&candidate.match_id);
                                outcome.stored += 1;
                            }
                            None => {
                                let count = ledger.record_failure(&candidate.match_id);
                                pb.suspend(|| {
                                    tracing::warn!(
                                        %mode,
                                        match_id = %candidate.match_id,
                                        timestamp = candidate.timestamp,
                                        tag = %account.tag,
                                        "Match not found in range response (#{count})"
                                    )
                                });
                                outcome.failed += 1;
                            }
                        }
                        pb.inc(1);
                    }
                }
            }
        }

        if outcome.rate_limited {
            pb.suspend(|| tracing::error!("Rate limit detected, stopping after current pass"));
            break;
        }
    }

    pb.finish_and_clear();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{account, universe, MockApi};

    fn limits(b: usize, w: usize) -> BatchLimits {
        BatchLimits {
            batch_limit: b,
            concurrent_batches: w,
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: OutputStore,
        ledger: FailureLedger,
        downloaded: DownloadedIndex,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::open(&dir.path().join("output")).unwrap();
        let ledger = FailureLedger::load(dir.path().join("failure_stats.json")).unwrap();
        let downloaded = store.scan_downloaded().unwrap();
        Fixture {
            _dir: dir,
            store,
            ledger,
            downloaded,
        }
    }

    async fn run(
        api: &MockApi,
        fx: &mut Fixture,
        candidates: &[crate::types::MatchCandidate],
        cutoff: u32,
        limits: BatchLimits,
    ) -> BatchOutcome {
        download_matches(
            api,
            &account(),
            Mode::Warzone,
            candidates,
            &fx.store,
            &fx.downloaded,
            &mut fx.ledger,
            cutoff,
            limits,
            true,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_partition_into_chunks_of_batch_limit() {
        // 12 eligible with B=5: expect ceil(12/5) = 3 calls of 5, 5, 2.
        let matches = universe(12);
        let api = MockApi::new(matches.clone());
        let mut fx = fixture();

        let outcome = run(&api, &mut fx, &matches, 50, limits(5, 2)).await;
        assert_eq!(outcome.stored, 12);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.skipped, 0);
        assert!(!outcome.rate_limited);

        assert_eq!(api.range_calls.lock().unwrap().len(), 3);
        let index = fx.store.scan_downloaded().unwrap();
        assert_eq!(index.len(), 12);
        for c in &matches {
            assert!(index.contains(&c.match_id, "111"));
        }
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_downloaded_and_cutoff_candidates_never_fetched() {
        let matches = universe(3);
        let api = MockApi::new(matches.clone());
        let mut fx = fixture();

        // m0 already on disk for this account, m1 over the cutoff.
        fx.store
            .write("m0", "111", &serde_json::json!({}))
            .unwrap();
        fx.downloaded = fx.store.scan_downloaded().unwrap();
        for _ in 0..50 {
            fx.ledger.record_failure("m1");
        }

        let outcome = run(&api, &mut fx, &matches, 50, limits(5, 2)).await;
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.stored, 1);
        // One chunk for the single eligible candidate.
        assert_eq!(api.range_calls.lock().unwrap().len(), 1);
        assert!(fx.store.is_downloaded("m2", "111"));
        assert!(!fx.store.is_downloaded("m1", "111"));
    }

    #[tokio::test]
    async fn test_missing_record_fails_alone() {
        let matches = universe(3);
        let api = MockApi::new(matches.clone()).with_missing(&["m1"]);
        let mut fx = fixture();

        let outcome = run(&api, &mut fx, &matches, 50, limits(5, 2)).await;
        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(fx.ledger.failure_count("m1"), 1);
        assert_eq!(fx.ledger.failure_count("m0"), 0);
        assert!(fx.store.is_downloaded("m0", "111"));
        assert!(fx.store.is_downloaded("m2", "111"));
        assert!(!fx.store.is_downloaded("m1", "111"));
    }

    #[tokio::test]
    async fn test_chunk_error_fails_every_member() {
        let matches = universe(5);
        let api = MockApi::new(matches.clone());
        api.script_range_failures(vec![Some(500)]);
        let mut fx = fixture();

        let outcome = run(&api, &mut fx, &matches, 50, limits(5, 2)).await;
        assert_eq!(outcome.stored, 0);
        assert_eq!(outcome.failed, 5);
        assert!(!outcome.rate_limited);
        for c in &matches {
            assert_eq!(fx.ledger.failure_count(&c.match_id), 1);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_stops_after_current_pass() {
        // 30 candidates with B=5, W=2: pass size 10, so 3 passes of 2
        // chunks. A 429 in pass 1 must stop scheduling after that pass.
        let matches = universe(30);
        let api = MockApi::new(matches.clone());
        api.script_range_failures(vec![Some(429), None]);
        let mut fx = fixture();

        let outcome = run(&api, &mut fx, &matches, 50, limits(5, 2)).await;
        assert!(outcome.rate_limited);
        // Both chunks of the first pass ran, nothing after.
        assert_eq!(api.range_calls.lock().unwrap().len(), 2);
        assert_eq!(outcome.failed, 5);
        assert_eq!(outcome.stored, 5);
    }

    #[tokio::test]
    async fn test_success_clears_prior_failure_history() {
        let matches = universe(1);
        let api = MockApi::new(matches.clone());
        let mut fx = fixture();
        fx.ledger.record_failure("m0");
        fx.ledger.record_failure("m0");

        let outcome = run(&api, &mut fx, &matches, 50, limits(5, 2)).await;
        assert_eq!(outcome.stored, 1);
        assert_eq!(fx.ledger.failure_count("m0"), 0);
    }

    #[tokio::test]
    async fn test_zero_limits_degrade_to_serial_fetching() {
        let matches = universe(3);
        let api = MockApi::new(matches.clone());
        let mut fx = fixture();

        let outcome = run(&api, &mut fx, &matches, 50, limits(0, 0)).await;
        assert_eq!(outcome.stored, 3);
        // chunk_size clamps to 1: one call per candidate.
        assert_eq!(api.range_calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_eligible_candidates_makes_no_calls() {
        let api = MockApi::new(Vec::new());
        let mut fx = fixture();
        let outcome = run(&api, &mut fx, &[], 50, limits(5, 2)).await;
        assert_eq!(outcome.stored, 0);
        assert!(api.range_calls.lock().unwrap().is_empty());
    }
}
