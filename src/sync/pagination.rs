//! Exhaustive retrieval of an account's match history.
//!
//! The listing endpoint serves a bounded page per call, so the full history
//! is walked with a shrinking `[start, end)` window: `end = 0` means "now",
//! and each full page moves `end` back to the timestamp of its last item.

use crate::remote::{RemoteError, StatsApi};
use crate::roster::AccountMapping;
use crate::types::{MatchCandidate, Mode};

/// Per-page result cap of the remote listing endpoint. A page shorter than
/// this means the window has reached the end of the history.
pub const PAGE_RESULT_LIMIT: usize = 1000;

/// Walk the listing until a short page terminates it.
///
/// There is deliberately no iteration bound: the remote history is itself
/// finite. Caveat: a match whose timestamp equals the window boundary
/// exactly can be omitted by the service and silently skipped; accepted
/// rather than worked around.
pub async fn retrieve_full_history(
    api: &dyn StatsApi,
    account: &AccountMapping,
    mode: Mode,
) -> Result<Vec<MatchCandidate>, RemoteError> {
    let start = 0;
    let mut end = 0;
    let mut all: Vec<MatchCandidate> = Vec::new();

    loop {
        let page = api
            .fetch_history_page(&account.tag, &account.platform, mode, start, end)
            .await?;
        let full_page = page.len() >= PAGE_RESULT_LIMIT;
        let boundary = page.last().map(|c| c.timestamp);
        all.extend(page);
        match boundary {
            Some(ts) if full_page => end = ts,
            _ => break,
        }
    }

    tracing::debug!(
        tag = %account.tag,
        %mode,
        candidates = all.len(),
        "History retrieval complete"
    );
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{account, candidates, MockApi};

    #[tokio::test]
    async fn test_single_short_page_terminates() {
        let api = MockApi::new(Vec::new());
        api.script_pages(vec![candidates(&[("m1", 100), ("m2", 200)])]);

        let history = retrieve_full_history(&api, &account(), Mode::Warzone)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);

        let calls = api.history_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].2, calls[0].3), (0, 0));
    }

    #[tokio::test]
    async fn test_empty_history_single_call() {
        let api = MockApi::new(Vec::new());
        api.script_pages(vec![Vec::new()]);

        let history = retrieve_full_history(&api, &account(), Mode::Warzone)
            .await
            .unwrap();
        assert!(history.is_empty());
        assert_eq!(api.history_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_page_advances_window() {
        // First page is exactly the cap, so pagination must continue from
        // the last timestamp of that page.
        let full_page: Vec<_> = (0..PAGE_RESULT_LIMIT)
            .map(|i| crate::types::MatchCandidate {
                match_id: format!("m{i}"),
                timestamp: 5000 - i as i64,
            })
            .collect();
        let last_ts = full_page.last().unwrap().timestamp;

        let api = MockApi::new(Vec::new());
        api.script_pages(vec![full_page, candidates(&[("tail", 10)])]);

        let history = retrieve_full_history(&api, &account(), Mode::Warzone)
            .await
            .unwrap();
        assert_eq!(history.len(), PAGE_RESULT_LIMIT + 1);
        assert_eq!(history.last().unwrap().match_id, "tail");

        let calls = api.history_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!((calls[0].2, calls[0].3), (0, 0));
        assert_eq!((calls[1].2, calls[1].3), (0, last_ts));
    }

    #[tokio::test]
    async fn test_listing_error_propagates() {
        let api = MockApi::new(Vec::new());
        api.script_history_failures(vec![Some(500)]);

        let err = retrieve_full_history(&api, &account(), Mode::Warzone)
            .await
            .unwrap_err();
        assert!(!err.is_rate_limited());
    }
}
