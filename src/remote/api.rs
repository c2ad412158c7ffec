//! HTTP implementation of [`StatsApi`] over the papi-client API surface.

use serde_json::Value;
use tokio::sync::RwLock;

use super::session::Session;
use super::{MatchRecord, RemoteError, StatsApi};
use crate::types::{MatchCandidate, Mode};

/// Game title segment in API paths.
const TITLE: &str = "mw";

pub struct HttpStatsApi {
    // RwLock so `ensure_logged_in` can flip the session state behind the
    // shared trait object; all fetches take the read side.
    session: RwLock<Session>,
}

impl HttpStatsApi {
    pub fn new(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

/// Build `<base>/crm/cod/v2/title/mw/platform/{platform}/gamer/{tag}/
/// matches/{mode}/start/{start}/end/{end}[/details]`, percent-encoding the
/// gamer tag (tags carry `#`).
fn matches_url(
    base: &str,
    platform: &str,
    tag: &str,
    mode: Mode,
    start: i64,
    end: i64,
    details: bool,
) -> Result<String, RemoteError> {
    let mut url = url::Url::parse(base)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| RemoteError::InvalidBaseUrl(base.to_string()))?;
        let start = start.to_string();
        let end = end.to_string();
        segments.extend([
            "crm", "cod", "v2", "title", TITLE, "platform", platform, "gamer", tag, "matches",
            mode.as_str(), "start", &start, "end", &end,
        ]);
        if details {
            segments.push("details");
        }
    }
    Ok(url.into())
}

fn match_id_of(value: &Value) -> Option<String> {
    match value.get("matchID") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn matches_of(data: Value) -> Vec<Value> {
    match data.get("matches") {
        Some(Value::Array(matches)) => matches.clone(),
        _ => Vec::new(),
    }
}

#[async_trait::async_trait]
impl StatsApi for HttpStatsApi {
    async fn ensure_logged_in(&self) -> Result<(), RemoteError> {
        let mut session = self.session.write().await;
        if session.is_logged_in() {
            return Ok(());
        }
        session.login().await
    }

    async fn fetch_history_page(
        &self,
        tag: &str,
        platform: &str,
        mode: Mode,
        start: i64,
        end: i64,
    ) -> Result<Vec<MatchCandidate>, RemoteError> {
        let session = self.session.read().await;
        let url = matches_url(session.base_url(), platform, tag, mode, start, end, false)?;
        let data = session.get_data(&url).await?;

        let mut candidates = Vec::new();
        for entry in matches_of(data) {
            let Some(match_id) = match_id_of(&entry) else {
                tracing::warn!(%mode, "History entry without matchID, skipping");
                continue;
            };
            let Some(timestamp) = entry.get("timestamp").and_then(Value::as_i64) else {
                tracing::warn!(%mode, match_id, "History entry without timestamp, skipping");
                continue;
            };
            candidates.push(MatchCandidate {
                match_id,
                timestamp,
            });
        }
        Ok(candidates)
    }

    async fn fetch_range(
        &self,
        tag: &str,
        platform: &str,
        mode: Mode,
        start: i64,
        end: i64,
    ) -> Result<Vec<MatchRecord>, RemoteError> {
        let session = self.session.read().await;
        let url = matches_url(session.base_url(), platform, tag, mode, start, end, true)?;
        let data = session.get_data(&url).await?;

        let mut records = Vec::new();
        for payload in matches_of(data) {
            let Some(match_id) = match_id_of(&payload) else {
                // Cannot be matched back to a request; the requester will
                // count the id as not-found.
                tracing::warn!(%mode, "Range result without matchID, dropping");
                continue;
            };
            records.push(MatchRecord { match_id, payload });
        }
        Ok(records)
    }
}
