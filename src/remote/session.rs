//! Authenticated session with the statistics service.
//!
//! The logged-in state is an explicit field on this handle, not a
//! process-wide flag: callers hold the session and check the precondition
//! before issuing requests. Authentication uses the service's SSO cookie;
//! the token itself is issued out-of-band and verified by a separate tool,
//! outside this crate.

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use serde_json::Value;

use super::RemoteError;

pub const DEFAULT_BASE_URL: &str = "https://my.callofduty.com/api/papi-client";

const CLIENT_USER_AGENT: &str = concat!("codsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

pub struct Session {
    client: reqwest::Client,
    base_url: String,
    logged_in: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("logged_in", &self.logged_in)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build an unauthenticated session carrying the SSO cookie on every
    /// request. No network contact happens here; see [`Session::login`].
    pub fn new(base_url: impl Into<String>, sso_token: &str) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let cookie = HeaderValue::from_str(&format!("ACT_SSO_COOKIE={sso_token}"))
            .map_err(|_| RemoteError::Login("SSO token contains invalid characters".into()))?;
        headers.insert(COOKIE, cookie);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            logged_in: false,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Validate the SSO cookie against the identity endpoint and mark the
    /// session authenticated. A 403 here reads as the rate-limit signature,
    /// which is what the service returns for throttled sessions.
    pub async fn login(&mut self) -> Result<(), RemoteError> {
        let url = format!("{}/crm/cod/v2/identities/current", self.base_url);
        let value = self.request_json(&url).await?;
        envelope_data(&url, value)?;
        self.logged_in = true;
        tracing::debug!("Session authenticated");
        Ok(())
    }

    /// GET a JSON envelope and return its `data` member.
    ///
    /// Precondition: the session must be logged in.
    pub(crate) async fn get_data(&self, url: &str) -> Result<Value, RemoteError> {
        if !self.logged_in {
            return Err(RemoteError::NotLoggedIn);
        }
        let value = self.request_json(url).await?;
        envelope_data(url, value)
    }

    async fn request_json(&self, url: &str) -> Result<Value, RemoteError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                endpoint: url.to_string(),
            });
        }
        Ok(resp.json().await?)
    }
}

/// Unwrap the service's `{"status": "success", "data": ...}` envelope.
fn envelope_data(endpoint: &str, value: Value) -> Result<Value, RemoteError> {
    match value.get("status").and_then(Value::as_str) {
        Some("success") => Ok(value.get("data").cloned().unwrap_or(Value::Null)),
        _ => {
            let message = value
                .pointer("/data/message")
                .and_then(Value::as_str)
                .unwrap_or("unrecognized response envelope");
            Err(RemoteError::Api(format!("{message} (from {endpoint})")))
        }
    }
}
