use thiserror::Error;

/// Errors from the remote statistics service.
///
/// `is_rate_limited()` distinguishes the rate-limit condition (observed as
/// HTTP 429, and 403 once the service starts throttling a session) from
/// ordinary failures, so the orchestrator can write backoff state instead of
/// retrying blindly.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Session is not logged in")]
    NotLoggedIn,

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl RemoteError {
    /// Whether this failure carries the rate-limit signature.
    ///
    /// Error bodies from the service are free-form, so besides proper status
    /// codes the message text is matched for the codes too.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            RemoteError::HttpStatus { status, .. } => *status == 429 || *status == 403,
            RemoteError::Http(e) => e
                .status()
                .is_some_and(|s| s.as_u16() == 429 || s.as_u16() == 403),
            RemoteError::Api(msg) | RemoteError::Login(msg) => {
                msg.contains("429") || msg.contains("403")
            }
            _ => false,
        }
    }
}
