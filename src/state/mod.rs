//! Persistent run state shared across process invocations.
//!
//! Two small JSON files under the data directory:
//! - `rate_limit_until.json` — the backoff window written after a detected
//!   rate-limit response; while it is in the future no run may contact the
//!   remote service at all.
//! - `failure_stats.json` — per-match consecutive-failure counts; a match
//!   whose count reaches the cutoff is excluded from further retries.
//!
//! The engine is the sole writer of both files. One sync process at a time
//! is assumed; concurrent runs are not guarded against.

pub mod error;
pub mod governor;
pub mod ledger;

pub use error::StateError;
pub use governor::{RateLimitGovernor, RateLimitInfo};
pub use ledger::FailureLedger;
