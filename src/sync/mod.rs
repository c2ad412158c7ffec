//! Sync orchestration.
//!
//! One run walks a fixed state machine:
//! `CheckBackoff -> FetchCandidates -> Dedup -> Scheduling -> Finalize`.
//! An active backoff window aborts before any network contact. Candidate
//! retrieval runs concurrently across player groups but sequentially within
//! a group's accounts, keeping total listing concurrency bounded by the
//! roster size. Finalize persists the failure ledger and clears the backoff
//! state only when the whole run saw no rate-limit error; otherwise it
//! extends the backoff window and reports failure. The ledger deliberately
//! stays unpersisted on the rate-limited path, so in-run increments are
//! re-attempted on the next run.

pub mod batch;
pub mod pagination;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use futures_util::future::try_join_all;
use indicatif::{ProgressBar, ProgressStyle};

use crate::remote::{RemoteError, StatsApi};
use crate::roster::PlayerGroup;
use crate::state::{FailureLedger, RateLimitGovernor};
use crate::store::OutputStore;
use crate::types::{MatchCandidate, Mode};
use batch::BatchLimits;

/// Run-wide knobs, derived from CLI config so the engine stays testable
/// without argument parsing.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub output_dir: PathBuf,
    pub rate_limit_path: PathBuf,
    pub failures_path: PathBuf,
    pub modes: Vec<Mode>,
    pub limits: BatchLimits,
    pub failure_cutoff: u32,
    pub initial_backoff_mins: i64,
    pub dry_run: bool,
    pub no_progress_bar: bool,
}

/// Aggregate outcome of one run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub candidates: u64,
    pub stored: u64,
    pub failed: u64,
    pub skipped: u64,
    pub rate_limited: bool,
}

/// Execute one full sync over the selected player groups.
pub async fn run(
    opts: &SyncOptions,
    groups: Vec<PlayerGroup>,
    api: &dyn StatsApi,
) -> anyhow::Result<SyncReport> {
    let governor = RateLimitGovernor::new(opts.rate_limit_path.clone(), opts.initial_backoff_mins);

    // CheckBackoff: refuse to proceed before any network contact.
    let remaining = governor.remaining_backoff_secs()?;
    if remaining > 0 {
        bail!(
            "Waiting [{}] more mins because of rate limiting",
            format_remaining_mins(remaining)
        );
    }

    let store = OutputStore::open(&opts.output_dir)?;
    let mut ledger = FailureLedger::load(opts.failures_path.clone())?;

    let started = Instant::now();
    let result = run_inner(opts, &groups, api, &store, &mut ledger).await;

    match result {
        Ok(report) if report.rate_limited => {
            governor.record_rate_limit_failure()?;
            bail!("Run hit the service rate limit; backoff window written");
        }
        Ok(report) => {
            if !opts.dry_run {
                ledger.persist()?;
                governor.clear()?;
            }
            log_summary(&report, started.elapsed(), opts.dry_run);
            Ok(report)
        }
        Err(e) => {
            if is_rate_limit_error(&e) {
                // Keep the run error; a failed backoff write is only logged.
                if let Err(state_err) = governor.record_rate_limit_failure() {
                    tracing::error!("Failed to write backoff state: {state_err}");
                }
            }
            Err(e)
        }
    }
}

async fn run_inner(
    opts: &SyncOptions,
    groups: &[PlayerGroup],
    api: &dyn StatsApi,
    store: &OutputStore,
    ledger: &mut FailureLedger,
) -> anyhow::Result<SyncReport> {
    api.ensure_logged_in().await.context("Login failed")?;

    // FetchCandidates: concurrent across groups, sequential within one.
    // A group's candidate set is the union over its linked accounts, since
    // a real player's matches surface under each identity. Any listing
    // failure is fatal for the whole run.
    let group_candidates = try_join_all(groups.iter().map(|group| async move {
        let mut per_mode: Vec<(Mode, Vec<MatchCandidate>)> = Vec::new();
        for &mode in &opts.modes {
            let mut union: Vec<MatchCandidate> = Vec::new();
            for account in &group.accounts {
                let history = pagination::retrieve_full_history(api, account, mode)
                    .await
                    .with_context(|| {
                        format!(
                            "Exhaustive retrieval failed for [{}] [{}]",
                            account.tag, mode
                        )
                    })?;
                union.extend(history);
            }
            per_mode.push((mode, dedup_candidates(union)));
        }
        Ok::<_, anyhow::Error>(per_mode)
    }))
    .await?;

    let downloaded = store.scan_downloaded()?;
    tracing::debug!(pairs = downloaded.len(), "Downloaded index rebuilt");

    let mut report = SyncReport::default();
    'groups: for (group, per_mode) in groups.iter().zip(group_candidates) {
        for (mode, candidates) in &per_mode {
            report.candidates += candidates.len() as u64;
            for account in &group.accounts {
                if opts.dry_run {
                    let eligible = batch::select_eligible(
                        candidates,
                        &account.uno_id,
                        &downloaded,
                        ledger,
                        opts.failure_cutoff,
                    );
                    tracing::info!(
                        "[DRY RUN] Would fetch [{}] matches for [{}] [{}]",
                        eligible.len(),
                        account.tag,
                        mode
                    );
                    report.skipped += (candidates.len() - eligible.len()) as u64;
                    continue;
                }

                let outcome = batch::download_matches(
                    api,
                    account,
                    *mode,
                    candidates,
                    store,
                    &downloaded,
                    ledger,
                    opts.failure_cutoff,
                    opts.limits,
                    opts.no_progress_bar,
                )
                .await?;
                report.stored += outcome.stored;
                report.failed += outcome.failed;
                report.skipped += outcome.skipped;
                if outcome.rate_limited {
                    report.rate_limited = true;
                    break 'groups;
                }
            }
        }
    }
    Ok(report)
}

/// Drop repeated ids (same match seen from several linked accounts) and
/// order ascending so chunk range requests span tight windows.
fn dedup_candidates(mut candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.match_id.clone()));
    candidates.sort_by_key(|c| c.timestamp);
    candidates
}

/// Whether any cause in the chain carries the rate-limit signature.
fn is_rate_limit_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<RemoteError>()
            .is_some_and(RemoteError::is_rate_limited)
    })
}

/// Whole minutes remaining, with `"< 1"` under a minute.
fn format_remaining_mins(remaining_secs: i64) -> String {
    if remaining_secs < 60 {
        "< 1".to_string()
    } else {
        (remaining_secs / 60).to_string()
    }
}

fn log_summary(report: &SyncReport, elapsed: Duration, dry_run: bool) {
    if dry_run {
        tracing::info!("── Dry Run Summary ──");
        tracing::info!(
            "  {} candidates, {} already stored or past the cutoff",
            report.candidates,
            report.skipped
        );
        return;
    }
    tracing::info!("── Summary ──");
    tracing::info!(
        "  {} stored, {} failed, {} skipped, {} candidates",
        report.stored,
        report.failed,
        report.skipped,
        report.candidates
    );
    tracing::info!("  elapsed: {}", format_duration(elapsed));
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Progress bar for a scheduling run, hidden for non-TTY output or when the
/// user asked for none.
pub(crate) fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}
