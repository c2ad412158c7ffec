//! codsync — incremental Call of Duty match-history downloader.
//!
//! Walks each rostered player's full match history through the paginated
//! listing endpoint, then fetches full match records in bounded concurrent
//! batches. Every fetched match lands as one JSON file under the data
//! directory; the files themselves are the record of what has been synced,
//! so re-runs only fetch what is missing. Rate-limit responses write a
//! doubling backoff window that later runs honor before any network call.

#![warn(clippy::all)]

mod cli;
mod config;
mod remote;
mod roster;
mod state;
mod store;
mod sync;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use remote::{HttpStatsApi, Session, DEFAULT_BASE_URL};
use roster::Roster;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let filter = match cli.log_level {
        types::LogLevel::Debug => "debug",
        types::LogLevel::Info => "info",
        types::LogLevel::Warn => "warn",
        types::LogLevel::Error => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = config::Config::from_cli(cli);
    tracing::debug!(?config, "Starting codsync");

    let roster = Roster::load(&config.roster_path)?;
    if roster.is_empty() {
        anyhow::bail!(
            "Roster at {} has no players",
            config.roster_path.display()
        );
    }
    let groups = roster.select(config.player.as_deref())?;
    tracing::info!(
        players = groups.len(),
        modes = ?config.modes,
        "Syncing match history"
    );

    let session = Session::new(DEFAULT_BASE_URL, &config.sso_token)?;
    let api = HttpStatsApi::new(session);

    let opts = config.sync_options();
    sync::run(&opts, groups, &api).await?;
    Ok(())
}
