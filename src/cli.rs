use clap::Parser;

use crate::types::{LogLevel, Mode};

#[derive(Parser, Debug)]
#[command(name = "codsync", about = "Sync Call of Duty match history to local JSON files")]
pub struct Cli {
    /// Player to sync (roster name, case-insensitive). Omit to sync everyone.
    pub player: Option<String>,

    /// Data directory holding players.json, state files and output/
    #[arg(short = 'd', long, env = "COD_DATADIR", default_value = "~/.codsync")]
    pub data_dir: String,

    /// ACT SSO cookie value.
    /// WARNING: passing via --sso-token is visible in process listings.
    /// Prefer the COD_SSO environment variable instead.
    #[arg(long, env = "COD_SSO", hide_env_values = true)]
    pub sso_token: String,

    /// Roster file (defaults to players.json inside the data directory)
    #[arg(long)]
    pub roster: Option<String>,

    /// Game mode(s) to sync
    #[arg(short = 'm', long = "mode", value_enum, default_values = ["wz"])]
    pub modes: Vec<Mode>,

    /// Range requests in flight at once within a pass
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrent_batches: u64,

    /// Consecutive failures after which a match is no longer retried
    #[arg(long, default_value_t = 50)]
    pub failure_cutoff: u32,

    /// Backoff applied to the first observed rate-limit failure, in minutes
    #[arg(long, default_value_t = 60)]
    pub initial_backoff_mins: i64,

    /// Report what would be fetched without any range requests or writes
    #[arg(long)]
    pub dry_run: bool,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
