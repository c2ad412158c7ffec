use std::path::PathBuf;

use crate::sync::batch::BatchLimits;
use crate::sync::SyncOptions;
use crate::types::{LogLevel, Mode};

/// Application configuration, resolved from the CLI.
///
/// All state lives under `data_dir`: the roster, the two state files and the
/// output directory. The roster path alone can be pointed elsewhere.
pub struct Config {
    pub player: Option<String>,
    pub sso_token: String,
    pub data_dir: PathBuf,
    pub roster_path: PathBuf,
    pub modes: Vec<Mode>,
    pub concurrent_batches: usize,
    pub initial_backoff_mins: i64,
    pub failure_cutoff: u32,
    pub log_level: LogLevel,
    pub dry_run: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("player", &self.player)
            .field("sso_token", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("roster_path", &self.roster_path)
            .field("modes", &self.modes)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> Self {
        let data_dir = expand_tilde(&cli.data_dir);
        let roster_path = cli
            .roster
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| data_dir.join("players.json"));

        // Repeated -m flags collapse to one pass per mode.
        let mut seen = std::collections::HashSet::new();
        let mut modes = cli.modes;
        modes.retain(|m| seen.insert(*m));

        Self {
            player: cli.player,
            sso_token: cli.sso_token,
            data_dir,
            roster_path,
            modes,
            concurrent_batches: cli.concurrent_batches as usize,
            initial_backoff_mins: cli.initial_backoff_mins,
            failure_cutoff: cli.failure_cutoff,
            log_level: cli.log_level,
            dry_run: cli.dry_run,
            no_progress_bar: cli.no_progress_bar,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            output_dir: self.data_dir.join("output"),
            rate_limit_path: self.data_dir.join("rate_limit_until.json"),
            failures_path: self.data_dir.join("failure_stats.json"),
            modes: self.modes.clone(),
            limits: BatchLimits {
                concurrent_batches: self.concurrent_batches,
                ..Default::default()
            },
            failure_cutoff: self.failure_cutoff,
            initial_backoff_mins: self.initial_backoff_mins,
            dry_run: self.dry_run,
            no_progress_bar: self.no_progress_bar,
        }
    }
}
