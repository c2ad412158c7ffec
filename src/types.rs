use serde::{Deserialize, Serialize};

/// Game mode whose match history is synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
pub enum Mode {
    /// Multiplayer ("mp" in API paths).
    #[value(name = "mp")]
    Multiplayer,
    /// Warzone ("wz" in API paths).
    #[value(name = "wz")]
    Warzone,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Multiplayer => "mp",
            Mode::Warzone => "wz",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A match discovered via pagination but not yet confirmed downloaded.
///
/// Ordering by `timestamp` matters: pagination continues from the last
/// timestamp of the most recent page, and batch range requests span the
/// first and last timestamps of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub match_id: String,
    /// Match start time, Unix seconds.
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_as_str() {
        assert_eq!(Mode::Multiplayer.as_str(), "mp");
        assert_eq!(Mode::Warzone.as_str(), "wz");
    }

    #[test]
    fn test_mode_display_matches_as_str() {
        assert_eq!(Mode::Warzone.to_string(), "wz");
    }
}
