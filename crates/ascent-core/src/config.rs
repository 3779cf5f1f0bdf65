use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// StatsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Enqueue a norms refresh after every Nth initial-questionnaire
    /// submission (counted across all users).
    #[serde(default = "default_refresh_every")]
    pub refresh_every: u64,
    /// Number of most recently registered users the refresh samples.
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
}

fn default_refresh_every() -> u64 {
    25
}

fn default_sample_size() -> u32 {
    100
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            refresh_every: default_refresh_every(),
            sample_size: default_sample_size(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_nudge_db_path")]
    pub nudge_db_path: PathBuf,

    /// Seconds between scans of the nudge store for due work.
    #[serde(default = "default_nudge_poll_seconds")]
    pub nudge_poll_seconds: u64,

    #[serde(default)]
    pub stats: StatsConfig,

    /// Base URL of the external action-plan service. None disables the
    /// generate-actions endpoint.
    #[serde(default)]
    pub planner_url: Option<String>,

    /// Shared API token. None disables the token gate (local development).
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ascent.db")
}

fn default_nudge_db_path() -> PathBuf {
    PathBuf::from("nudges.redb")
}

fn default_nudge_poll_seconds() -> u64 {
    30
}

fn default_port() -> u16 {
    8420
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            nudge_db_path: default_nudge_db_path(),
            nudge_poll_seconds: default_nudge_poll_seconds(),
            stats: StatsConfig::default(),
            planner_url: None,
            api_token: None,
            port: default_port(),
        }
    }
}

impl Config {
    /// Load config from a YAML file. A missing file yields the defaults so a
    /// fresh checkout runs without any setup.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg.port, 8420);
        assert_eq!(cfg.stats.refresh_every, 25);
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ascent.yaml");
        std::fs::write(&path, "port: 9000\nstats:\n  sample_size: 10\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.stats.sample_size, 10);
        assert_eq!(cfg.stats.refresh_every, 25);
        assert_eq!(cfg.database_path, PathBuf::from("ascent.db"));
    }

    #[test]
    fn planner_url_and_token_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ascent.yaml");
        std::fs::write(
            &path,
            "planner_url: http://localhost:9100\napi_token: sekrit\n",
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.planner_url.as_deref(), Some("http://localhost:9100"));
        assert_eq!(cfg.api_token.as_deref(), Some("sekrit"));
    }
}
