use std::path::PathBuf;
use std::time::Duration;

pub const SERVER_ID_VAR: &str = "SERVER_ID";
pub const STATS_FILE_VAR: &str = "WIDGET_STATS_FILE";
pub const API_BASE_VAR: &str = "WIDGET_API_BASE";

pub const DEFAULT_STATS_FILE: &str = "discord-stats.json";
pub const DEFAULT_API_BASE: &str = "https://discord.com/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_id: Option<String>,
    pub stats_path: PathBuf,
    pub api_base: String,
    pub timeout: Duration,
    pub jitter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_id: None,
            stats_path: PathBuf::from(DEFAULT_STATS_FILE),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            jitter: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            server_id: read(SERVER_ID_VAR),
            stats_path: read(STATS_FILE_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.stats_path),
            api_base: read(API_BASE_VAR).unwrap_or(defaults.api_base),
            ..defaults
        }
    }

    pub fn widget_url(&self, server_id: &str) -> String {
        format!(
            "{}/guilds/{}/widget.json",
            self.api_base.trim_end_matches('/'),
            server_id
        )
    }
}
