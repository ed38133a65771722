use crate::{
    constant::{
        CONFIG_DIR, CONFIG_ENV, CONFIG_FILE, DB_FILE, DEFAULT_COMMAND_BUFFER, DEFAULT_EVENT_BUFFER,
        DEFAULT_FOCUS_DELAY_MS, DEFAULT_ORIGIN,
    },
    FeedError, FeedResult,
};
use home::home_dir;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Origin used to build shareable post links.
    /// Example: https://beats.example
    pub app_origin: String,
    /// Path to the sqlite Db backing the store.
    pub db: PathBuf,
    /// Default tracing filter when RUST_LOG is not set.
    pub log_filter: String,
    /// Capacity of the command channel into a feed session.
    pub command_buffer: usize,
    /// Capacity of the broadcast channel carrying feed events.
    pub event_buffer: usize,
    /// Delay before asking the UI to focus the comment input.
    pub focus_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            app_origin: DEFAULT_ORIGIN.into(),
            db: config_dir().join(DB_FILE),
            log_filter: "info".into(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            focus_delay_ms: DEFAULT_FOCUS_DELAY_MS,
        }
    }
}

impl FeedConfig {
    /// Load the config from `path`, or from `$BEATFEEDCONF`, or from
    /// `~/.beatfeed/beatfeed.toml`, in that order. A missing file yields the
    /// defaults; a file that fails to parse is an error.
    pub fn load(path: Option<&Path>) -> FeedResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir().join(CONFIG_FILE)),
        };
        if !path.try_exists()? {
            debug!("No config at {path:?}; using defaults");
            return Ok(Self::default());
        }
        let buf = std::fs::read_to_string(&path)?;
        Self::from_toml(&buf)
    }

    pub fn from_toml(buf: &str) -> FeedResult<Self> {
        toml::from_str(buf)
            .map_err(|err| FeedError::custom_error(format!("Parsing error: {err}")).into())
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }
}

fn config_dir() -> PathBuf {
    home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
        .join(CONFIG_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = FeedConfig::from_toml(
            r#"
            app_origin = "https://beats.example"
            focus_delay_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.app_origin, "https://beats.example");
        assert_eq!(config.focus_delay(), Duration::from_millis(250));
        assert_eq!(config.command_buffer, DEFAULT_COMMAND_BUFFER);
        assert!(config.db.ends_with(DB_FILE));
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(FeedConfig::from_toml("app_origin = ").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("beatfeed-does-not-exist.toml");
        let config = FeedConfig::load(Some(&path)).unwrap();
        assert_eq!(config, FeedConfig::default());
    }
}
