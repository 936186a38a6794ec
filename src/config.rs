use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::SentinelError;

/// Runtime settings. Sources, lowest precedence first: defaults, the JSON
/// config file, `AGENT_SENTINEL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Session reported when no target is given
    pub default_session: String,
    /// Path to tmux binary
    pub tmux_path: String,
    pub scrollback_lines: usize,
    pub capture_timeout_ms: u64,
    pub pane_timeout_ms: u64,
    pub list_timeout_ms: u64,
    pub name_timeout_ms: u64,
    pub tail_lines: usize,
    pub refresh_interval_ms: u64,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            default_session: "multiagent".to_string(),
            tmux_path: "tmux".to_string(),
            scrollback_lines: 3000,
            capture_timeout_ms: 5000,
            pane_timeout_ms: 3000,
            list_timeout_ms: 5000,
            name_timeout_ms: 1000,
            tail_lines: 20,
            refresh_interval_ms: 1000,
            log_level: "warn".to_string(),
        }
    }
}

impl SentinelConfig {
    /// Load from `path` if given, else from the default location if it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SentinelError> {
        let (config, warnings) = Self::load_with_warnings(path)?;
        for warning in warnings {
            warn!("{}", warning);
        }
        Ok(config)
    }

    /// Like [`SentinelConfig::load`], but hands back ignored environment
    /// values instead of logging them, for callers that set up logging
    /// from the loaded config.
    pub fn load_with_warnings(path: Option<&Path>) -> Result<(Self, Vec<String>), SentinelError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        let warnings = config.apply_env(|key| std::env::var(key).ok());
        Ok((config, warnings))
    }

    pub fn from_file(path: &Path) -> Result<Self, SentinelError> {
        let content = std::fs::read_to_string(path).map_err(|e| SentinelError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| SentinelError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Override fields from environment variables looked up through `var`.
    /// Returns a message for each value that could not be used.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut ignored = Vec::new();
        if let Some(session) = var("AGENT_SENTINEL_SESSION_NAME") {
            self.default_session = session;
        }
        if let Some(tmux_path) = var("AGENT_SENTINEL_TMUX_PATH") {
            self.tmux_path = tmux_path;
        }
        if let Some(level) = var("AGENT_SENTINEL_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(lines) = var("AGENT_SENTINEL_SCROLLBACK_LINES") {
            match lines.parse() {
                Ok(lines) => self.scrollback_lines = lines,
                Err(_) => ignored.push(format!(
                    "ignoring invalid AGENT_SENTINEL_SCROLLBACK_LINES: {:?}",
                    lines
                )),
            }
        }
        ignored
    }
}

/// `<config dir>/agent-sentinel/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("agent-sentinel").join("config.json"))
}

/// `<cache dir>/agent-sentinel/watch.log`, where the dashboard writes its logs
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("agent-sentinel").join("watch.log"))
}
