use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{CaptureDepth, PaneDriver, TargetAddress};

/// Titles tmux reports when nobody has named the pane
const SHELL_TITLES: &[&str] = &["bash", "zsh", "sh", "fish"];

static RE_KEY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([CMS]-\S|Enter|Escape|Tab|BSpace|Space|Up|Down|Left|Right|PageUp|PageDown)$")
        .unwrap()
});

/// Client for interacting with tmux via CLI
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self::with_path("tmux")
    }

    pub fn with_path(tmux_path: impl Into<String>) -> Self {
        Self {
            tmux_path: tmux_path.into(),
        }
    }

    /// Check if tmux server is running
    pub async fn is_server_running(&self) -> bool {
        Command::new(&self.tmux_path)
            .arg("list-sessions")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run tmux with `args` and return stdout. The child is killed if the
    /// returned future is dropped, so callers can wrap it in a timeout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "running tmux");
        let output = Command::new(&self.tmux_path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute tmux {}", args[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("tmux {} failed: {}", args[0], stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Get the command to attach to a pane (for external execution)
    pub fn attach_command(&self, target: &TargetAddress) -> Vec<String> {
        vec![
            self.tmux_path.clone(),
            "attach-session".to_string(),
            "-t".to_string(),
            target.raw().to_string(),
        ]
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaneDriver for TmuxClient {
    async fn list_panes(&self, session: &str) -> Result<Vec<TargetAddress>> {
        // Format: window_index.pane_index, across all windows of the session
        let stdout = self
            .run(&[
                "list-panes",
                "-s",
                "-t",
                session,
                "-F",
                "#{window_index}.#{pane_index}",
            ])
            .await?;
        Ok(parse_pane_list(session, &stdout))
    }

    async fn capture(&self, target: &TargetAddress, depth: CaptureDepth) -> Result<String> {
        let start = match depth {
            CaptureDepth::Lines(n) => format!("-{}", n),
            CaptureDepth::All => "-".to_string(),
        };
        self.run(&["capture-pane", "-p", "-t", target.raw(), "-S", &start])
            .await
    }

    async fn send(&self, target: &TargetAddress, text: &str, append_enter: bool) -> Result<()> {
        if is_key_name(text) {
            self.run(&["send-keys", "-t", target.raw(), text]).await?;
        } else {
            self.run(&["send-keys", "-t", target.raw(), "-l", text])
                .await?;
        }

        if append_enter {
            self.run(&["send-keys", "-t", target.raw(), "Enter"]).await?;
        }
        Ok(())
    }

    async fn pane_title(&self, target: &TargetAddress) -> Result<Option<String>> {
        let stdout = self
            .run(&["display-message", "-p", "-t", target.raw(), "#{pane_title}"])
            .await?;
        Ok(pane_name_from_title(&stdout))
    }
}

/// Parse `list-panes` output lines of the form `window.pane`
fn parse_pane_list(session: &str, stdout: &str) -> Vec<TargetAddress> {
    stdout
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once('.'))
        .filter(|(window, pane)| !window.is_empty() && !pane.is_empty())
        .map(|(window, pane)| TargetAddress::pane(session, window, pane))
        .collect()
}

/// tmux key names such as `C-c` are sent as keys rather than literal text
fn is_key_name(text: &str) -> bool {
    RE_KEY_NAME.is_match(text)
}

fn pane_name_from_title(title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() || SHELL_TITLES.contains(&title) {
        None
    } else {
        Some(title.to_string())
    }
}
