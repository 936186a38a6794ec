mod client;
mod heuristics;
mod status;
mod target;

pub use client::TmuxClient;
pub use heuristics::{
    classify, last_non_blank_line, tail_lines, AgentKind, AgentState, Classification, Decision,
    Markers, Rule, RuleId, StateClassifier, DEFAULT_RULES,
};
pub use status::{
    PaneDetail, PaneOutcome, PaneSummary, SessionReport, StateCounts, StatusAggregator,
    StatusOptions, StatusReport,
};
pub use target::TargetAddress;

use anyhow::Result;
use async_trait::async_trait;

/// How much scrollback to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDepth {
    /// The last `n` lines of history plus the visible screen
    Lines(usize),
    /// The entire history
    All,
}

/// Screen capture and key injection for tmux panes
#[async_trait]
pub trait PaneDriver: Send + Sync {
    /// List every pane of a session. Fails if the session does not exist.
    async fn list_panes(&self, session: &str) -> Result<Vec<TargetAddress>>;

    /// Capture the pane's text, most recent line last
    async fn capture(&self, target: &TargetAddress, depth: CaptureDepth) -> Result<String>;

    /// Type `text` into the pane, optionally followed by Enter
    async fn send(&self, target: &TargetAddress, text: &str, append_enter: bool) -> Result<()>;

    /// Human-assigned pane name, if any
    async fn pane_title(&self, _target: &TargetAddress) -> Result<Option<String>> {
        Ok(None)
    }
}
