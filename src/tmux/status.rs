use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::heuristics::{
    last_non_blank_line, tail_lines, AgentState, Classification, StateClassifier,
};
use super::{CaptureDepth, PaneDriver, TargetAddress};
use crate::config::SentinelConfig;
use crate::error::SentinelError;

/// Capture depths, timeouts and tail length used when building reports
#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub scrollback: CaptureDepth,
    /// Timeout for single-pane capture, `capture_screen` and `send_message`
    pub capture_timeout: Duration,
    /// Timeout for each pane's capture in a session report
    pub pane_timeout: Duration,
    pub list_timeout: Duration,
    pub name_timeout: Duration,
    /// Raw lines kept in a single-pane report
    pub tail_lines: usize,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self::from(&SentinelConfig::default())
    }
}

impl From<&SentinelConfig> for StatusOptions {
    fn from(config: &SentinelConfig) -> Self {
        Self {
            scrollback: CaptureDepth::Lines(config.scrollback_lines),
            capture_timeout: Duration::from_millis(config.capture_timeout_ms),
            pane_timeout: Duration::from_millis(config.pane_timeout_ms),
            list_timeout: Duration::from_millis(config.list_timeout_ms),
            name_timeout: Duration::from_millis(config.name_timeout_ms),
            tail_lines: config.tail_lines,
        }
    }
}

/// Outcome of inspecting a single pane
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaneOutcome {
    Classified {
        classification: Classification,
        /// Last lines of the raw buffer, oldest first
        tail: Vec<String>,
    },
    CaptureFailed {
        error: String,
    },
}

/// Detailed report for one pane
#[derive(Debug, Clone, Serialize)]
pub struct PaneDetail {
    pub target: TargetAddress,
    #[serde(flatten)]
    pub outcome: PaneOutcome,
}

impl PaneDetail {
    pub fn classification(&self) -> Option<&Classification> {
        match &self.outcome {
            PaneOutcome::Classified { classification, .. } => Some(classification),
            PaneOutcome::CaptureFailed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PaneOutcome::CaptureFailed { .. })
    }
}

/// One row of a session report
#[derive(Debug, Clone, Serialize)]
pub struct PaneSummary {
    pub target: TargetAddress,
    /// Pane title, when the pane was given one
    pub display_name: Option<String>,
    pub classification: Classification,
    pub last_line: Option<String>,
    /// Set when the capture failed and `classification` is a placeholder
    pub capture_error: Option<String>,
}

impl PaneSummary {
    fn failed(target: TargetAddress, display_name: Option<String>, error: String) -> Self {
        Self {
            target,
            display_name,
            classification: Classification::stopped("capture failed"),
            last_line: None,
            capture_error: Some(error),
        }
    }

    /// Target plus pane title, e.g. `multiagent:0.1 (boss01)`
    pub fn display_target(&self) -> String {
        match &self.display_name {
            Some(name) => format!("{} ({})", self.target, name),
            None => self.target.to_string(),
        }
    }
}

/// Number of panes per state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StateCounts(BTreeMap<AgentState, usize>);

impl StateCounts {
    /// Count each pane under its surfaced state, so `Unknown` lands in `Stopped`
    pub fn tally<'a>(states: impl IntoIterator<Item = &'a Classification>) -> Self {
        let mut counts: BTreeMap<AgentState, usize> = AgentState::ALL
            .iter()
            .filter(|s| **s != AgentState::Unknown)
            .map(|s| (*s, 0))
            .collect();
        for classification in states {
            *counts.entry(classification.state.surfaced()).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, state: AgentState) -> usize {
        self.0.get(&state).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentState, usize)> + '_ {
        self.0.iter().map(|(state, count)| (*state, *count))
    }
}

/// Status of every pane in a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: String,
    pub panes: Vec<PaneSummary>,
    pub counts: StateCounts,
}

impl SessionReport {
    pub fn new(session: impl Into<String>, panes: Vec<PaneSummary>) -> Self {
        let counts = StateCounts::tally(panes.iter().map(|p| &p.classification));
        Self {
            session: session.into(),
            panes,
            counts,
        }
    }

    /// Look up a pane by `window.pane`, e.g. `"1.0"`
    pub fn get(&self, window_pane: &str) -> Option<&PaneSummary> {
        let (window, pane) = window_pane.split_once('.')?;
        self.panes.iter().find(|p| {
            p.target.window() == Some(window) && p.target.pane_token() == Some(pane)
        })
    }
}

/// Result of a status request
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatusReport {
    Pane(PaneDetail),
    Session(SessionReport),
}

/// Captures panes through a [`PaneDriver`] and classifies them
pub struct StatusAggregator<D> {
    driver: D,
    classifier: StateClassifier,
    options: StatusOptions,
}

impl<D: PaneDriver> StatusAggregator<D> {
    pub fn new(driver: D, options: StatusOptions) -> Self {
        Self::with_classifier(driver, StateClassifier::new(), options)
    }

    pub fn with_classifier(driver: D, classifier: StateClassifier, options: StatusOptions) -> Self {
        Self {
            driver,
            classifier,
            options,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn options(&self) -> &StatusOptions {
        &self.options
    }

    /// Status for a target string: a wildcard or missing target reports the
    /// whole session, anything else a single pane.
    pub async fn get_status(
        &self,
        target: Option<&str>,
        default_session: &str,
    ) -> Result<StatusReport, SentinelError> {
        let target = match target.filter(|t| !t.is_empty()) {
            Some(raw) => TargetAddress::parse(raw)?,
            None => return Ok(StatusReport::Session(self.session_status(default_session).await?)),
        };

        if target.is_wildcard() {
            Ok(StatusReport::Session(self.session_status(target.session()).await?))
        } else {
            Ok(StatusReport::Pane(self.pane_status(&target).await))
        }
    }

    /// Capture and classify one pane. Capture failures are kept in the result.
    pub async fn pane_status(&self, target: &TargetAddress) -> PaneDetail {
        let outcome = match self
            .capture_within(target, self.options.scrollback, self.options.capture_timeout)
            .await
        {
            Ok(text) => PaneOutcome::Classified {
                classification: self.classify(target, &text),
                tail: tail_lines(&text, self.options.tail_lines)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            Err(err) => {
                warn!(pane = %target, error = %err, "pane capture failed");
                PaneOutcome::CaptureFailed {
                    error: err.to_string(),
                }
            }
        };

        PaneDetail {
            target: target.clone(),
            outcome,
        }
    }

    /// Capture and classify every pane of `session`. A pane that fails to
    /// capture becomes a stopped placeholder; only a failure to list the
    /// session's panes fails the call.
    pub async fn session_status(&self, session: &str) -> Result<SessionReport, SentinelError> {
        let panes = within(self.options.list_timeout, self.driver.list_panes(session))
            .await
            .map_err(|reason| SentinelError::SessionNotFound {
                session: session.to_string(),
                reason,
            })?;

        debug!(session, panes = panes.len(), "collecting session status");
        let summaries = join_all(panes.into_iter().map(|target| self.summarize(target))).await;

        Ok(SessionReport::new(session, summaries))
    }

    async fn summarize(&self, target: TargetAddress) -> PaneSummary {
        let (captured, name) = tokio::join!(
            self.capture_within(&target, self.options.scrollback, self.options.pane_timeout),
            within(self.options.name_timeout, self.driver.pane_title(&target)),
        );
        let display_name = name.ok().flatten();

        match captured {
            Ok(text) => PaneSummary {
                classification: self.classify(&target, &text),
                last_line: last_non_blank_line(&text).map(|l| l.trim_end().to_string()),
                display_name,
                capture_error: None,
                target,
            },
            Err(err) => {
                warn!(pane = %target, error = %err, "pane capture failed");
                PaneSummary::failed(target, display_name, err.to_string())
            }
        }
    }

    /// Raw buffer text of a pane. `lines` of `None` or zero captures the
    /// whole history.
    pub async fn capture_screen(
        &self,
        target: &str,
        lines: Option<usize>,
    ) -> Result<String, SentinelError> {
        let target = pane_target(target)?;
        let depth = match lines {
            Some(n) if n > 0 => CaptureDepth::Lines(n),
            _ => CaptureDepth::All,
        };
        self.capture_within(&target, depth, self.options.capture_timeout)
            .await
    }

    /// Type `text` into a pane, optionally pressing Enter afterwards
    pub async fn send_message(
        &self,
        target: &str,
        text: &str,
        append_enter: bool,
    ) -> Result<(), SentinelError> {
        let target = pane_target(target)?;
        within(
            self.options.capture_timeout,
            self.driver.send(&target, text, append_enter),
        )
        .await
        .map_err(|reason| SentinelError::SendFailure {
            target: target.to_string(),
            reason,
        })
    }

    async fn capture_within(
        &self,
        target: &TargetAddress,
        depth: CaptureDepth,
        limit: Duration,
    ) -> Result<String, SentinelError> {
        within(limit, self.driver.capture(target, depth))
            .await
            .map_err(|reason| SentinelError::CaptureFailure {
                target: target.to_string(),
                reason,
            })
    }

    fn classify(&self, target: &TargetAddress, text: &str) -> Classification {
        self.classifier.classify_observed(text, &mut |decision| {
            debug!(
                pane = %target,
                rule = %decision.rule,
                state = %decision.classification.state,
                markers = ?decision.markers,
                "classified pane"
            );
        })
    }
}

/// Parse a target that must name a single pane
fn pane_target(raw: &str) -> Result<TargetAddress, SentinelError> {
    let target = TargetAddress::parse(raw)?;
    if target.is_wildcard() {
        return Err(SentinelError::invalid_target(raw));
    }
    Ok(target)
}

/// Await a driver call, turning errors and timeouts into a reason string
async fn within<T>(
    limit: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, String> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{:#}", err)),
        Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
    }
}
