use std::fmt::{self, Write};

use crate::tmux::{AgentState, PaneDetail, PaneOutcome, SessionReport, StatusReport};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Icon shown next to a state in reports and the dashboard
pub fn state_icon(state: AgentState) -> &'static str {
    match state {
        AgentState::RunningClaude => "✅",
        AgentState::RunningGemini => "💎",
        AgentState::AuthenticatingClaude => "🔐",
        AgentState::AuthenticatingGemini => "🔑",
        AgentState::ExecutingClaude => "⚡",
        AgentState::Stopped => "⚫",
        AgentState::Unknown => "❓",
    }
}

/// Label used in the count summary
pub fn state_label(state: AgentState) -> &'static str {
    match state {
        AgentState::RunningClaude => "Claude running",
        AgentState::RunningGemini => "Gemini running",
        AgentState::AuthenticatingClaude => "Claude authenticating",
        AgentState::AuthenticatingGemini => "Gemini authenticating",
        AgentState::ExecutingClaude => "Claude executing",
        AgentState::Stopped => "Stopped",
        AgentState::Unknown => "Unknown",
    }
}

impl fmt::Display for PaneDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🔍 Status of {}", self.target)?;
        writeln!(f, "{}", RULE)?;
        match &self.outcome {
            PaneOutcome::Classified {
                classification,
                tail,
            } => {
                let state = classification.state.surfaced();
                writeln!(f, "📊 State:  {} {}", state_icon(state), state)?;
                writeln!(f, "🤖 Agent:  {}", classification.agent)?;
                writeln!(f, "📝 Detail: {}", classification.detail)?;
                writeln!(f, "{}", RULE)?;
                writeln!(f)?;
                writeln!(f, "📺 Screen (last {} lines):", tail.len())?;
                for line in tail {
                    writeln!(f, "{}", line)?;
                }
            }
            PaneOutcome::CaptureFailed { error } => {
                writeln!(f, "❌ Capture failed: {}", error)?;
                writeln!(f, "{}", RULE)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🌐 All panes of session \"{}\":", self.session)?;
        writeln!(f, "{}", RULE)?;

        for pane in &self.panes {
            let mut row = String::new();
            match &pane.capture_error {
                Some(error) => write!(
                    row,
                    "❌ {:<30} | {:<8} | {:<16} | {}",
                    pane.display_target(),
                    "error",
                    "capture_fail",
                    error
                )?,
                None => {
                    let last_line: String = pane
                        .last_line
                        .as_deref()
                        .unwrap_or("(empty)")
                        .chars()
                        .take(50)
                        .collect();
                    let state = pane.classification.state.surfaced();
                    write!(
                        row,
                        "{} {:<30} | {:<8} | {:<16} | {}",
                        state_icon(state),
                        pane.display_target(),
                        pane.classification.agent.as_str(),
                        state.as_str(),
                        last_line
                    )?
                }
            }
            writeln!(f, "{}", row.trim_end())?;
        }

        writeln!(f, "{}", RULE)?;
        writeln!(f, "📊 Summary:")?;
        for (state, count) in self.counts.iter() {
            writeln!(f, "   {} {}: {}", state_icon(state), state_label(state), count)?;
        }
        Ok(())
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReport::Pane(detail) => fmt::Display::fmt(detail, f),
            StatusReport::Session(report) => fmt::Display::fmt(report, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::{classify, Classification, PaneSummary, TargetAddress};

    fn summary(target: &str, classification: Classification, last_line: &str) -> PaneSummary {
        PaneSummary {
            target: TargetAddress::parse(target).unwrap(),
            display_name: None,
            classification,
            last_line: Some(last_line.to_string()),
            capture_error: None,
        }
    }

    #[test]
    fn test_pane_detail_rendering() {
        let detail = PaneDetail {
            target: TargetAddress::parse("dev:0.1").unwrap(),
            outcome: PaneOutcome::Classified {
                classification: Classification::stopped("stopped (shell prompt)"),
                tail: vec!["make".to_string(), "user@host:~$".to_string()],
            },
        };
        let text = detail.to_string();
        assert!(text.contains("Status of dev:0.1"));
        assert!(text.contains("⚫ stopped"));
        assert!(text.contains("Agent:  none"));
        assert!(text.ends_with("make\nuser@host:~$\n"));
    }

    #[test]
    fn test_pane_failure_rendering() {
        let detail = PaneDetail {
            target: TargetAddress::parse("dev:0.1").unwrap(),
            outcome: PaneOutcome::CaptureFailed {
                error: "Failed to capture pane dev:0.1: timed out after 5000ms".to_string(),
            },
        };
        assert!(detail.to_string().contains("❌ Capture failed: Failed to capture pane dev:0.1"));
    }

    #[test]
    fn test_session_report_rendering() {
        let mut failed = summary("w:0.2", Classification::stopped("capture failed"), "");
        failed.last_line = None;
        failed.capture_error = Some("can't find pane".to_string());

        let mut named = summary(
            "w:0.0",
            Classification::new(AgentState::RunningClaude, "Claude started"),
            ">",
        );
        named.display_name = Some("boss01".to_string());

        let report = SessionReport::new("w", vec![named, failed]);
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "🌐 All panes of session \"w\":");
        assert!(lines[2].starts_with("✅ w:0.0 (boss01)"));
        assert!(lines[2].contains("| claude   | running_claude   | >"));
        assert!(lines[3].starts_with("❌ w:0.2"));
        assert!(lines[3].ends_with("| error    | capture_fail     | can't find pane"));
        assert!(text.contains("✅ Claude running: 1"));
        assert!(text.contains("⚫ Stopped: 1"));
        assert!(!text.contains("Unknown"));
    }

    #[test]
    fn test_unrecognized_screen_renders_as_stopped() {
        let classification = classify("compiling 42 crates\nfinished");
        assert_eq!(classification.state, AgentState::Unknown);

        let detail = PaneDetail {
            target: TargetAddress::parse("w:0.0").unwrap(),
            outcome: PaneOutcome::Classified {
                classification: classification.clone(),
                tail: vec!["finished".to_string()],
            },
        };
        let text = detail.to_string();
        assert!(text.contains("📊 State:  ⚫ stopped"));
        assert!(text.contains("📝 Detail: unrecognized screen content"));

        let report = SessionReport::new("w", vec![summary("w:0.0", classification, "finished")]);
        let text = report.to_string();
        let row = text.lines().nth(2).unwrap();
        assert!(row.starts_with("⚫ w:0.0"));
        assert!(row.contains("| none     | stopped          | finished"));
        assert!(text.contains("⚫ Stopped: 1"));
        assert!(!text.contains("unknown"));
        assert!(!text.contains('❓'));
    }
}
