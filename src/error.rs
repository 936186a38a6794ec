use std::path::PathBuf;

/// Grammar accepted for pane targets, shown back to the user on parse errors
pub const TARGET_GRAMMAR: &str =
    "\"session:window.pane\" (e.g. \"multiagent:0.5\") or \"session:*\" for all panes";

/// Errors surfaced by target parsing, pane capture and session aggregation
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("Invalid tmux target format: \"{target}\". Expected format: {expected}")]
    InvalidTargetFormat {
        target: String,
        expected: &'static str,
    },

    #[error("Failed to capture pane {target}: {reason}")]
    CaptureFailure { target: String, reason: String },

    #[error("Session \"{session}\" not found: {reason}")]
    SessionNotFound { session: String, reason: String },

    #[error("Failed to send to {target}: {reason}")]
    SendFailure { target: String, reason: String },

    #[error("Configuration file malformed: {path}: {details}")]
    Config { path: PathBuf, details: String },
}

impl SentinelError {
    pub fn invalid_target(target: impl Into<String>) -> Self {
        Self::InvalidTargetFormat {
            target: target.into(),
            expected: TARGET_GRAMMAR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_names_input_and_grammar() {
        let msg = SentinelError::invalid_target("badtarget").to_string();
        assert!(msg.contains("\"badtarget\""));
        assert!(msg.contains("session:window.pane"));
    }

    #[test]
    fn test_session_not_found_names_session() {
        let err = SentinelError::SessionNotFound {
            session: "ghost".to_string(),
            reason: "can't find session: ghost".to_string(),
        };
        assert!(err.to_string().starts_with("Session \"ghost\" not found"));
    }
}
