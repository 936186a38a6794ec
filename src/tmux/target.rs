use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::SentinelError;

static RE_PANE_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+):([^.]+)\.(.+)$").unwrap());

/// Which panes of a session a target refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Scope {
    /// One pane, addressed by opaque window and pane tokens
    Pane { window: String, pane: String },
    /// Every pane of the session (`session:*`)
    AllPanes,
}

/// A parsed tmux target such as `multiagent:0.5` or `multiagent:*`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress {
    session: String,
    scope: Scope,
    raw: String,
}

impl TargetAddress {
    /// Parse a target string. Any `*` selects the wildcard form, whose
    /// session is the text before the first `:` minus trailing `*`s.
    pub fn parse(raw: &str) -> Result<Self, SentinelError> {
        if raw.contains('*') {
            let segment = raw.split(':').next().unwrap_or_default();
            let trimmed = segment.trim_end_matches('*');
            // `**:0.1` still names a session, just one made only of stars
            let session = if trimmed.is_empty() && raw.contains(':') {
                segment
            } else {
                trimmed
            };
            if session.is_empty() {
                return Err(SentinelError::invalid_target(raw));
            }
            return Ok(Self {
                session: session.to_string(),
                scope: Scope::AllPanes,
                raw: raw.to_string(),
            });
        }

        let caps = RE_PANE_TARGET
            .captures(raw)
            .ok_or_else(|| SentinelError::invalid_target(raw))?;

        Ok(Self {
            session: caps[1].to_string(),
            scope: Scope::Pane {
                window: caps[2].to_string(),
                pane: caps[3].to_string(),
            },
            raw: raw.to_string(),
        })
    }

    /// Build a pane address from its parts
    pub fn pane(session: &str, window: &str, pane: &str) -> Self {
        Self {
            session: session.to_string(),
            scope: Scope::Pane {
                window: window.to_string(),
                pane: pane.to_string(),
            },
            raw: format!("{}:{}.{}", session, window, pane),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn window(&self) -> Option<&str> {
        match &self.scope {
            Scope::Pane { window, .. } => Some(window),
            Scope::AllPanes => None,
        }
    }

    /// Pane token within its window, `None` for wildcard targets
    pub fn pane_token(&self) -> Option<&str> {
        match &self.scope {
            Scope::Pane { pane, .. } => Some(pane),
            Scope::AllPanes => None,
        }
    }

    /// Target string exactly as given (or as built by [`TargetAddress::pane`])
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.scope, Scope::AllPanes)
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TargetAddress {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TargetAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
