use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the agent running in a pane
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// No agent running, or the agent exited back to the shell
    Stopped,
    /// Claude is walking through login, OAuth or first-run screens
    #[serde(rename = "auth_claude")]
    AuthenticatingClaude,
    /// Gemini is waiting for authentication
    #[serde(rename = "auth_gemini")]
    AuthenticatingGemini,
    /// Claude is in the middle of a command
    ExecutingClaude,
    /// Claude is started and idle at its prompt
    RunningClaude,
    /// Gemini is started and idle at its prompt
    RunningGemini,
    /// Nothing matched
    #[default]
    Unknown,
}

impl AgentState {
    pub const ALL: [AgentState; 7] = [
        AgentState::RunningClaude,
        AgentState::RunningGemini,
        AgentState::AuthenticatingClaude,
        AgentState::AuthenticatingGemini,
        AgentState::ExecutingClaude,
        AgentState::Stopped,
        AgentState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::AuthenticatingClaude => "auth_claude",
            Self::AuthenticatingGemini => "auth_gemini",
            Self::ExecutingClaude => "executing_claude",
            Self::RunningClaude => "running_claude",
            Self::RunningGemini => "running_gemini",
            Self::Unknown => "unknown",
        }
    }

    /// Agent implied by this state
    pub fn agent(&self) -> AgentKind {
        match self {
            Self::AuthenticatingClaude | Self::ExecutingClaude | Self::RunningClaude => {
                AgentKind::Claude
            }
            Self::AuthenticatingGemini | Self::RunningGemini => AgentKind::Gemini,
            Self::Stopped | Self::Unknown => AgentKind::None,
        }
    }

    /// State as reported operationally: `Unknown` is treated as stopped
    pub fn surfaced(&self) -> AgentState {
        match self {
            Self::Unknown => Self::Stopped,
            other => *other,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which agent program a pane appears to be running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    None,
    Claude,
    Gemini,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one screen buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub state: AgentState,
    pub agent: AgentKind,
    /// Short human-readable explanation
    pub detail: String,
}

impl Classification {
    pub fn new(state: AgentState, detail: impl Into<String>) -> Self {
        Self {
            state,
            agent: state.agent(),
            detail: detail.into(),
        }
    }

    pub fn stopped(detail: impl Into<String>) -> Self {
        Self::new(AgentState::Stopped, detail)
    }
}

/// Identifies the rule that decided a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    EmptyScreen,
    ShellPromptTail,
    ActiveExecution,
    LoggedOut,
    HelperPrompt,
    StartupWithBypass,
    StartupWithSetup,
    StartupGreeting,
    BypassFallback,
    ClaudeAuth,
    GeminiAuth,
    GeminiPrompt,
    GeminiModel,
    GeminiHelp,
    BareShell,
    Unrecognized,
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EmptyScreen => "empty_screen",
            Self::ShellPromptTail => "shell_prompt_tail",
            Self::ActiveExecution => "active_execution",
            Self::LoggedOut => "logged_out",
            Self::HelperPrompt => "helper_prompt",
            Self::StartupWithBypass => "startup_with_bypass",
            Self::StartupWithSetup => "startup_with_setup",
            Self::StartupGreeting => "startup_greeting",
            Self::BypassFallback => "bypass_fallback",
            Self::ClaudeAuth => "claude_auth",
            Self::GeminiAuth => "gemini_auth",
            Self::GeminiPrompt => "gemini_prompt",
            Self::GeminiModel => "gemini_model",
            Self::GeminiHelp => "gemini_help",
            Self::BareShell => "bare_shell",
            Self::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

static RE_ANSI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_PROMPT_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s*$").unwrap());

static RE_SHELL_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$#]\s*$").unwrap());

// The flattened text turns a wrap right after the hyphen into a single space
static RE_GEMINI_MODEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"gemini- ?\d+\.\d|gemini-.*\d\.\d-pro").unwrap());

const CLAUDE_AUTH_PHRASES: &[&str] = &[
    "select login method",
    "claude account with subscription",
    "anthropic console account",
    "paste code here if prompted",
    "browser didn't open",
    "use the url below",
    "claude.ai/oauth/authorize",
    "press enter to continue",
    "press enter to retry",
    "security notes",
    "login successful",
    "logged in as",
    "oauth error",
    "paste code here",
];

const GEMINI_AUTH_PHRASES: &[&str] = &[
    "waiting for auth",
    "login with google",
    "vertex ai",
    "gemini api key",
];

const GREETING_PHRASES: &[&str] = &["how can i help", "try \"edit", "tip:"];

const STARTUP_DENY_PHRASES: &[&str] = &[
    "preview",
    "console.log",
    "press enter to continue",
    "esc to interrupt",
    "escape to interrupt",
    "(auth-helper)",
];

const OAUTH_LINK_PHRASES: &[&str] = &[
    "claude.ai/oauth/authorize",
    "paste code here",
    "oauth error",
    "browser didn't open",
];

/// Marker flags extracted from a screen buffer, computed once per classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Markers {
    pub empty: bool,
    /// Last non-blank line ends with `$`
    pub shell_prompt_tail: bool,
    pub interrupt_hint: bool,
    pub logged_out: bool,
    pub helper_prompt: bool,
    /// `/help for help`
    pub help_hint: bool,
    pub current_setup: bool,
    pub bypass_permissions: bool,
    pub greeting: bool,
    pub startup_deny: bool,
    /// A `>` anywhere in the buffer
    pub input_prompt: bool,
    pub paste_code: bool,
    pub oauth_link: bool,
    pub claude_auth: bool,
    pub gemini_auth: bool,
    pub waiting_for_auth: bool,
    pub gemini_prompt: bool,
    pub gemini_model: bool,
    pub gemini_help: bool,
    /// Buffer ends like a shell prompt or mentions a shell
    pub shell_like: bool,
    /// Either agent is named somewhere in the buffer
    pub agent_named: bool,
}

impl Markers {
    /// Extract every marker flag from raw captured text
    pub fn scan(text: &str) -> Self {
        let cleaned = RE_ANSI.replace_all(text, "");
        if cleaned.trim().is_empty() {
            return Self {
                empty: true,
                ..Self::default()
            };
        }

        let lower = cleaned.to_lowercase();
        let flat = RE_WHITESPACE.replace_all(&lower, " ");
        let has = |phrase: &str| flat.contains(phrase);
        let has_any = |phrases: &[&str]| phrases.iter().any(|p| flat.contains(p));

        let last_line = lower.lines().rev().find(|l| !l.trim().is_empty());
        let shell_prompt_tail = last_line.is_some_and(|l| RE_PROMPT_TAIL.is_match(l));

        let interrupt_hint = has("esc to interrupt") || has("escape to interrupt");
        let help_hint = has("/help for help");
        let preview = has("preview");
        let waiting_for_auth = has("waiting for auth");

        let claude_auth = has_any(CLAUDE_AUTH_PHRASES)
            || (has("dangerous") && has("yes, i accept"))
            || (has("use claude code's terminal setup") && !help_hint)
            || (has("choose the text style") && preview)
            || (preview && (has("dark mode") || has("light mode")));

        Self {
            empty: false,
            shell_prompt_tail,
            interrupt_hint,
            logged_out: has("successfully logged out") || (has("$") && has("logged out")),
            helper_prompt: has("(auth-helper)"),
            help_hint,
            current_setup: has("current setup"),
            bypass_permissions: has("bypassing") && has("permissions"),
            greeting: has_any(GREETING_PHRASES),
            startup_deny: has_any(STARTUP_DENY_PHRASES),
            input_prompt: has(">"),
            paste_code: has("paste code here"),
            oauth_link: has_any(OAUTH_LINK_PHRASES),
            claude_auth,
            gemini_auth: has_any(GEMINI_AUTH_PHRASES),
            waiting_for_auth,
            gemini_prompt: has("type your message"),
            gemini_model: RE_GEMINI_MODEL.is_match(&flat),
            gemini_help: has("/help") && has("information"),
            shell_like: RE_SHELL_TAIL.is_match(&lower) || has("bash") || has("sh-"),
            agent_named: has("claude") || has("gemini"),
        }
    }
}

/// One entry of the ordered rule chain
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: RuleId,
    pub matches: fn(&Markers) -> bool,
    pub state: AgentState,
    pub detail: &'static str,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// The default rule chain. Order is significant: the first matching rule wins.
///
/// A trailing `$` prompt outranks everything, because stale auth or startup
/// banners linger in scrollback after the agent exits. The interrupt hint
/// outranks startup banners that stay visible above a running command.
/// Startup rules are checked before authentication rules.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule {
        id: RuleId::ShellPromptTail,
        matches: |m| m.shell_prompt_tail,
        state: AgentState::Stopped,
        detail: "stopped (shell prompt)",
    },
    Rule {
        id: RuleId::ActiveExecution,
        matches: |m| m.interrupt_hint,
        state: AgentState::ExecutingClaude,
        detail: "Claude executing",
    },
    Rule {
        id: RuleId::LoggedOut,
        matches: |m| m.logged_out,
        state: AgentState::Stopped,
        detail: "stopped (logged out)",
    },
    Rule {
        id: RuleId::HelperPrompt,
        matches: |m| m.helper_prompt,
        state: AgentState::Stopped,
        detail: "stopped (auth helper)",
    },
    Rule {
        id: RuleId::StartupWithBypass,
        matches: |m| m.help_hint && m.bypass_permissions,
        state: AgentState::RunningClaude,
        detail: "Claude started",
    },
    Rule {
        id: RuleId::StartupWithSetup,
        matches: |m| m.help_hint && m.current_setup && !m.oauth_link,
        state: AgentState::RunningClaude,
        detail: "Claude started",
    },
    Rule {
        id: RuleId::StartupGreeting,
        matches: |m| m.greeting && !m.startup_deny,
        state: AgentState::RunningClaude,
        detail: "Claude started",
    },
    Rule {
        id: RuleId::BypassFallback,
        matches: |m| m.bypass_permissions && m.input_prompt && !m.paste_code && !m.interrupt_hint,
        state: AgentState::RunningClaude,
        detail: "Claude started (bypassing permissions)",
    },
    Rule {
        id: RuleId::ClaudeAuth,
        matches: |m| m.claude_auth,
        state: AgentState::AuthenticatingClaude,
        detail: "Claude authenticating",
    },
    Rule {
        id: RuleId::GeminiAuth,
        matches: |m| m.gemini_auth,
        state: AgentState::AuthenticatingGemini,
        detail: "Gemini authenticating",
    },
    Rule {
        id: RuleId::GeminiPrompt,
        matches: |m| m.gemini_prompt && !m.waiting_for_auth,
        state: AgentState::RunningGemini,
        detail: "Gemini started",
    },
    Rule {
        id: RuleId::GeminiModel,
        matches: |m| m.gemini_model,
        state: AgentState::RunningGemini,
        detail: "Gemini started",
    },
    Rule {
        id: RuleId::GeminiHelp,
        matches: |m| m.gemini_help && !m.waiting_for_auth,
        state: AgentState::RunningGemini,
        detail: "Gemini started",
    },
    Rule {
        id: RuleId::BareShell,
        matches: |m| m.shell_like && !m.agent_named,
        state: AgentState::Stopped,
        detail: "stopped (no agent)",
    },
];

/// Passed to a classification observer once the deciding rule is known
#[derive(Debug)]
pub struct Decision<'a> {
    pub rule: RuleId,
    pub markers: &'a Markers,
    pub classification: &'a Classification,
}

/// Infers an agent's lifecycle state from captured pane text
#[derive(Debug, Clone)]
pub struct StateClassifier {
    rules: Vec<Rule>,
}

impl StateClassifier {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    /// Use a custom rule chain, evaluated in the given order
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Classify a screen buffer. Total and side-effect free.
    pub fn classify(&self, text: &str) -> Classification {
        self.classify_observed(text, &mut |_| {})
    }

    /// Classify and report the deciding rule and marker flags to `observer`
    pub fn classify_observed(
        &self,
        text: &str,
        observer: &mut dyn FnMut(&Decision<'_>),
    ) -> Classification {
        let markers = Markers::scan(text);

        let (rule, classification) = if markers.empty {
            (RuleId::EmptyScreen, Classification::stopped("stopped (empty screen)"))
        } else {
            self.rules
                .iter()
                .find(|rule| (rule.matches)(&markers))
                .map(|rule| (rule.id, Classification::new(rule.state, rule.detail)))
                .unwrap_or_else(|| {
                    (
                        RuleId::Unrecognized,
                        Classification::new(AgentState::Unknown, "unrecognized screen content"),
                    )
                })
        };

        observer(&Decision {
            rule,
            markers: &markers,
            classification: &classification,
        });
        classification
    }
}

impl Default for StateClassifier {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_CLASSIFIER: Lazy<StateClassifier> = Lazy::new(StateClassifier::new);

/// Classify with the default rule chain
pub fn classify(text: &str) -> Classification {
    DEFAULT_CLASSIFIER.classify(text)
}

/// Last `n` lines of `text`, oldest first
pub fn tail_lines(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].to_vec()
}

/// Last line containing anything besides whitespace
pub fn last_non_blank_line(text: &str) -> Option<&str> {
    text.lines().rev().find(|l| !l.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_of(text: &str) -> AgentState {
        classify(text).state
    }

    #[test]
    fn test_empty_is_stopped() {
        let result = classify("");
        assert_eq!(result.state, AgentState::Stopped);
        assert_eq!(result.agent, AgentKind::None);
        assert_eq!(state_of("   \n\t\n  "), AgentState::Stopped);
    }

    #[test]
    fn test_trailing_shell_prompt() {
        let result = classify("some output\nuser@host:~/project$ ");
        assert_eq!(result.state, AgentState::Stopped);
        assert_eq!(result.agent, AgentKind::None);
    }

    #[test]
    fn test_shell_prompt_overrides_stale_auth_banner() {
        let content = "Select login method:\n1. Claude account with subscription\n\
                       Paste code here if prompted >\n\nuser@host:~$   \n\n";
        assert_eq!(state_of(content), AgentState::Stopped);
    }

    #[test]
    fn test_shell_prompt_overrides_interrupt_hint() {
        let content = "✻ Thinking… (esc to interrupt)\n^C\nuser@host:~/repo$";
        assert_eq!(state_of(content), AgentState::Stopped);
    }

    #[test]
    fn test_colored_prompt_is_stopped() {
        let content = "Login successful\n\x1b[32muser@host\x1b[0m:~$ \x1b[0m";
        assert_eq!(state_of(content), AgentState::Stopped);
    }

    #[test]
    fn test_dollar_mid_line_is_not_a_prompt() {
        let content = "costs $5 per month\n> ";
        assert_ne!(classify(content).detail, "stopped (shell prompt)");
    }

    #[test]
    fn test_interrupt_hint_is_executing() {
        let content = "✻ Welcome to Claude Code!\n/help for help, /status for your current setup\n\
                       ✶ Reading files… (12s · esc to interrupt)";
        let result = classify(content);
        assert_eq!(result.state, AgentState::ExecutingClaude);
        assert_eq!(result.agent, AgentKind::Claude);

        assert_eq!(
            state_of("Working (press escape to interrupt)"),
            AgentState::ExecutingClaude
        );
    }

    #[test]
    fn test_interrupt_hint_wrapped_across_lines() {
        assert_eq!(
            state_of("Compiling… (esc to\ninterrupt)"),
            AgentState::ExecutingClaude
        );
    }

    #[test]
    fn test_logged_out_residue() {
        assert_eq!(
            state_of("✻ Welcome to Claude Code\nSuccessfully logged out from your account."),
            AgentState::Stopped
        );
        assert_eq!(
            classify("You have been logged out\n$ exit").detail,
            "stopped (logged out)"
        );
    }

    #[test]
    fn test_helper_prompt_is_stopped() {
        let content = "Tip: run /login\n(auth-helper) choose an option";
        assert_eq!(classify(content).detail, "stopped (auth helper)");
    }

    #[test]
    fn test_help_hint_with_bypass_is_running() {
        let content = "Bypassing Permissions\n\n✻ Welcome to Claude Code!\n/help for help\n\n\
                       Use Claude Code's terminal setup? Preview";
        assert_eq!(state_of(content), AgentState::RunningClaude);
    }

    #[test]
    fn test_help_hint_with_setup_is_running() {
        let content = "✻ Welcome to Claude Code!\n\n  /help for help, /status for your current\n  setup\n\n> ";
        let result = classify(content);
        assert_eq!(result.state, AgentState::RunningClaude);
        assert_eq!(result.agent, AgentKind::Claude);
    }

    #[test]
    fn test_help_hint_with_setup_and_oauth_link_is_auth() {
        let content = "/help for help, /status for your current setup\n\
                       Browser didn't open? Use the url below to sign in:\n\
                       https://claude.ai/oauth/authorize?code=true";
        assert_eq!(state_of(content), AgentState::AuthenticatingClaude);
    }

    #[test]
    fn test_greeting_is_running() {
        assert_eq!(
            state_of("╭──────╮\n│ Tip: use /clear to start fresh │\n╰──────╯\n> "),
            AgentState::RunningClaude
        );
        assert_eq!(state_of("Try \"edit <filepath> to...\""), AgentState::RunningClaude);
    }

    #[test]
    fn test_greeting_suppressed_by_deny_list() {
        // A theme preview with a tip is a first-run screen, not a started agent
        let content = "Choose the text style that looks best\nPreview\nTip: dark mode";
        assert_eq!(state_of(content), AgentState::AuthenticatingClaude);

        let content = "tip: console.log debugging\nnode script.js";
        assert_ne!(state_of(content), AgentState::RunningClaude);
    }

    #[test]
    fn test_scenario_bypass_with_prompt() {
        let content = "⏵⏵ Bypassing Permissions\n\n╭────────────╮\n│ >          │\n╰────────────╯";
        let result = classify(content);
        assert_eq!(result.state, AgentState::RunningClaude);
        assert_eq!(result.agent, AgentKind::Claude);
    }

    #[test]
    fn test_bypass_with_paste_code_is_not_running() {
        let content = "Bypassing Permissions\nPaste code here if prompted >";
        assert_eq!(state_of(content), AgentState::AuthenticatingClaude);
    }

    #[test]
    fn test_claude_auth_markers() {
        let screens = [
            "Select login method:\n❯ 1. Claude account with subscription",
            "2. Anthropic Console account",
            "Browser didn't open? Use the url below to sign in",
            "https://claude.ai/oauth/authorize?client_id=abc",
            "Paste code here if prompted",
            "Security notes:\n1. Claude can make mistakes",
            "Login successful. Press Enter to continue",
            "OAuth error: invalid code. Press Enter to retry.",
            "WARNING: dangerous mode\nYes, I accept",
            "Use Claude Code's terminal setup?",
            "Preview\n  dark mode (colorblind-friendly)",
        ];
        for screen in screens {
            assert_eq!(state_of(screen), AgentState::AuthenticatingClaude, "{screen}");
        }
    }

    #[test]
    fn test_gemini_auth_markers() {
        let result = classify("⠏ Waiting for auth... (Press ESC to cancel)");
        assert_eq!(result.state, AgentState::AuthenticatingGemini);
        assert_eq!(result.agent, AgentKind::Gemini);

        for screen in ["1. Login with Google", "3. Vertex AI", "Enter Gemini API Key"] {
            assert_eq!(state_of(screen), AgentState::AuthenticatingGemini, "{screen}");
        }
    }

    #[test]
    fn test_startup_outranks_auth() {
        // Stale login success banner above a ready prompt
        let content = "Login successful.\n✻ Welcome to Claude Code!\n\
                       /help for help, /status for your current setup\n> ";
        assert_eq!(state_of(content), AgentState::RunningClaude);
    }

    #[test]
    fn test_gemini_running_markers() {
        let result = classify(">   Type your message or @path/to/file");
        assert_eq!(result.state, AgentState::RunningGemini);
        assert_eq!(result.agent, AgentKind::Gemini);

        assert_eq!(
            state_of("~/project   no sandbox   gemini-2.5-pro (100% context left)"),
            AgentState::RunningGemini
        );
        assert_eq!(
            state_of("~/project   no sandbox   gemini-\n2.5-pro"),
            AgentState::RunningGemini
        );
        assert_eq!(
            state_of("Tips for getting started:\n4. /help for more information."),
            AgentState::RunningGemini
        );
    }

    #[test]
    fn test_waiting_for_auth_blocks_gemini_prompt() {
        let content = "Type your message\nWaiting for auth...";
        assert_eq!(state_of(content), AgentState::AuthenticatingGemini);
    }

    #[test]
    fn test_bare_shell_fallback() {
        let result = classify("bash-5.2# ");
        assert_eq!(result.state, AgentState::Stopped);
        assert_eq!(result.detail, "stopped (no agent)");

        assert_eq!(classify("sh-3.2 make build\nok").state, AgentState::Stopped);
    }

    #[test]
    fn test_agent_name_prevents_bare_shell() {
        let result = classify("claude --resume\nloading #");
        assert_eq!(result.state, AgentState::Unknown);
        assert_eq!(result.agent, AgentKind::None);
        assert_eq!(result.state.surfaced(), AgentState::Stopped);
    }

    #[test]
    fn test_unrecognized_content_is_unknown() {
        let result = classify("compiling 42 crates\nfinished");
        assert_eq!(result.state, AgentState::Unknown);
        assert_eq!(result.detail, "unrecognized screen content");
    }

    #[test]
    fn test_classify_is_deterministic() {
        let content = "Bypassing Permissions\nWaiting for auth\nTip: x\n> ";
        let first = classify(content);
        for _ in 0..5 {
            assert_eq!(classify(content), first);
        }
    }

    #[test]
    fn test_default_rule_order() {
        let ids: Vec<RuleId> = StateClassifier::new().rules().iter().map(|r| r.id).collect();
        let position = |id| ids.iter().position(|r| *r == id).unwrap();
        assert_eq!(ids[0], RuleId::ShellPromptTail);
        assert_eq!(ids[1], RuleId::ActiveExecution);
        assert!(position(RuleId::StartupGreeting) < position(RuleId::ClaudeAuth));
        assert!(position(RuleId::ClaudeAuth) < position(RuleId::GeminiPrompt));
        assert_eq!(*ids.last().unwrap(), RuleId::BareShell);
    }

    #[test]
    fn test_custom_rule_order() {
        // Authentication first reverses the startup-vs-auth tie-break
        let mut rules = DEFAULT_RULES.to_vec();
        let auth = rules.iter().position(|r| r.id == RuleId::ClaudeAuth).unwrap();
        let rule = rules.remove(auth);
        rules.insert(2, rule);
        let classifier = StateClassifier::with_rules(rules);

        let content = "Login successful.\n/help for help, /status for your current setup\n> ";
        assert_eq!(classifier.classify(content).state, AgentState::AuthenticatingClaude);
    }

    #[test]
    fn test_observer_sees_deciding_rule() {
        let classifier = StateClassifier::new();
        let mut seen = Vec::new();
        classifier.classify_observed("Waiting for auth...", &mut |d| {
            seen.push((d.rule, d.markers.waiting_for_auth))
        });
        classifier.classify_observed("", &mut |d| seen.push((d.rule, d.markers.empty)));
        classifier.classify_observed("nothing here", &mut |d| seen.push((d.rule, false)));

        assert_eq!(
            seen,
            vec![
                (RuleId::GeminiAuth, true),
                (RuleId::EmptyScreen, true),
                (RuleId::Unrecognized, false)
            ]
        );
    }

    #[test]
    fn test_serialized_names_match_text_names() {
        for state in AgentState::ALL {
            assert_eq!(
                serde_json::to_string(&state).unwrap(),
                format!("\"{}\"", state.as_str())
            );
        }
        let parsed: AgentState = serde_json::from_str("\"auth_gemini\"").unwrap();
        assert_eq!(parsed, AgentState::AuthenticatingGemini);
    }

    #[test]
    fn test_tail_and_last_line() {
        let text = "a\nb\nc\n\n  \n";
        assert_eq!(tail_lines(text, 2), vec!["", "  "]);
        assert_eq!(tail_lines("a\nb", 20), vec!["a", "b"]);
        assert_eq!(last_non_blank_line(text), Some("c"));
        assert_eq!(last_non_blank_line("  \n"), None);
    }
}
