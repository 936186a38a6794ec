use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use agent_sentinel::report::{state_icon, state_label};
use agent_sentinel::tmux::{AgentState, PaneSummary, SessionReport};

use crate::actions::Action;

/// Dashboard colors, one per agent state family
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87), // Claude orange
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

impl Theme {
    fn state_color(&self, state: AgentState) -> Color {
        match state {
            AgentState::RunningClaude | AgentState::RunningGemini => self.success,
            AgentState::ExecutingClaude => self.warning,
            AgentState::AuthenticatingClaude | AgentState::AuthenticatingGemini => self.accent,
            AgentState::Stopped | AgentState::Unknown => self.dim,
        }
    }
}

/// Input mode for the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Composing,
    ConfirmingInterrupt,
}

/// Dashboard state for one watched session
pub struct App {
    /// Session being watched
    pub session: String,
    /// Latest report from the poller
    pub report: Option<SessionReport>,
    /// Currently selected pane index
    pub list_state: ListState,
    /// Current message to display (info or error)
    pub message: Option<String>,
    pub theme: Theme,
    pub input_mode: InputMode,
    /// Text input buffer
    pub input_buffer: String,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl App {
    pub fn new(session: impl Into<String>) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            session: session.into(),
            report: None,
            list_state,
            message: None,
            theme: Theme::default(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            pending_actions: Vec::new(),
        }
    }

    fn panes(&self) -> &[PaneSummary] {
        self.report.as_ref().map(|r| r.panes.as_slice()).unwrap_or(&[])
    }

    /// Get the currently selected pane
    pub fn selected_pane(&self) -> Option<&PaneSummary> {
        self.list_state.selected().and_then(|i| self.panes().get(i))
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            Action::ReportUpdated(report) => {
                let len = report.panes.len();
                self.report = Some(report);
                // Ensure selection is valid
                if let Some(selected) = self.list_state.selected() {
                    if selected >= len && len > 0 {
                        self.list_state.select(Some(len - 1));
                    }
                }
                Ok(false)
            }
            Action::Error(msg) => {
                self.message = Some(msg);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Clear message on any key press
        if self.message.is_some() && self.input_mode == InputMode::Normal {
            self.message = None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Composing => self.handle_composing_key(key),
            InputMode::ConfirmingInterrupt => self.handle_confirming_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.next_pane(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_pane(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Enter => {
                if let Some(pane) = self.selected_pane() {
                    self.pending_actions
                        .push(Action::AttachPane(pane.target.clone()));
                }
            }
            KeyCode::Char('m') => {
                if self.selected_pane().is_some() {
                    self.input_mode = InputMode::Composing;
                    self.input_buffer.clear();
                }
            }
            KeyCode::Char('i') => {
                if self.selected_pane().is_some() {
                    self.input_mode = InputMode::ConfirmingInterrupt;
                }
            }
            KeyCode::Char('y') => {
                if let Some(pane) = self.selected_pane() {
                    self.pending_actions
                        .push(Action::CopyScreen(pane.target.clone()));
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_composing_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Enter => {
                if !self.input_buffer.is_empty() {
                    if let Some(target) = self.selected_pane().map(|p| p.target.clone()) {
                        let text = std::mem::take(&mut self.input_buffer);
                        self.pending_actions
                            .push(Action::SendMessage { target, text });
                    }
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                self.input_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_confirming_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(pane) = self.selected_pane() {
                    self.pending_actions
                        .push(Action::InterruptPane(pane.target.clone()));
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn next_pane(&mut self) {
        let len = self.panes().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous_pane(&mut self) {
        let len = self.panes().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_main(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);

        // Render modal dialogs on top
        match self.input_mode {
            InputMode::Composing => self.render_compose_dialog(frame),
            InputMode::ConfirmingInterrupt => self.render_confirm_dialog(frame),
            InputMode::Normal => {}
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(
                " AgentSentinel ",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("│ session {} ", self.session),
                Style::default().fg(self.theme.dim),
            ),
        ];

        if let Some(report) = &self.report {
            for (state, count) in report.counts.iter().filter(|(_, n)| *n > 0) {
                spans.push(Span::styled(
                    format!("│ {} {} ", state_icon(state), count),
                    Style::default().fg(self.theme.state_color(state)),
                ));
            }
        }

        let title = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(title, area);
    }

    fn render_main(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40), // Pane list
                Constraint::Percentage(60), // Detail pane
            ])
            .split(area);

        self.render_pane_list(frame, chunks[0]);
        self.render_detail(frame, chunks[1]);
    }

    fn render_pane_list(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = if self.panes().is_empty() {
            let hint = if self.report.is_none() {
                "  Waiting for first capture..."
            } else {
                "  No panes found in this session."
            };
            vec![ListItem::new(Line::from(Span::styled(
                hint,
                Style::default().fg(self.theme.dim),
            )))]
        } else {
            self.panes()
                .iter()
                .map(|pane| {
                    let state = pane.classification.state.surfaced();
                    let icon = if pane.capture_error.is_some() {
                        Span::styled("✗ ", Style::default().fg(self.theme.error))
                    } else {
                        Span::styled(
                            format!("{} ", state_icon(state)),
                            Style::default().fg(self.theme.state_color(state)),
                        )
                    };
                    let name = Span::styled(pane.display_target(), Style::default().fg(self.theme.fg));
                    ListItem::new(Line::from(vec![icon, name]))
                })
                .collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Panes ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.theme.dim)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Rgb(50, 50, 50))
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect) {
        let label = |text: &'static str| Span::styled(text, Style::default().fg(self.theme.dim));

        let content = if let Some(pane) = self.selected_pane() {
            let state = pane.classification.state.surfaced();
            let mut lines = vec![
                Line::from(vec![
                    label("Target: "),
                    Span::styled(pane.target.to_string(), Style::default().fg(self.theme.fg)),
                ]),
                Line::from(vec![
                    label("Name: "),
                    Span::styled(
                        pane.display_name.clone().unwrap_or_else(|| "-".to_string()),
                        Style::default().fg(self.theme.fg),
                    ),
                ]),
                Line::from(vec![
                    label("State: "),
                    Span::styled(
                        format!("{} ({})", state_label(state), state),
                        Style::default().fg(self.theme.state_color(state)),
                    ),
                ]),
                Line::from(vec![
                    label("Agent: "),
                    Span::styled(
                        pane.classification.agent.to_string(),
                        Style::default().fg(self.theme.fg),
                    ),
                ]),
                Line::from(vec![
                    label("Detail: "),
                    Span::styled(
                        pane.classification.detail.clone(),
                        Style::default().fg(self.theme.fg),
                    ),
                ]),
            ];
            if let Some(error) = &pane.capture_error {
                lines.push(Line::from(vec![
                    label("Error: "),
                    Span::styled(error.clone(), Style::default().fg(self.theme.error)),
                ]));
            }
            if let Some(last) = &pane.last_line {
                lines.push(Line::from(""));
                lines.push(Line::from(label("Last line:")));
                lines.push(Line::from(Span::styled(
                    last.clone(),
                    Style::default().fg(self.theme.fg),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(label(
                "Enter: attach │ m: message │ i: interrupt │ y: copy screen",
            )));
            lines
        } else {
            vec![Line::from(label("No pane selected"))]
        };

        let detail = Paragraph::new(content).block(
            Block::default()
                .title(" Details ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(detail, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = " q: Quit │ j/k: Navigate │ Enter: Attach │ m: Message │ i: Interrupt │ y: Copy screen ";

        let content = if let Some(ref msg) = self.message {
            let style = if msg.contains("copied") || msg.contains("sent") {
                Style::default().fg(self.theme.success)
            } else {
                Style::default().fg(self.theme.error)
            };
            Line::from(Span::styled(format!(" {} ", msg), style))
        } else {
            Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim)))
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }

    fn render_compose_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(60, 20, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" Send Message ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let target = self
            .selected_pane()
            .map(|p| p.display_target())
            .unwrap_or_default();

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("Message for {}:", target),
                Style::default().fg(self.theme.fg),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!("▶ {}_", self.input_buffer),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to send, Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }

    fn render_confirm_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(50, 20, frame.area());

        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(" Confirm Interrupt ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.error));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let target = self
            .selected_pane()
            .map(|p| p.display_target())
            .unwrap_or_else(|| "unknown".to_string());

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("Send Ctrl+C to {}?", target),
                Style::default().fg(self.theme.fg),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "The running command will be interrupted.",
                Style::default().fg(self.theme.warning),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press 'y' to confirm, 'n' or Esc to cancel",
                Style::default().fg(self.theme.dim),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_sentinel::tmux::{Classification, TargetAddress};

    fn key(code: KeyCode) -> Action {
        Action::KeyPress(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn report() -> SessionReport {
        let pane = |target: &str, state| PaneSummary {
            target: TargetAddress::parse(target).unwrap(),
            display_name: None,
            classification: Classification::new(state, "test"),
            last_line: None,
            capture_error: None,
        };
        SessionReport::new(
            "multiagent",
            vec![
                pane("multiagent:0.0", AgentState::RunningClaude),
                pane("multiagent:0.1", AgentState::ExecutingClaude),
            ],
        )
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = App::new("multiagent");
        app.handle_action(Action::ReportUpdated(report())).unwrap();

        app.handle_action(key(KeyCode::Char('k'))).unwrap();
        assert_eq!(app.list_state.selected(), Some(1));
        app.handle_action(key(KeyCode::Char('j'))).unwrap();
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn test_selection_clamped_on_smaller_report() {
        let mut app = App::new("multiagent");
        app.handle_action(Action::ReportUpdated(report())).unwrap();
        app.list_state.select(Some(1));

        let mut smaller = report();
        smaller.panes.truncate(1);
        app.handle_action(Action::ReportUpdated(smaller)).unwrap();
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn test_compose_and_send() {
        let mut app = App::new("multiagent");
        app.handle_action(Action::ReportUpdated(report())).unwrap();

        app.handle_action(key(KeyCode::Char('m'))).unwrap();
        assert_eq!(app.input_mode, InputMode::Composing);
        for c in "hi q".chars() {
            app.handle_action(key(KeyCode::Char(c))).unwrap();
        }
        app.handle_action(key(KeyCode::Enter)).unwrap();

        let actions = app.take_pending_actions();
        match actions.as_slice() {
            [Action::SendMessage { target, text }] => {
                assert_eq!(target.raw(), "multiagent:0.0");
                assert_eq!(text, "hi q");
            }
            other => panic!("expected one SendMessage, got {:?}", other),
        }
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_interrupt_requires_confirmation() {
        let mut app = App::new("multiagent");
        app.handle_action(Action::ReportUpdated(report())).unwrap();

        app.handle_action(key(KeyCode::Char('i'))).unwrap();
        app.handle_action(key(KeyCode::Esc)).unwrap();
        assert!(app.take_pending_actions().is_empty());

        app.handle_action(key(KeyCode::Char('i'))).unwrap();
        app.handle_action(key(KeyCode::Char('y'))).unwrap();
        assert!(matches!(
            app.take_pending_actions().as_slice(),
            [Action::InterruptPane(t)] if t.raw() == "multiagent:0.0"
        ));
    }

    #[test]
    fn test_quit() {
        let mut app = App::new("multiagent");
        assert!(app.handle_action(key(KeyCode::Char('q'))).unwrap());
    }
}
