use crossterm::event::KeyEvent;

use agent_sentinel::tmux::{SessionReport, TargetAddress};

/// Actions that can be dispatched through the dashboard
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// A fresh session report arrived from the poller
    ReportUpdated(SessionReport),
    /// An error occurred
    Error(String),
    /// Attach to a pane
    AttachPane(TargetAddress),
    /// Type a message into a pane and press Enter
    SendMessage { target: TargetAddress, text: String },
    /// Send Ctrl+C to a pane
    InterruptPane(TargetAddress),
    /// Copy a pane's screen to the clipboard
    CopyScreen(TargetAddress),
}
