use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{ExitCode, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod actions;
mod app;

use actions::Action;
use agent_sentinel::config::default_log_path;
use agent_sentinel::tmux::{StatusAggregator, StatusOptions, StatusReport, TmuxClient};
use agent_sentinel::SentinelConfig;
use app::App;

type Aggregator = StatusAggregator<TmuxClient>;

#[derive(Parser)]
#[command(name = "agent-sentinel", version, about = "Classify AI agents running in tmux panes")]
struct Cli {
    /// Config file (default: <config dir>/agent-sentinel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report one pane in detail, or every pane of a session
    Status {
        /// "session:window.pane", or "session:*" for all panes (default: configured session)
        target: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a pane's raw screen buffer
    Capture {
        target: String,
        /// Number of scrollback lines (default: all history)
        #[arg(long)]
        lines: Option<usize>,
    },
    /// Send text or a key name such as C-c to a pane
    Send {
        target: String,
        message: String,
        /// Do not press Enter after the message
        #[arg(long)]
        no_enter: bool,
    },
    /// Live dashboard for every pane of a session
    Watch {
        /// Session to watch (default: configured session)
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (config, config_warnings) = SentinelConfig::load_with_warnings(cli.config.as_deref())?;

    // Reports own stdout and the dashboard owns the whole terminal, so logs
    // go to stderr or, under `watch`, to a file
    let to_terminal = logs_to_terminal(&cli.command);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(log_writer(to_terminal))
        .with_ansi(to_terminal)
        .init();

    for warning in &config_warnings {
        warn!("{}", warning);
    }

    let aggregator = Arc::new(StatusAggregator::new(
        TmuxClient::with_path(config.tmux_path.clone()),
        StatusOptions::from(&config),
    ));

    match cli.command {
        Command::Status { target, json } => {
            let report = aggregator
                .get_status(target.as_deref(), &config.default_session)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            let failed = matches!(&report, StatusReport::Pane(detail) if detail.is_failure());
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Command::Capture { target, lines } => {
            print!("{}", aggregator.capture_screen(&target, lines).await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Send {
            target,
            message,
            no_enter,
        } => {
            aggregator.send_message(&target, &message, !no_enter).await?;
            println!("Sent to {}", target);
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch { session } => {
            let session = session.unwrap_or_else(|| config.default_session.clone());
            if !aggregator.driver().is_server_running().await {
                anyhow::bail!("tmux server is not running");
            }
            watch(
                aggregator,
                session,
                Duration::from_millis(config.refresh_interval_ms),
            )
            .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Every command but `watch` may log to stderr
fn logs_to_terminal(command: &Command) -> bool {
    !matches!(command, Command::Watch { .. })
}

fn log_writer(to_terminal: bool) -> BoxMakeWriter {
    if to_terminal {
        return BoxMakeWriter::new(std::io::stderr);
    }
    match default_log_path().and_then(|path| open_log_file(&path).ok()) {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::sink),
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

async fn watch(aggregator: Arc<Aggregator>, session: String, refresh: Duration) -> Result<()> {
    info!(%session, "starting dashboard");

    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Spawn input handler
    let input_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Press {
                        let _ = input_tx.send(Action::KeyPress(key));
                    }
                }
            }
        }
    });

    // Spawn session poller
    let poll_tx = tx.clone();
    let poll_aggregator = Arc::clone(&aggregator);
    let poll_session = session.clone();
    tokio::spawn(async move {
        loop {
            match poll_aggregator.session_status(&poll_session).await {
                Ok(report) => {
                    let _ = poll_tx.send(Action::ReportUpdated(report));
                }
                Err(e) => {
                    let _ = poll_tx.send(Action::Error(e.to_string()));
                }
            }
            tokio::time::sleep(refresh).await;
        }
    });

    let mut app = App::new(session);

    // Main event loop
    let result = loop {
        // Render
        terminal.draw(|f| app.render(f))?;

        // Process any pending actions from the app
        for pending_action in app.take_pending_actions() {
            match pending_action {
                Action::AttachPane(ref target) => {
                    // Suspend TUI and attach to the pane
                    ratatui::restore();

                    let cmd = aggregator.driver().attach_command(target);
                    let status = std::process::Command::new(&cmd[0])
                        .args(&cmd[1..])
                        .stdin(Stdio::inherit())
                        .stdout(Stdio::inherit())
                        .stderr(Stdio::inherit())
                        .status();

                    // Resume TUI
                    terminal = ratatui::init();

                    if let Err(e) = status {
                        app.message = Some(format!("Failed to attach: {}", e));
                    }
                }
                Action::SendMessage { ref target, ref text } => {
                    app.message = Some(
                        match aggregator.send_message(target.raw(), text, true).await {
                            Ok(()) => format!("Message sent to {}", target),
                            Err(e) => e.to_string(),
                        },
                    );
                }
                Action::InterruptPane(ref target) => {
                    app.message = Some(
                        match aggregator.send_message(target.raw(), "C-c", false).await {
                            Ok(()) => format!("Interrupt sent to {}", target),
                            Err(e) => e.to_string(),
                        },
                    );
                }
                Action::CopyScreen(ref target) => {
                    app.message = Some(match copy_screen(&aggregator, target.raw()).await {
                        Ok(()) => format!("Screen of {} copied to clipboard", target),
                        Err(e) => format!("Copy failed: {:#}", e),
                    });
                }
                _ => {}
            }
        }

        // Handle events from channel
        tokio::select! {
            Some(action) = rx.recv() => {
                match app.handle_action(action) {
                    Ok(should_quit) => {
                        if should_quit {
                            break Ok(());
                        }
                    }
                    Err(e) => {
                        break Err(e);
                    }
                }
            }
        }
    };

    // Restore terminal
    ratatui::restore();
    info!("dashboard closed");
    result
}

async fn copy_screen(aggregator: &Aggregator, target: &str) -> Result<()> {
    let depth = aggregator.options().tail_lines;
    let text = aggregator.capture_screen(target, Some(depth)).await?;
    arboard::Clipboard::new()
        .and_then(|mut clipboard| clipboard.set_text(text))
        .context("Clipboard error")
}
