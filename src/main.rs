mod api;
mod app;
mod compose;
mod config;
mod debug;
mod demo;
mod email;
mod error;
mod input;
mod mailbox;
mod session;
mod ui;
mod worker;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{error, info};

use api::{HttpMailApi, MailApi};
use app::App;
use config::ServerConfig;
use demo::DemoMailApi;
use ui::render::render;
use ui::widgets::UiState;
use worker::Dispatcher;

/// Simulated round-trip for the in-memory backend
const DEMO_LATENCY: Duration = Duration::from_millis(300);

/// Terminal client for a web mail service
#[derive(Debug, Parser)]
#[command(name = "mailterm", version, about)]
struct Cli {
    /// Path to the config file (defaults to ~/.config/mailterm/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write debug logs to ~/.config/mailterm/debug.log
    #[arg(long)]
    debug: bool,

    /// Run against an in-memory server (login: demo / demo)
    #[arg(long)]
    demo: bool,

    /// Override the auth endpoint URL
    #[arg(long)]
    auth_url: Option<String>,

    /// Override the mailbox endpoint URL
    #[arg(long)]
    emails_url: Option<String>,
}

/// Resolves endpoints from the command line, falling back to the config file
fn resolve_config(cli: &Cli) -> Result<ServerConfig> {
    if let (Some(auth_url), Some(emails_url)) = (&cli.auth_url, &cli.emails_url) {
        return ServerConfig::from_urls(auth_url.as_str(), emails_url.as_str());
    }

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(auth_url) = &cli.auth_url {
        config.auth_url = auth_url.clone();
    }
    if let Some(emails_url) = &cli.emails_url {
        config.emails_url = emails_url.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = debug::init(cli.debug)? {
        eprintln!("Debug logging to {:?}", path);
    }

    let config = if cli.demo {
        None
    } else {
        match resolve_config(&cli) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    };

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = match config {
        Some(config) => {
            info!(auth_url = %config.auth_url, emails_url = %config.emails_url, "starting");
            match HttpMailApi::new(&config) {
                Ok(api) => run_app(&mut terminal, api).await,
                Err(e) => Err(e),
            }
        }
        None => {
            info!("starting in demo mode");
            run_app(&mut terminal, DemoMailApi::new(DEMO_LATENCY)).await
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!("fatal: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_app<A: MailApi + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    api: A,
) -> Result<()> {
    let mut app = App::new();
    let mut ui_state = UiState::new();
    let (dispatcher, mut responses) = Dispatcher::new(api);

    // Main event loop
    loop {
        terminal.draw(|f| render(f, &app, &ui_state))?;

        // Check for API responses (non-blocking)
        loop {
            match responses.try_recv() {
                Ok(response) => dispatcher.dispatch_all(app.apply(response)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    anyhow::bail!("Response channel closed unexpectedly");
                }
            }
        }

        // Poll for keyboard events with timeout. Polling blocks, so it runs
        // off the runtime threads to keep request tasks moving.
        let ready = tokio::task::block_in_place(|| event::poll(Duration::from_millis(50)))?;
        if ready
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(action) = input::action_for(&app, key)
        {
            dispatcher.dispatch_all(app.handle(action));
        }

        if app.should_quit() {
            return Ok(());
        }

        app.expire_notice(Instant::now());
        if app.busy_status().is_some() {
            ui_state.tick_spinner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["mailterm", "--demo", "--debug"]);
        assert!(cli.demo);
        assert!(cli.debug);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_resolve_config_from_url_overrides() {
        let cli = Cli::parse_from([
            "mailterm",
            "--auth-url",
            "http://localhost:8000/api/auth",
            "--emails-url",
            "http://localhost:8000/api/emails",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.auth_url, "http://localhost:8000/api/auth");
        assert_eq!(config.emails_url, "http://localhost:8000/api/emails");
    }

    #[test]
    fn test_resolve_config_rejects_bad_override() {
        let cli = Cli::parse_from([
            "mailterm",
            "--auth-url",
            "not a url",
            "--emails-url",
            "http://localhost:8000/api/emails",
        ]);
        assert!(resolve_config(&cli).is_err());
    }
}
