mod aggregate;
mod app;
mod cli;
mod config;
mod error;
mod event;
mod model;
mod normalize;
mod providers;
mod rank;
mod service;
mod store;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::panic;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{Action, App};
use cli::Cli;
use service::TodoService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = cli.command.is_none();
    init_tracing(cli.verbose, interactive, cli.logfile.as_deref())?;

    let config = config::load_config(cli.config.as_deref())?;
    let service = TodoService::from_config(&config, &config::data_dir())?;

    match cli.command {
        Some(command) => cli::run(command, &service).await,
        None => run_dashboard(service).await,
    }
}

/// RUST_LOG wins over `-v`. The dashboard owns the terminal, so it logs to a
/// file; every other command logs to stderr.
fn init_tracing(verbose: u8, interactive: bool, logfile: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, stderr_layer) = if interactive {
        let path = logfile
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config::data_dir().join("todo-merger.log"));
        let file = open_logfile(&path)?;
        let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        (Some(layer), None)
    } else {
        (None, Some(fmt::layer().with_writer(io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

fn open_logfile(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

async fn run_dashboard(service: TodoService) -> Result<()> {
    // Set up action channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(service);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Spawn event reader
    let event_tx = action_tx.clone();
    tokio::spawn(async move {
        event::run_event_loop(event_tx).await;
    });

    // Initial fetch; draw the loading state first
    terminal.draw(|f| ui::render(f, &app))?;
    if app.has_sources() {
        app.refresh_items(true).await;
    } else {
        app.loading = false;
        tracing::warn!("no services configured");
    }

    // Main loop
    loop {
        terminal.draw(|f| ui::render(f, &app))?;

        if let Some(action) = action_rx.recv().await {
            app.update(action).await;
            if app.should_quit {
                break;
            }
        } else {
            break;
        }
    }

    // Restore terminal
    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}
