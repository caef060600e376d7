//! jurisia: a legal document editor with an editing assistant.
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::Parser;
use edtui::EditorEventHandler;
use jurisia::app_state::{AppState, CommandResult, SharedClient, View};
use jurisia::llm::{HttpCompletionClient, OfflineClient};
use jurisia::store::{with_retry, JsonStore};
use jurisia::{config, edit_plan, ui};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "JURISIA_LOG";
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "jurisia")]
#[command(about = "Legal document editor with an editing assistant", long_about = None)]
struct Args {
    /// Document to edit (.md or .txt)
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Config file to read instead of ./jurisia.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Completion endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Apply a JSON edit plan before opening the editor
    #[arg(long, value_name = "FILE")]
    load_edits: Option<PathBuf>,

    /// Directory for saved documents and interactions
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long, value_name = "FILE", default_value = "jurisia.log")]
    log_file: PathBuf,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let mut cfg = match &args.config {
        Some(path) => config::Config::load_from(path),
        None => config::Config::load(),
    };

    // Override config with command line args
    if let Some(endpoint) = args.endpoint {
        cfg.endpoint = endpoint;
    }
    if let Some(dir) = &args.store_dir {
        cfg.store_dir = dir.to_string_lossy().to_string();
    }

    let client: SharedClient = match HttpCompletionClient::from_config(&cfg) {
        Some(client) => Arc::new(client),
        None => {
            tracing::warn!("no completion endpoint configured; chat replies are unavailable");
            Arc::new(OfflineClient)
        }
    };

    let store = if cfg.store_dir.is_empty() {
        None
    } else {
        let dir = cfg.store_dir.clone();
        Some(
            with_retry(3, Duration::from_secs(1), || JsonStore::open(&dir))
                .with_context(|| format!("opening store at {}", cfg.store_dir))?,
        )
    };

    let mut state = AppState::open(&args.path, &cfg, client, store)
        .with_context(|| format!("opening {}", args.path.display()))?;

    if let Some(load_path) = args.load_edits {
        let file_content = std::fs::read_to_string(&load_path)
            .with_context(|| format!("reading {}", load_path.display()))?;
        let plan: edit_plan::EditPlan = serde_json::from_str(&file_content)
            .with_context(|| format!("parsing {}", load_path.display()))?;
        state.load_edits(&plan);
    }

    run_tui(state)
}

fn run_tui(mut app: AppState) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut editor_handler = EditorEventHandler::default();

    let result = run_app(&mut terminal, &mut app, &mut editor_handler);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!(error = %e, "terminal loop failed");
        eprintln!("Error: {e}");
    } else {
        println!("{}", app.transcript_json()?);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut AppState,
    editor_handler: &mut EditorEventHandler,
) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.current_view {
            View::Document => {
                let normal = app.editor_state_mut().mode == edtui::EditorMode::Normal;
                match key.code {
                    KeyCode::Char(':') if normal => app.enter_command(),
                    KeyCode::Tab if normal => {
                        app.current_view = View::Chat;
                        app.message = None;
                    }
                    _ => {
                        editor_handler.on_key_event(key, app.editor_state_mut());
                        app.editor_input_done();
                    }
                }
            }
            View::Chat => match key.code {
                KeyCode::Char(c) => app.chat_input.push(c),
                KeyCode::Backspace => {
                    app.chat_input.pop();
                }
                KeyCode::Enter => app.submit_chat(),
                KeyCode::Esc | KeyCode::Tab => app.current_view = View::Document,
                _ => {}
            },
            View::Command => match key.code {
                KeyCode::Char(c) => {
                    app.command_buffer.push(c);
                }
                KeyCode::Backspace => {
                    app.command_buffer.pop();
                }
                KeyCode::Enter => {
                    if app.run_command() == CommandResult::Quit {
                        return Ok(());
                    }
                }
                KeyCode::Esc => {
                    app.current_view = app.previous_view;
                    app.command_buffer.clear();
                }
                _ => {}
            },
        }
    }
}
