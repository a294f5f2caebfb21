mod app;
mod event;
mod input;
mod link;
mod prefs;
mod retry;
mod sync;
mod ui;
mod view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::DisableMouseCapture,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use pokr_common::memory::MemoryStore;
use pokr_common::remote::RemoteStore;

use crate::app::Startup;
use crate::link::{room_from_link, Location};
use crate::prefs::PreferenceStore;

/// POKR Client - planning poker in the terminal
#[derive(Parser, Debug)]
#[command(name = "pokr-client", version, about)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:9877")]
    server: String,

    /// Display name (defaults to the saved one)
    #[arg(short, long)]
    name: Option<String>,

    /// Room code to join
    #[arg(short, long)]
    room: Option<String>,

    /// Share link to join, e.g. pokr://host:9877/?room=AB12CD
    #[arg(short, long)]
    link: Option<String>,

    /// Preferences file
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Keep rooms in this process instead of talking to a server
    #[arg(long)]
    local: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pokr_client=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let prefs = PreferenceStore::open(args.prefs.unwrap_or_else(PreferenceStore::default_path))?;
    tracing::debug!("Preferences at {}", prefs.path().display());

    let startup = Startup {
        name: args
            .name
            .or_else(|| prefs.user_name().map(str::to_string))
            .unwrap_or_default(),
        link_room: args
            .link
            .as_deref()
            .and_then(room_from_link)
            .or_else(|| args.room.map(|r| r.trim().to_ascii_uppercase())),
    };

    // Connect before touching the terminal so failures print normally.
    let location = Location::new(if args.local { "local" } else { &args.server })?;
    let remote = if args.local {
        None
    } else {
        let store = RemoteStore::connect(&args.server)
            .await
            .map_err(|e| anyhow::anyhow!("Could not connect to {}: {}", args.server, e))?;
        Some(Arc::new(store))
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = match remote {
        Some(store) => app::run(&mut terminal, store, prefs, location, startup).await,
        None => {
            let store = Arc::new(MemoryStore::new());
            app::run(&mut terminal, store, prefs, location, startup).await
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}
