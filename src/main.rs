//! feedmark — a terminal news reader with per-user read and favorite marks.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐ FeedState ┌─────────────┐ ViewState ┌──────────┐  draw()  ┌──────────┐
//! │  poll.rs │ ────────► │ pipeline.rs │ ────────► │  app.rs  │ ───────► │  ui.rs   │
//! │ (thread) │  (watch)  │   (tokio)   │  (watch)  │ (state)  │          │ (render) │
//! └──────────┘           └─────────────┘           └──────────┘          └──────────┘
//!                          ▲        │                   ▲
//!          visited/favorite│        │ mark / toggle     │ handle_key_event()
//!                 ┌────────┴────────▼┐             ┌──────────┐
//!                 │      store/      │             │ input.rs │
//!                 └──────────────────┘             └──────────┘
//! ```
//!
//! * **`source/`** — the `FeedSource` trait, the RSS parser, the HTTP source
//!   and the content sanitizer.
//! * **`key`** — guid → storage-safe key encoding.
//! * **`store/`** — membership store and identity traits, plus the in-memory
//!   backend.
//! * **`reconcile`** — the pure join of feed, marks and tab into a view.
//! * **`pipeline`** — keeps that join live and owns the mark mutations.
//! * **`poll`** — spawns a background thread that fetches the feed on a timer.
//! * **`app`** / **`ui`** / **`input`** — terminal front end.
//! * **`main`** — wires everything together: parse config, start logging,
//!   sign in, set up the terminal and run the event loop.

mod app;
mod config;
mod error;
mod input;
mod key;
mod pipeline;
mod poll;
mod reconcile;
mod source;
mod store;
mod ui;

use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use pipeline::ArticleFeed;
use reconcile::FeedState;
use source::HttpFeedSource;
use store::{IdentityProvider, MemoryBackend};

// ---------------------------------------------------------------------------
// Terminal lifetime
// ---------------------------------------------------------------------------

/// Owns raw mode and the alternate screen for as long as it lives.
///
/// Dropping it, on return or while unwinding, hands the terminal back in
/// the state the shell left it.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the default hook prints a panic, so the
/// message is readable.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// Log to a file: stdout is owned by the UI.
fn init_logging(config: &Config) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "feedmark=info".into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Sign in (or up) with configured credentials.  Failure is not fatal: the
/// reader still works, marks just go to the unknown-user bucket.
fn authenticate(identity: &dyn IdentityProvider, config: &Config) {
    let Some((email, password)) = config.credentials() else {
        info!("no credentials configured; running signed out");
        return;
    };
    let outcome = if config.sign_up {
        identity.sign_up(email, password)
    } else {
        identity.sign_in(email, password)
    };
    match outcome {
        Ok(user) => info!(uid = %user.uid, "authenticated"),
        Err(err) => warn!(%err, email, "authentication failed"),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(&config)?;
    install_panic_hook();
    info!(url = %config.url, "starting");

    // -- shared backend -----------------------------------------------------
    let backend = Arc::new(MemoryBackend::new());
    authenticate(backend.as_ref(), &config);

    // -- reconciliation pipeline --------------------------------------------
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let (feed_tx, feed_rx) = watch::channel(FeedState::Pending);
    let pipeline = Arc::new(ArticleFeed::new(
        backend.clone(),
        backend.clone(),
        feed_rx,
        config.grace(),
    ));
    runtime.spawn(pipeline.clone().run());

    // -- feed polling -------------------------------------------------------
    let source = Arc::new(HttpFeedSource::new(&config.url, "RSS", config.timeout()));
    let poller = poll::spawn(source, feed_tx, config.refresh_interval());

    // -- terminal -----------------------------------------------------------
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(pipeline, backend, poller.refresh_handle());

    // -- main event loop ----------------------------------------------------
    // Sync the reconciled view, draw, then wait up to one tick for a key.
    let tick_rate = Duration::from_millis(100);

    loop {
        app.sync();

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.quit {
            break;
        }
    }

    // The poller may be mid-request; it exits on its own once it notices the
    // refresh handles are gone.
    drop(app);
    drop(poller);
    runtime.shutdown_timeout(Duration::from_millis(200));
    info!("bye");
    Ok(())
}
