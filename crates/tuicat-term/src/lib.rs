//! Full-screen terminal front-end: the local shell, the SSH login form and
//! the remote session view.

pub mod app;
pub mod login;
mod ui;

use anyhow::Result;
use crossterm::event::EventStream;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::Terminal;
use std::io::{self, Stdout};
use tuicat_core::{LocalShell, SessionClient};

pub use app::{App, Mode};
pub use login::{LoginForm, LoginPrefill};

pub async fn run(
    shell: LocalShell,
    client: SessionClient,
    prefill: Option<LoginPrefill>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, App::new(shell, client), prefill).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

async fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    mut app: App,
    prefill: Option<LoginPrefill>,
) -> Result<()> {
    let mut event_stream = EventStream::new();
    let size = terminal.size()?;
    app.on_resize(size.width, size.height).await;
    app.start(prefill).await;

    while !app.quit {
        terminal.draw(|f| ui::draw(f, &app))?;

        tokio::select! {
            maybe_event = event_stream.next() => match maybe_event {
                Some(Ok(event)) => app.handle_event(event).await,
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
            Some(update) = app.client.next_update() => {
                app.apply_update(update).await;
            }
        }
    }

    Ok(())
}
