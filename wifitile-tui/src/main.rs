/*!
 * WIFITILE Quick-Toggle Wi-Fi Tile TUI
 * The quick-settings tile, in a terminal
 * Onyx Digital Intelligence Development LLC
 */

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    Terminal,
};
use std::io;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

mod ui;
mod client;
mod app;

use app::App;
use client::TileClient;
use ui::render_ui;

#[derive(Parser)]
#[command(name = "wifitile")]
#[command(about = "WIFITILE Quick-Toggle Wi-Fi Tile TUI")]
struct Cli {
    /// Daemon socket path
    #[arg(short, long, default_value = "/run/wifitile/wifitile.sock")]
    socket: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Subscribing makes the daemon start observing connectivity
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = TileClient::subscribe(&cli.socket, tx).await.ok();
    let mut app = App::new(client);

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create ticker for UI updates
    let mut ticker = interval(Duration::from_millis(100));

    let result = loop {
        // Handle events
        if event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let handled = match key.code {
                    KeyCode::Char('q') => break Ok(()),
                    KeyCode::Enter | KeyCode::Char(' ') => app.click().await,
                    KeyCode::Char('n') | KeyCode::Esc => app.dismiss_dialog().await,
                    KeyCode::Char('r') => app.refresh().await,
                    _ => Ok(()),
                };
                if let Err(e) = handled {
                    app.status = e.to_string();
                }
            }
        }

        // Drain daemon messages
        while let Ok(message) = rx.try_recv() {
            app.handle_message(message);
        }

        ticker.tick().await;

        // Render UI
        if let Err(e) = terminal.draw(|f| render_ui(f, &app)) {
            break Err(anyhow::Error::from(e));
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
