/*!
 * WIFITILE TUI Interface
 * A single quick-settings tile with its dialogs
 */

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, Dialog};
use crate::client::{Activation, TileIcon};

// Conservative color palette
const BLUE: Color = Color::Rgb(100, 149, 237);
const GRAY: Color = Color::Rgb(128, 128, 128);
const WHITE: Color = Color::Rgb(255, 255, 255);
const RED: Color = Color::Rgb(220, 20, 60);

const TILE_WIDTH: u16 = 30;
const TILE_HEIGHT: u16 = 7;

pub fn render_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(TILE_HEIGHT), // Tile
            Constraint::Length(1),        // Status line
            Constraint::Length(1),        // Key help
        ])
        .split(f.area());

    render_tile(f, centered(chunks[0], TILE_WIDTH, TILE_HEIGHT), app);
    render_status(f, chunks[1], app);
    render_help(f, chunks[2]);

    if let Some(dialog) = app.dialog {
        render_dialog(f, dialog);
    }
}

fn icon_glyph(icon: TileIcon) -> &'static str {
    match icon {
        TileIcon::Signal => "▂▄▆█",
        TileIcon::NoSignal => "▁ ✕ ",
    }
}

fn render_tile(f: &mut Frame, area: Rect, app: &App) {
    let Some(tile) = &app.tile else {
        let placeholder = Paragraph::new("Waiting for tile…")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(GRAY)));
        f.render_widget(placeholder, area);
        return;
    };

    let (accent, body) = match tile.activation {
        Activation::Active => (BLUE, Style::default().fg(WHITE).bg(BLUE)),
        Activation::Inactive => (GRAY, Style::default().fg(WHITE)),
    };

    let content = vec![
        Line::from(Span::styled(icon_glyph(tile.icon), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(tile.label.as_str(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(tile.subtitle.as_str()),
    ];

    let paragraph = Paragraph::new(content)
        .style(body)
        .alignment(Alignment::Center)
        .block(Block::default()
            .borders(Borders::ALL)
            .title(format!("Wi-Fi · {}", tile.updated_at.format("%H:%M:%S")))
            .border_style(Style::default().fg(accent)));

    f.render_widget(paragraph, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let color = if app.connected { GRAY } else { RED };
    let lifecycle = app
        .lifecycle
        .map(|l| format!("{:?} · ", l))
        .unwrap_or_default();
    let status = Paragraph::new(Line::from(vec![
        Span::styled(lifecycle, Style::default().fg(GRAY)),
        Span::styled(app.status.as_str(), Style::default().fg(color)),
    ]))
    .alignment(Alignment::Center);

    f.render_widget(status, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new("Enter toggle · r refresh · n cancel unlock · Esc dismiss · q quit")
        .style(Style::default().fg(GRAY))
        .alignment(Alignment::Center);
    f.render_widget(help, area);
}

fn render_dialog(f: &mut Frame, dialog: Dialog) {
    let (title, text) = match dialog {
        Dialog::AccessRequired => (
            "Shell access required",
            "Toggling Wi-Fi needs root or passwordless sudo for wifitiled.\n\nEsc to close",
        ),
        Dialog::Unlock => (
            "Unlock required",
            "Unlock your session to toggle Wi-Fi.\n\nn to cancel",
        ),
    };

    let area = centered(f.area(), 44, 7);
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true })
        .block(Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(RED)));

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
