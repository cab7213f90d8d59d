//! TUI rendering with ratatui
//!
//! Single-screen layout: status bar with the active toggle, a preview pane
//! standing in for the video surface, the notice history, and a help bar.

use controller::ConnectionState;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use std::time::Duration;

use super::app::App;

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Status bar
            Constraint::Min(8),    // Preview pane
            Constraint::Length(8), // Notices
            Constraint::Length(3), // Help bar
        ])
        .split(frame.area());

    render_status_bar(frame, app, chunks[0]);
    render_preview(frame, app, chunks[1]);
    render_notices(frame, app, chunks[2]);
    render_help_bar(frame, chunks[3]);
}

/// Render the status bar with the camera toggle
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.status();
    let toggle = if status.active {
        Span::styled(
            "[ ● ACTIVE ]",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("[ ○ off ]", Style::default().fg(Color::DarkGray))
    };

    let text = vec![
        Span::styled("Camera: ", Style::default().fg(Color::DarkGray)),
        toggle,
        Span::raw("  |  "),
        Span::styled("State: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            status.state.to_string(),
            Style::default().fg(state_color(status.state)),
        ),
        Span::raw("  |  "),
        Span::styled("Uptime: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format_duration(app.uptime()),
            Style::default().fg(Color::Green),
        ),
    ];

    let bar = Paragraph::new(Line::from(text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" uvc-view ")
                .title_alignment(Alignment::Center)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(bar, area);
}

/// Render the preview pane
///
/// The real frames render on the external surface; this pane shows what the
/// stream is doing and the aspect ratio it keeps.
fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.status();
    let surface = app.surface();

    let (message, style) = if surface.paused {
        (
            "preview paused".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        match status.state {
            ConnectionState::Previewing => (
                format!("● LIVE  {}", aspect_label(surface.aspect_ratio)),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            ConnectionState::AwaitingPermission => (
                "waiting for camera access...".to_string(),
                Style::default().fg(Color::Yellow),
            ),
            ConnectionState::Connecting => (
                "connecting...".to_string(),
                Style::default().fg(Color::Yellow),
            ),
            ConnectionState::Closing => (
                "stopping...".to_string(),
                Style::default().fg(Color::DarkGray),
            ),
            ConnectionState::Idle => (
                "camera off, press space to start".to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        }
    };

    // Center the message vertically with leading blank lines
    let pad = (area.height.saturating_sub(3) / 2) as usize;
    let mut lines: Vec<Line> = std::iter::repeat_with(Line::default).take(pad).collect();
    lines.push(Line::from(Span::styled(message, style)));

    let pane = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Preview ")
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(pane, area);
}

/// Render the notice history
fn render_notices(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .notices()
        .map(|n| ListItem::new(Line::from(n.as_str())))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Notices ")
            .border_style(Style::default().fg(Color::Blue)),
    );

    frame.render_widget(list, area);
}

/// Render the help bar (bottom panel)
fn render_help_bar(frame: &mut Frame, area: Rect) {
    let text = vec![
        Span::styled("space", Style::default().fg(Color::Yellow)),
        Span::raw(" toggle preview  "),
        Span::styled("c", Style::default().fg(Color::Yellow)),
        Span::raw(" capture still  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ];

    let bar = Paragraph::new(Line::from(text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(bar, area);
}

fn state_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Idle => Color::DarkGray,
        ConnectionState::AwaitingPermission | ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Previewing => Color::Green,
        ConnectionState::Closing => Color::DarkGray,
    }
}

/// "4:3"-style label for common ratios, decimal otherwise
fn aspect_label(ratio: f32) -> String {
    const COMMON: [(f32, &str); 4] = [
        (4.0 / 3.0, "4:3"),
        (16.0 / 9.0, "16:9"),
        (3.0 / 2.0, "3:2"),
        (1.0, "1:1"),
    ];
    for (value, label) in COMMON {
        if (ratio - value).abs() < 0.01 {
            return label.to_string();
        }
    }
    format!("{ratio:.2}:1")
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
