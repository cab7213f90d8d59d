//! Terminal user interface
//!
//! The single screen of the application: renders the controller's published
//! status and turns key presses into controller requests. The main loop here
//! is also the controller task: UI requests and monitor events are handled
//! on this one task in arrival order, which is the serialization the state
//! machine relies on.

mod app;
mod events;
mod ui;

use anyhow::{Context, Result};
use controller::{ConnectionController, ControllerStatus, MonitorEvents, Notice};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::monitor::UsbMonitor;
use crate::session::UvcSession;
use crate::storage::CaptureDir;
use crate::surface::{SurfaceView, TerminalSurface};
use self::app::App;
use self::events::{Action, Event, EventHandler};

/// The controller as wired in this binary
pub type ScreenController = ConnectionController<UsbMonitor, UvcSession, TerminalSurface, CaptureDir>;

/// UI tick rate
const TICK_RATE: Duration = Duration::from_millis(100);

/// Run the screen until the user quits
///
/// Owns terminal setup/teardown; the controller is destroyed (session
/// released, monitor unregistered) before the terminal is restored.
pub async fn run(
    mut controller: ScreenController,
    monitor_events: MonitorEvents,
    status_rx: watch::Receiver<ControllerStatus>,
    notice_rx: async_channel::Receiver<Notice>,
    surface_view: SurfaceView,
) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = event_loop(
        &mut terminal,
        &mut controller,
        monitor_events,
        status_rx,
        notice_rx,
        surface_view,
    )
    .await;

    controller.on_destroy();

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    controller: &mut ScreenController,
    monitor_events: MonitorEvents,
    status_rx: watch::Receiver<ControllerStatus>,
    notice_rx: async_channel::Receiver<Notice>,
    surface_view: SurfaceView,
) -> Result<()> {
    controller.on_start()?;

    let mut events = EventHandler::new(TICK_RATE);
    let mut app = App::new(status_rx, surface_view);

    loop {
        terminal
            .draw(|frame| ui::render(frame, &app))
            .context("Failed to draw frame")?;

        tokio::select! {
            terminal_event = events.next() => {
                match terminal_event {
                    Some(Event::Key(key)) => {
                        if let Some(request) = app.handle_action(Action::from(key)) {
                            controller.handle_request(request);
                        }
                    }
                    Some(Event::Resize(_, _)) | Some(Event::Tick) => {}
                    None => break,
                }
            }
            monitor_event = monitor_events.recv() => {
                match monitor_event {
                    Ok(event) => controller.handle_event(event),
                    Err(e) => {
                        debug!("monitor event stream closed: {e}");
                        break;
                    }
                }
            }
            notice = notice_rx.recv() => {
                if let Ok(notice) = notice {
                    app.push_notice(notice.to_string());
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
