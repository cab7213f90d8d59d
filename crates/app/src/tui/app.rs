//! TUI application state
//!
//! Holds what the single screen renders: the controller's published status,
//! the surface view, and a short notice history. User actions are turned
//! into controller requests here; the toggle itself is never written from
//! this layer.

use controller::{ControllerStatus, UiRequest};
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::watch;

use super::events::Action;
use crate::surface::{SurfaceState, SurfaceView};

/// Notices kept on screen
const NOTICE_HISTORY: usize = 6;

/// Application state for the single screen
pub struct App {
    status_rx: watch::Receiver<ControllerStatus>,
    surface_view: SurfaceView,
    notices: VecDeque<String>,
    should_quit: bool,
    start_time: Instant,
}

impl App {
    /// Create the screen state
    pub fn new(status_rx: watch::Receiver<ControllerStatus>, surface_view: SurfaceView) -> Self {
        Self {
            status_rx,
            surface_view,
            notices: VecDeque::new(),
            should_quit: false,
            start_time: Instant::now(),
        }
    }

    /// Latest controller status
    pub fn status(&self) -> ControllerStatus {
        *self.status_rx.borrow()
    }

    /// Latest surface state
    pub fn surface(&self) -> SurfaceState {
        self.surface_view.snapshot()
    }

    /// Notice history, newest last
    pub fn notices(&self) -> impl Iterator<Item = &String> {
        self.notices.iter()
    }

    /// Uptime of the screen
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Whether the app should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Append a notice, dropping the oldest past the history cap
    pub fn push_notice(&mut self, notice: String) {
        if self.notices.len() == NOTICE_HISTORY {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    /// Map a user action onto a controller request
    ///
    /// The toggle key requests a transition away from the rendered state;
    /// it does not flip anything locally.
    pub fn handle_action(&mut self, action: Action) -> Option<UiRequest> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                None
            }
            Action::TogglePreview => {
                if self.status().active {
                    Some(UiRequest::Stop)
                } else {
                    Some(UiRequest::Start)
                }
            }
            Action::Capture => Some(UiRequest::Capture),
            Action::None => None,
        }
    }
}
