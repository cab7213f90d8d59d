//! Terminal preview surface
//!
//! The actual pixel rendering belongs to the external video pipeline; the
//! terminal "surface" tracks what the UI needs to draw the preview pane:
//! the configured aspect ratio and whether the screen is paused. The state
//! is shared so the TUI can render it while the controller owns the surface.

use controller::{PreviewSurface, SurfaceRef};
use std::sync::{Arc, Mutex};

/// Snapshot of the surface state for rendering
#[derive(Debug, Clone, Copy)]
pub struct SurfaceState {
    /// Width-over-height ratio the preview keeps
    pub aspect_ratio: f32,
    /// Whether the screen is in the background
    pub paused: bool,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            aspect_ratio: 4.0 / 3.0,
            paused: true,
        }
    }
}

/// Surface implementation handed to the controller
pub struct TerminalSurface {
    shared: Arc<Mutex<SurfaceState>>,
}

/// Render-side view of the surface state
#[derive(Clone)]
pub struct SurfaceView {
    shared: Arc<Mutex<SurfaceState>>,
}

impl SurfaceView {
    /// Current state snapshot
    pub fn snapshot(&self) -> SurfaceState {
        *self.shared.lock().unwrap()
    }
}

impl TerminalSurface {
    /// Create a surface and the view the TUI renders from
    pub fn new() -> (Self, SurfaceView) {
        let shared = Arc::new(Mutex::new(SurfaceState::default()));
        (
            Self {
                shared: shared.clone(),
            },
            SurfaceView { shared },
        )
    }
}

impl PreviewSurface for TerminalSurface {
    fn surface_ref(&self) -> SurfaceRef {
        // Single surface per screen; the session never dereferences this.
        SurfaceRef(1)
    }

    fn on_resume(&mut self) {
        self.shared.lock().unwrap().paused = false;
    }

    fn on_pause(&mut self) {
        self.shared.lock().unwrap().paused = true;
    }

    fn set_aspect_ratio(&mut self, ratio: f32) {
        self.shared.lock().unwrap().aspect_ratio = ratio;
    }
}
