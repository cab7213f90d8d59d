//! Mock collaborators for controller tests
//!
//! All mocks share a [`CallLog`] so tests can assert not only what was
//! called but in which order (close-before-release, session-before-monitor
//! teardown, and so on).

use std::sync::{Arc, Mutex};

use crate::error::{Result, SessionError};
use crate::traits::{CameraSession, DeviceMonitor, PreviewSurface, StoragePolicy};
use crate::types::{DeviceHandle, Epoch, SurfaceRef};

/// Shared, ordered record of collaborator calls
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// Snapshot of all entries in call order
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Position of the first entry starting with `prefix`
    pub fn index_of(&self, prefix: &str) -> Option<usize> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.starts_with(prefix))
    }
}

/// Device monitor mock; records calls, never produces events on its own
pub struct MockMonitor {
    log: CallLog,
    /// Make `register` fail
    pub fail_register: bool,
    /// Make `request_permission` fail
    pub fail_permission: bool,
}

impl MockMonitor {
    /// Create a well-behaved mock
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_register: false,
            fail_permission: false,
        }
    }
}

impl DeviceMonitor for MockMonitor {
    fn register(&mut self) -> Result<()> {
        self.log.push("monitor.register");
        if self.fail_register {
            return Err(crate::ControllerError::Monitor("register failed".into()));
        }
        Ok(())
    }

    fn unregister(&mut self) {
        self.log.push("monitor.unregister");
    }

    fn request_permission(&mut self, epoch: Epoch) -> Result<()> {
        self.log
            .push(format!("monitor.request_permission({})", epoch.0));
        if self.fail_permission {
            return Err(crate::ControllerError::Monitor(
                "permission dispatch failed".into(),
            ));
        }
        Ok(())
    }
}

/// Camera session mock with scriptable failures
pub struct MockSession {
    log: CallLog,
    opened: bool,
    /// Make `open` fail
    pub fail_open: bool,
    /// Make `start_preview` fail
    pub fail_preview: bool,
    /// Make `close` fail (teardown must still complete)
    pub fail_close: bool,
    /// Make `capture_still` fail
    pub fail_capture: bool,
}

impl MockSession {
    /// Create a well-behaved mock
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            opened: false,
            fail_open: false,
            fail_preview: false,
            fail_close: false,
            fail_capture: false,
        }
    }
}

impl CameraSession for MockSession {
    fn open(&mut self, handle: &DeviceHandle) -> std::result::Result<(), SessionError> {
        self.log.push(format!("session.open({})", handle.0));
        if self.fail_open {
            return Err(SessionError::Busy);
        }
        self.opened = true;
        Ok(())
    }

    fn start_preview(&mut self, surface: SurfaceRef) -> std::result::Result<(), SessionError> {
        self.log.push(format!("session.start_preview({})", surface.0));
        if self.fail_preview {
            return Err(SessionError::Transport("preview refused".into()));
        }
        Ok(())
    }

    fn capture_still(&mut self) -> std::result::Result<(), SessionError> {
        self.log.push("session.capture_still");
        if self.fail_capture {
            return Err(SessionError::Transport("capture refused".into()));
        }
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), SessionError> {
        self.log.push("session.close");
        self.opened = false;
        if self.fail_close {
            return Err(SessionError::Transport("close refused".into()));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.log.push("session.release");
        self.opened = false;
    }

    fn is_opened(&self) -> bool {
        self.opened
    }
}

/// Preview surface mock
pub struct MockSurface {
    log: CallLog,
    /// Last aspect ratio set, if any
    pub aspect_ratio: Option<f32>,
}

impl MockSurface {
    /// Create a mock surface
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            aspect_ratio: None,
        }
    }
}

impl PreviewSurface for MockSurface {
    fn surface_ref(&self) -> SurfaceRef {
        SurfaceRef(42)
    }

    fn on_resume(&mut self) {
        self.log.push("surface.on_resume");
    }

    fn on_pause(&mut self) {
        self.log.push("surface.on_pause");
    }

    fn set_aspect_ratio(&mut self, ratio: f32) {
        self.aspect_ratio = Some(ratio);
        self.log.push(format!("surface.set_aspect_ratio({ratio})"));
    }
}

/// Storage policy with a fixed answer
pub struct FixedStorage(bool);

impl StoragePolicy for FixedStorage {
    fn capture_allowed(&self) -> bool {
        self.0
    }
}

/// Storage policy that always answers `allowed`
pub fn fixed_storage(allowed: bool) -> FixedStorage {
    FixedStorage(allowed)
}
