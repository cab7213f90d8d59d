//! Collaborator seams
//!
//! The USB transport, the capture/encode pipeline, the renderable surface,
//! and the storage-permission check are all external to this crate. These
//! traits are the exact surface the state machine needs from them, nothing
//! more. Monitor events do not come back through trait methods; they arrive
//! on the channel bridge so that every callback is marshaled onto the
//! controller task.

use crate::error::{Result, SessionError};
use crate::types::{DeviceHandle, Epoch, SurfaceRef};

/// USB device-attachment monitor
pub trait DeviceMonitor {
    /// Start watching for attach/detach and delivering events
    fn register(&mut self) -> Result<()>;

    /// Stop watching; no further events will be delivered
    fn unregister(&mut self);

    /// Ask the user for access to a camera
    ///
    /// Returns immediately; the eventual grant arrives as
    /// `MonitorEvent::Connected` and a denial as `MonitorEvent::Cancelled`,
    /// both echoing `epoch`. Device selection is the monitor's business.
    fn request_permission(&mut self, epoch: Epoch) -> Result<()>;
}

/// Camera capture session over a granted connection
pub trait CameraSession {
    /// Open the capture pipeline on a granted handle
    fn open(&mut self, handle: &DeviceHandle) -> std::result::Result<(), SessionError>;

    /// Start rendering the video stream onto a surface
    ///
    /// Only valid after a successful `open`, and never after `close`
    /// without an intervening `open`.
    fn start_preview(&mut self, surface: SurfaceRef) -> std::result::Result<(), SessionError>;

    /// Capture a still frame (only meaningful while previewing)
    fn capture_still(&mut self) -> std::result::Result<(), SessionError>;

    /// Close the capture pipeline and give the handle back
    fn close(&mut self) -> std::result::Result<(), SessionError>;

    /// Release all session resources; the session is unusable afterwards
    fn release(&mut self);

    /// Whether the pipeline is currently open
    fn is_opened(&self) -> bool;
}

/// Renderable preview surface
pub trait PreviewSurface {
    /// Reference handed to `CameraSession::start_preview`
    fn surface_ref(&self) -> SurfaceRef;

    /// The screen became visible again
    fn on_resume(&mut self);

    /// The screen is going into the background
    fn on_pause(&mut self);

    /// Set the width/height ratio the preview should keep
    fn set_aspect_ratio(&mut self, ratio: f32);
}

/// Storage-permission precondition for still capture
pub trait StoragePolicy {
    /// Whether captured stills can currently be persisted
    fn capture_allowed(&self) -> bool;
}
