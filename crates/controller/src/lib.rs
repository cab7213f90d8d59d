//! Connection and preview lifecycle core for uvc-view
//!
//! This crate owns the device-connection state machine that sits between a
//! USB device monitor, a camera capture session, and the single-screen UI.
//! The collaborators themselves (USB transport, video pipeline, rendering)
//! live behind traits; this crate only sequences them and keeps the
//! UI-facing "active" flag consistent with the real hardware state.

pub mod channel;
pub mod controller;
pub mod error;
pub mod event;
pub mod logging;
pub mod test_utils;
pub mod traits;
pub mod types;

pub use channel::{MonitorEvents, MonitorPort, create_monitor_bridge};
pub use controller::ConnectionController;
pub use error::{ControllerError, Result, SessionError};
pub use event::{MonitorEvent, Notice, UiRequest};
pub use logging::setup_logging;
pub use traits::{CameraSession, DeviceMonitor, PreviewSurface, StoragePolicy};
pub use types::{ConnectionState, ControllerStatus, DeviceHandle, DeviceId, Epoch, SurfaceRef};
