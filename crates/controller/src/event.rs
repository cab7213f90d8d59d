//! Event and request enums
//!
//! Every input to the state machine is one of two enums: `MonitorEvent`
//! (asynchronous hardware callbacks, marshaled over the channel bridge) or
//! `UiRequest` (user actions from the screen). Both are processed by the
//! same serialized transition path in the controller.

use crate::types::{DeviceHandle, DeviceId, Epoch};

/// Asynchronous events from the device monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A candidate device was plugged in (informational)
    Attached {
        /// Device that appeared
        device: DeviceId,
    },

    /// A device was unplugged
    ///
    /// Detach of the currently connected device triggers the stop path;
    /// any other detach is informational.
    Detached {
        /// Device that disappeared
        device: DeviceId,
    },

    /// The user granted access and the monitor opened a connection
    ///
    /// `epoch` echoes the permission request this grant answers. Only valid
    /// while awaiting permission for that epoch; anything else is a stale
    /// or duplicate callback and is dropped.
    Connected {
        /// Device the grant refers to
        device: DeviceId,
        /// Granted connection handle, owned by the controller from here on
        handle: DeviceHandle,
        /// Generation of the permission request being answered
        epoch: Epoch,
    },

    /// The connection behind a handle went away
    Disconnected {
        /// Device the connection belonged to
        device: DeviceId,
        /// Handle that is no longer valid
        handle: DeviceHandle,
    },

    /// The permission request was denied or dismissed
    Cancelled {
        /// Generation of the permission request being answered
        epoch: Epoch,
    },
}

/// User actions from the UI layer
///
/// The UI only ever emits requests; it never mutates connection state or
/// the active toggle directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiRequest {
    /// Begin the permission/connect flow
    Start,
    /// Stop previewing and release the device
    Stop,
    /// Capture a still frame (only honored while previewing)
    Capture,
}

/// User-visible alerts emitted by the controller
///
/// The UI renders these as transient notifications (the moral equivalent of
/// the toasts in a mobile camera app).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A camera was plugged in
    DeviceAttached(DeviceId),
    /// A camera was unplugged
    DeviceDetached(DeviceId),
    /// The permission request was denied or dismissed
    PermissionCancelled,
    /// Opening the camera or starting preview failed
    OpenFailed(String),
    /// Still capture needs storage permission first
    StoragePermissionNeeded,
    /// Still capture was requested but the session reported an error
    CaptureFailed(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::DeviceAttached(id) => write!(f, "device {} attached", id.0),
            Notice::DeviceDetached(id) => write!(f, "device {} detached", id.0),
            Notice::PermissionCancelled => write!(f, "camera access cancelled"),
            Notice::OpenFailed(e) => write!(f, "could not open camera: {e}"),
            Notice::StoragePermissionNeeded => {
                write!(f, "grant storage permission to capture stills")
            }
            Notice::CaptureFailed(e) => write!(f, "capture failed: {e}"),
        }
    }
}
