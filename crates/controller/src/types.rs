//! Core type definitions
//!
//! Identifiers for devices and granted connections, the connection state
//! enum, and the status snapshot published to the UI layer.

/// Unique device identifier (monitor-assigned)
///
/// Identifies a camera seen by the device monitor. Stable from attach to
/// detach; a re-attached device gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Handle to a granted, open connection
///
/// Produced by the device monitor when the user grants access to a camera.
/// At most one handle is held by the controller at a time, from grant until
/// the session is closed or the device disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

/// Generation counter for permission requests
///
/// Each `request_start` bumps the epoch and stamps it into the permission
/// request. Connect/cancel callbacks echo the epoch; a mismatch marks the
/// callback as stale (answering a superseded request) and it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Epoch(pub u64);

impl Epoch {
    /// Advance to the next generation
    pub fn bump(&mut self) -> Epoch {
        self.0 += 1;
        *self
    }
}

/// Opaque reference to a renderable preview surface
///
/// Handed from the preview surface to the camera session; the controller
/// never looks inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRef(pub u64);

/// Connection state of the controller
///
/// Exactly one state is active per controller instance at any time. All
/// transitions happen on the controller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No device held, nothing pending
    Idle,
    /// Permission request issued, waiting for grant or cancel
    AwaitingPermission,
    /// Permission granted, session open in progress
    Connecting,
    /// Session open and preview running
    Previewing,
    /// Close issued, waiting for completion
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::AwaitingPermission => "awaiting permission",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Previewing => "previewing",
            ConnectionState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Status snapshot published to the UI
///
/// `active` is the UI toggle. It is computed at the single publish point in
/// the controller and is `true` iff `state == Previewing`; the UI renders it
/// and never writes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    /// Current connection state
    pub state: ConnectionState,
    /// Whether a camera is actively previewing
    pub active: bool,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            active: false,
        }
    }
}
