//! Error types

use thiserror::Error;

/// Errors surfaced by the connection controller
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Permission request denied or dialog dismissed
    #[error("permission request cancelled")]
    PermissionCancelled,

    /// Session open or preview start failed
    #[error("failed to open camera: {0}")]
    Open(SessionError),

    /// Session close failed (teardown still completes)
    #[error("failed to close camera: {0}")]
    Close(SessionError),

    /// Capture precondition not satisfied
    #[error("capture rejected: {0}")]
    CaptureRejected(String),

    /// Monitor registration or permission dispatch failed
    #[error("device monitor error: {0}")]
    Monitor(String),

    /// Event channel closed or full
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a camera session implementation
#[derive(Debug, Error)]
pub enum SessionError {
    /// The device handle does not refer to a live connection
    #[error("invalid or released device handle")]
    InvalidHandle,

    /// The device is held by another consumer
    #[error("device busy")]
    Busy,

    /// USB or driver-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The session does not support the requested operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Type alias for controller results
pub type Result<T> = std::result::Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ControllerError::Open(SessionError::Busy);
        let msg = format!("{}", err);
        assert!(msg.contains("failed to open camera"));
        assert!(msg.contains("device busy"));
    }

    #[test]
    fn test_capture_rejected_display() {
        let err = ControllerError::CaptureRejected("storage permission missing".into());
        assert!(format!("{}", err).contains("storage permission missing"));
    }
}
