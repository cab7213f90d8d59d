//! UVC camera session
//!
//! Claims a granted connection from the control-block registry and drives
//! the USB side of the capture pipeline: interface claiming for control and
//! streaming, and the still-image trigger request. Frame decode, encode,
//! and rendering belong to the external video pipeline and are not done
//! here.

use controller::{CameraSession, DeviceHandle, SessionError, SurfaceRef};
use rusb::Context;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::monitor::{ControlBlocks, OpenedCamera};

/// UVC class and request constants (USB Video Class 1.1, chapter 4)
mod uvc {
    /// Video interface class
    pub const CC_VIDEO: u8 = 0x0e;
    /// VideoControl interface subclass
    pub const SC_VIDEOCONTROL: u8 = 0x01;
    /// VideoStreaming interface subclass
    pub const SC_VIDEOSTREAMING: u8 = 0x02;
    /// Class-specific SET_CUR request
    pub const SET_CUR: u8 = 0x01;
    /// bmRequestType: host-to-device, class, interface
    pub const REQUEST_TYPE_SET: u8 = 0x21;
    /// VideoStreaming still-image trigger control selector
    pub const VS_STILL_IMAGE_TRIGGER_CONTROL: u8 = 0x05;
    /// Trigger value: transmit still image
    pub const STILL_TRIGGER_TRANSMIT: u8 = 0x01;
}

const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

struct ActiveCamera {
    handle_id: u32,
    dev: rusb::DeviceHandle<Context>,
    control_iface: u8,
    streaming_iface: u8,
    previewing: bool,
}

/// Camera session over a rusb device handle
pub struct UvcSession {
    blocks: ControlBlocks,
    active: Option<ActiveCamera>,
}

impl UvcSession {
    /// Create a session that claims connections from `blocks`
    pub fn new(blocks: ControlBlocks) -> Self {
        Self {
            blocks,
            active: None,
        }
    }
}

/// Locate the VideoControl and VideoStreaming interface numbers
fn find_video_interfaces(camera: &OpenedCamera) -> Result<(u8, u8), SessionError> {
    let config = camera
        .device
        .active_config_descriptor()
        .map_err(map_rusb_error)?;

    let mut control = None;
    let mut streaming = None;
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            if desc.class_code() != uvc::CC_VIDEO {
                continue;
            }
            match desc.sub_class_code() {
                uvc::SC_VIDEOCONTROL if control.is_none() => {
                    control = Some(desc.interface_number());
                }
                uvc::SC_VIDEOSTREAMING if streaming.is_none() => {
                    streaming = Some(desc.interface_number());
                }
                _ => {}
            }
        }
    }

    match (control, streaming) {
        (Some(c), Some(s)) => Ok((c, s)),
        _ => Err(SessionError::Unsupported(
            "device has no video control/streaming interfaces".into(),
        )),
    }
}

fn map_rusb_error(e: rusb::Error) -> SessionError {
    match e {
        rusb::Error::Access | rusb::Error::Busy => SessionError::Busy,
        rusb::Error::NoDevice | rusb::Error::NotFound => SessionError::InvalidHandle,
        other => SessionError::Transport(other.to_string()),
    }
}

impl CameraSession for UvcSession {
    fn open(&mut self, handle: &DeviceHandle) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::Busy);
        }

        // Take ownership of the granted connection; a detach since the
        // grant leaves nothing to take and the open fails cleanly.
        let camera = self
            .blocks
            .lock()
            .unwrap()
            .remove(&handle.0)
            .ok_or(SessionError::InvalidHandle)?;

        let (control_iface, streaming_iface) = find_video_interfaces(&camera)?;

        let dev = camera.handle;
        if let Err(e) = dev.set_auto_detach_kernel_driver(true) {
            // Not supported on all platforms
            debug!("auto-detach not available: {e}");
        }
        dev.claim_interface(control_iface).map_err(map_rusb_error)?;

        info!(
            handle = handle.0,
            control_iface, streaming_iface, "camera session opened"
        );
        self.active = Some(ActiveCamera {
            handle_id: handle.0,
            dev,
            control_iface,
            streaming_iface,
            previewing: false,
        });
        Ok(())
    }

    fn start_preview(&mut self, surface: SurfaceRef) -> Result<(), SessionError> {
        let camera = self.active.as_mut().ok_or(SessionError::InvalidHandle)?;
        camera
            .dev
            .claim_interface(camera.streaming_iface)
            .map_err(map_rusb_error)?;
        camera.previewing = true;
        info!(surface = surface.0, "preview stream started");
        Ok(())
    }

    fn capture_still(&mut self) -> Result<(), SessionError> {
        let camera = self.active.as_ref().ok_or(SessionError::InvalidHandle)?;
        if !camera.previewing {
            return Err(SessionError::Unsupported(
                "capture requires a running preview".into(),
            ));
        }

        camera
            .dev
            .write_control(
                uvc::REQUEST_TYPE_SET,
                uvc::SET_CUR,
                (uvc::VS_STILL_IMAGE_TRIGGER_CONTROL as u16) << 8,
                camera.streaming_iface as u16,
                &[uvc::STILL_TRIGGER_TRANSMIT],
                CONTROL_TIMEOUT,
            )
            .map_err(map_rusb_error)?;

        info!(handle = camera.handle_id, "still image triggered");
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let Some(camera) = self.active.take() else {
            return Ok(());
        };

        let mut first_error = None;
        if camera.previewing
            && let Err(e) = camera.dev.release_interface(camera.streaming_iface)
        {
            warn!("failed to release streaming interface: {e}");
            first_error.get_or_insert(map_rusb_error(e));
        }
        if let Err(e) = camera.dev.release_interface(camera.control_iface) {
            warn!("failed to release control interface: {e}");
            first_error.get_or_insert(map_rusb_error(e));
        }

        info!(handle = camera.handle_id, "camera session closed");
        // The rusb handle drops here, closing the device either way.
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        // Close already ran in normal teardown; this is the last-resort drop.
        self.active = None;
    }

    fn is_opened(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::control_blocks;

    #[test]
    fn test_open_without_granted_block_is_invalid_handle() {
        let mut session = UvcSession::new(control_blocks());
        let err = session.open(&DeviceHandle(1)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidHandle));
        assert!(!session.is_opened());
    }

    #[test]
    fn test_close_without_open_is_a_noop() {
        let mut session = UvcSession::new(control_blocks());
        assert!(session.close().is_ok());
    }

    #[test]
    fn test_preview_before_open_is_invalid() {
        let mut session = UvcSession::new(control_blocks());
        let err = session.start_preview(SurfaceRef(1)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidHandle));
    }

    #[test]
    fn test_rusb_error_mapping() {
        assert!(matches!(
            map_rusb_error(rusb::Error::Busy),
            SessionError::Busy
        ));
        assert!(matches!(
            map_rusb_error(rusb::Error::NoDevice),
            SessionError::InvalidHandle
        ));
        assert!(matches!(
            map_rusb_error(rusb::Error::Timeout),
            SessionError::Transport(_)
        ));
    }
}
