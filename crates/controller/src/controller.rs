//! Connection controller state machine
//!
//! Subscribes to device-monitor events, drives the camera session open and
//! close calls, and publishes a status snapshot whose `active` flag always
//! mirrors the true hardware state. All inputs (UI requests and monitor
//! events) are funneled through this one type on a single task; the state
//! and the held handle are never touched from anywhere else, so no locking
//! is needed beyond that confinement.

use async_channel::{Receiver, Sender, bounded};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::{MonitorEvent, Notice, UiRequest};
use crate::traits::{CameraSession, DeviceMonitor, PreviewSurface, StoragePolicy};
use crate::types::{ConnectionState, ControllerStatus, DeviceHandle, DeviceId, Epoch};

/// Depth of the user-visible notice queue
const NOTICE_QUEUE_DEPTH: usize = 32;

/// The device-connection and preview lifecycle state machine
///
/// Created once when the screen comes up and destroyed when it is
/// permanently closed. Between `on_start` and `on_destroy` it owns the
/// monitor, the session, and the surface; the UI only sees the published
/// [`ControllerStatus`] and the notice stream.
pub struct ConnectionController<M, S, P, G>
where
    M: DeviceMonitor,
    S: CameraSession,
    P: PreviewSurface,
    G: StoragePolicy,
{
    monitor: M,
    session: S,
    surface: P,
    storage: G,

    state: ConnectionState,
    /// Handle granted by the monitor; present exactly while a connection is
    /// held (single-camera assumption)
    handle: Option<DeviceHandle>,
    /// Device the held handle belongs to
    device: Option<DeviceId>,
    /// Generation of the most recent permission request
    epoch: Epoch,

    status_tx: watch::Sender<ControllerStatus>,
    notice_tx: Sender<Notice>,
}

impl<M, S, P, G> ConnectionController<M, S, P, G>
where
    M: DeviceMonitor,
    S: CameraSession,
    P: PreviewSurface,
    G: StoragePolicy,
{
    /// Create a controller and the channels the UI observes
    ///
    /// Returns the controller, the status watch receiver, and the notice
    /// receiver.
    pub fn new(
        monitor: M,
        session: S,
        surface: P,
        storage: G,
    ) -> (Self, watch::Receiver<ControllerStatus>, Receiver<Notice>) {
        let (status_tx, status_rx) = watch::channel(ControllerStatus::default());
        let (notice_tx, notice_rx) = bounded(NOTICE_QUEUE_DEPTH);

        let controller = Self {
            monitor,
            session,
            surface,
            storage,
            state: ConnectionState::Idle,
            handle: None,
            device: None,
            epoch: Epoch::default(),
            status_tx,
            notice_tx,
        };

        (controller, status_rx, notice_rx)
    }

    /// The screen became visible: register for device events, resume the
    /// preview surface
    pub fn on_start(&mut self) -> Result<()> {
        self.monitor.register()?;
        self.surface.on_resume();
        info!("controller started, monitor registered");
        Ok(())
    }

    /// The screen is going into the background
    ///
    /// Forces the state machine to idle, releases any held handle, and
    /// pauses the surface. Safe to call in any state.
    pub fn on_stop(&mut self) {
        self.stop_path();
        self.surface.on_pause();
        info!("controller stopped");
    }

    /// The screen is permanently closing
    ///
    /// Runs the stop path, then releases the session before unregistering
    /// the monitor. The order matters: a late device event must not reach
    /// an already-released session.
    pub fn on_destroy(&mut self) {
        self.on_stop();
        self.session.release();
        self.monitor.unregister();
        info!("controller destroyed");
    }

    /// Set the preview aspect ratio (width / height)
    pub fn set_aspect_ratio(&mut self, ratio: f32) {
        self.surface.set_aspect_ratio(ratio);
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a camera is actively previewing, as published to the UI
    pub fn query_active(&self) -> bool {
        self.status_tx.borrow().active
    }

    /// Process a user action
    pub fn handle_request(&mut self, request: UiRequest) {
        debug!(?request, state = %self.state, "ui request");
        match request {
            UiRequest::Start => self.request_start(),
            UiRequest::Stop => self.request_stop(),
            UiRequest::Capture => self.request_capture(),
        }
    }

    /// Process a monitor event
    pub fn handle_event(&mut self, event: MonitorEvent) {
        debug!(?event, state = %self.state, "monitor event");
        match event {
            MonitorEvent::Attached { device } => {
                self.notify(Notice::DeviceAttached(device));
            }
            MonitorEvent::Detached { device } => {
                self.notify(Notice::DeviceDetached(device));
                if self.device == Some(device) {
                    info!(device = device.0, "connected device detached, stopping");
                    self.stop_path();
                }
            }
            MonitorEvent::Connected {
                device,
                handle,
                epoch,
            } => self.on_connect(device, handle, epoch),
            MonitorEvent::Disconnected { device, handle } => {
                if self.handle == Some(handle) {
                    info!(device = device.0, "device disconnected, stopping");
                    self.stop_path();
                } else {
                    debug!(
                        handle = handle.0,
                        "disconnect for a released handle, ignoring"
                    );
                }
            }
            MonitorEvent::Cancelled { epoch } => self.on_cancel(epoch),
        }
    }

    fn request_start(&mut self) {
        match self.state {
            ConnectionState::Previewing
            | ConnectionState::AwaitingPermission
            | ConnectionState::Connecting => {
                debug!(state = %self.state, "start request ignored");
                return;
            }
            ConnectionState::Idle | ConnectionState::Closing => {}
        }

        let epoch = self.epoch.bump();
        self.state = ConnectionState::AwaitingPermission;
        self.publish();

        if let Err(e) = self.monitor.request_permission(epoch) {
            warn!("permission request failed: {e}");
            self.state = ConnectionState::Idle;
            self.publish();
        }
    }

    fn request_stop(&mut self) {
        // Idempotent: from any state this ends in Idle with the toggle off.
        self.stop_path();
    }

    fn request_capture(&mut self) {
        if self.state != ConnectionState::Previewing {
            debug!(state = %self.state, "capture request ignored while not previewing");
            return;
        }
        if !self.storage.capture_allowed() {
            info!("capture rejected: storage permission not granted");
            self.notify(Notice::StoragePermissionNeeded);
            return;
        }
        if let Err(e) = self.session.capture_still() {
            warn!("still capture failed: {e}");
            self.notify(Notice::CaptureFailed(e.to_string()));
        }
    }

    fn on_connect(&mut self, device: DeviceId, handle: DeviceHandle, epoch: Epoch) {
        if self.state != ConnectionState::AwaitingPermission || epoch != self.epoch {
            // Duplicate or superseded callback from the monitor.
            debug!(
                handle = handle.0,
                event_epoch = epoch.0,
                current_epoch = self.epoch.0,
                state = %self.state,
                "stale connect callback, ignoring"
            );
            return;
        }

        self.state = ConnectionState::Connecting;
        self.publish();

        if let Err(e) = self.session.open(&handle) {
            warn!(device = device.0, "camera open failed: {e}");
            self.notify(Notice::OpenFailed(e.to_string()));
            self.fail_closed();
            return;
        }

        self.handle = Some(handle);
        self.device = Some(device);

        if let Err(e) = self.session.start_preview(self.surface.surface_ref()) {
            warn!(device = device.0, "preview start failed: {e}");
            self.notify(Notice::OpenFailed(e.to_string()));
            self.fail_closed();
            return;
        }

        self.state = ConnectionState::Previewing;
        self.publish();
        info!(device = device.0, handle = handle.0, "preview running");
    }

    fn on_cancel(&mut self, epoch: Epoch) {
        if epoch != self.epoch {
            debug!(
                event_epoch = epoch.0,
                current_epoch = self.epoch.0,
                "stale cancel callback, ignoring"
            );
            return;
        }
        info!("permission cancelled");
        self.notify(Notice::PermissionCancelled);
        if self.handle.is_some() {
            self.stop_path();
        } else {
            self.state = ConnectionState::Idle;
            self.publish();
        }
    }

    /// Close the session if anything is held and force the machine to idle
    ///
    /// The single teardown path behind `request_stop`, detach, disconnect,
    /// cancel-while-held, and screen stop. Close failures are logged but
    /// never leave the controller stuck in `Closing`, and the handle is
    /// released exactly once (`Option::take`).
    fn stop_path(&mut self) {
        if self.handle.is_some() || self.session.is_opened() {
            self.state = ConnectionState::Closing;
            self.publish();
            if let Err(e) = self.session.close() {
                warn!("camera close failed, forcing idle: {e}");
            }
        }
        self.handle.take();
        self.device.take();
        self.state = ConnectionState::Idle;
        self.publish();
    }

    /// Open or preview failed: fail closed, no retry
    fn fail_closed(&mut self) {
        if self.handle.is_some() {
            // Never leave a half-open session behind a released handle.
            if let Err(e) = self.session.close() {
                warn!("close after failed open also failed: {e}");
            }
        }
        self.handle.take();
        self.device.take();
        self.state = ConnectionState::Idle;
        self.publish();
    }

    /// The single point where the UI toggle is derived from the state
    fn publish(&self) {
        self.status_tx.send_replace(ControllerStatus {
            state: self.state,
            active: self.state == ConnectionState::Previewing,
        });
    }

    fn notify(&self, notice: Notice) {
        if self.notice_tx.try_send(notice).is_err() {
            debug!("notice queue full or closed, dropping notice");
        }
    }
}
