//! Async channel bridge between the monitor thread and the controller task
//!
//! Hardware callbacks (attach, detach, connect, disconnect, cancel) fire on
//! a monitor-owned thread. They must never touch controller state directly;
//! instead they are pushed through this bounded bridge and drained by the
//! single controller task, which serializes all transitions and preserves
//! the monitor's delivery order.

use async_channel::{Receiver, Sender, bounded};

use crate::error::{ControllerError, Result};
use crate::event::MonitorEvent;

/// Capacity of the event bridge
///
/// Attach/detach bursts are small; a full queue means the controller task
/// is gone and events can be dropped.
const EVENT_QUEUE_DEPTH: usize = 64;

/// Async side of the bridge, owned by the controller task
#[derive(Clone)]
pub struct MonitorEvents {
    event_rx: Receiver<MonitorEvent>,
}

impl MonitorEvents {
    /// Receive the next monitor event
    pub async fn recv(&self) -> Result<MonitorEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| ControllerError::Channel(e.to_string()))
    }

    /// Try to receive without waiting
    pub fn try_recv(&self) -> Option<MonitorEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// Blocking side of the bridge, owned by the monitor thread
#[derive(Clone)]
pub struct MonitorPort {
    event_tx: Sender<MonitorEvent>,
}

impl MonitorPort {
    /// Publish an event from the monitor thread (blocking)
    pub fn send_blocking(&self, event: MonitorEvent) -> Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| ControllerError::Channel(e.to_string()))
    }
}

/// Create the bridge between the monitor thread and the controller task
///
/// Returns (`MonitorEvents` for the controller, `MonitorPort` for the
/// monitor thread).
pub fn create_monitor_bridge() -> (MonitorEvents, MonitorPort) {
    let (event_tx, event_rx) = bounded(EVENT_QUEUE_DEPTH);

    (MonitorEvents { event_rx }, MonitorPort { event_tx })
}
