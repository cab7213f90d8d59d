//! USB camera monitor
//!
//! Watches for video-class devices on a dedicated thread, relays attach and
//! detach as controller events, and answers permission requests by opening
//! the device. A successful open parks the rusb handle in the shared
//! control-block registry and reports `Connected`; an access denial (udev
//! permissions, the desktop analog of the user dismissing the permission
//! dialog) reports `Cancelled`.
//!
//! The thread owns the libusb context and runs the `handle_events` loop;
//! commands come in over an async channel and events go out through the
//! controller's monitor bridge, so hot-plug callbacks never touch controller
//! state directly.

use controller::{
    ControllerError, DeviceHandle, DeviceId, DeviceMonitor, Epoch, MonitorEvent, MonitorPort,
    Result,
};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// USB Video Class interface class code
const CC_VIDEO: u8 = 0x0e;

/// Commands from the controller task to the monitor thread
#[derive(Debug)]
pub enum MonitorCommand {
    /// Enumerate present devices and start hot-plug watching
    Register,
    /// List candidate devices (fresh scan)
    ListDevices {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<UsbDeviceInfo>>,
    },
    /// Ask for access to a camera; answered via the event bridge
    RequestPermission {
        /// Generation to echo in the Connected/Cancelled event
        epoch: Epoch,
    },
    /// Stop the monitor thread
    Shutdown,
}

/// Descriptor summary for a candidate camera
#[derive(Debug, Clone)]
pub struct UsbDeviceInfo {
    /// Monitor-assigned identifier
    pub id: DeviceId,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Bus number
    pub bus: u8,
    /// Address on the bus
    pub address: u8,
    /// Product string, if readable without opening
    pub product: Option<String>,
}

/// An opened connection parked for the camera session to claim
pub struct OpenedCamera {
    /// The device the connection belongs to
    pub device: Device<Context>,
    /// The opened rusb handle
    pub handle: rusb::DeviceHandle<Context>,
}

/// Registry of granted connections, shared between monitor and session
///
/// The monitor inserts on grant; the session takes ownership on `open`.
/// A detach invalidates the entry, so a late `open` fails cleanly.
pub type ControlBlocks = Arc<Mutex<HashMap<u32, OpenedCamera>>>;

/// Create an empty control-block registry
pub fn control_blocks() -> ControlBlocks {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Controller-side handle to the monitor thread
///
/// This is the `DeviceMonitor` implementation handed to the controller; it
/// only forwards commands, all USB work happens on the worker thread.
pub struct UsbMonitor {
    cmd_tx: async_channel::Sender<MonitorCommand>,
}

impl UsbMonitor {
    fn send(&self, cmd: MonitorCommand) -> Result<()> {
        self.cmd_tx
            .try_send(cmd)
            .map_err(|e| ControllerError::Channel(e.to_string()))
    }

    /// Fresh device scan, for `--list-devices`
    pub async fn list_devices(&self) -> Result<Vec<UsbDeviceInfo>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(MonitorCommand::ListDevices { response: tx })?;
        rx.await
            .map_err(|e| ControllerError::Channel(e.to_string()))
    }

    /// Ask the worker thread to exit
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(MonitorCommand::Shutdown);
    }
}

impl DeviceMonitor for UsbMonitor {
    fn register(&mut self) -> Result<()> {
        self.send(MonitorCommand::Register)
    }

    fn unregister(&mut self) {
        self.shutdown();
    }

    fn request_permission(&mut self, epoch: Epoch) -> Result<()> {
        self.send(MonitorCommand::RequestPermission { epoch })
    }
}

/// Bus/address notifications relayed out of the hot-plug callback
///
/// The callback runs inside libusb's event handling; actual registry work
/// happens in the worker loop.
enum HotplugMessage {
    Arrived { bus: u8, address: u8 },
    Left { bus: u8, address: u8 },
}

struct HotplugRelay {
    tx: mpsc::Sender<HotplugMessage>,
}

impl<T: UsbContext> Hotplug<T> for HotplugRelay {
    fn device_arrived(&mut self, device: Device<T>) {
        debug!(
            bus = device.bus_number(),
            address = device.address(),
            "hot-plug: device arrived"
        );
        let _ = self.tx.send(HotplugMessage::Arrived {
            bus: device.bus_number(),
            address: device.address(),
        });
    }

    fn device_left(&mut self, device: Device<T>) {
        debug!(
            bus = device.bus_number(),
            address = device.address(),
            "hot-plug: device left"
        );
        let _ = self.tx.send(HotplugMessage::Left {
            bus: device.bus_number(),
            address: device.address(),
        });
    }
}

struct TrackedDevice {
    info: UsbDeviceInfo,
    device: Device<Context>,
}

/// Monitor worker running on the `usb-monitor` thread
pub struct MonitorWorker {
    context: Context,
    /// Registry of candidate cameras: (bus, address) -> device
    devices: HashMap<(u8, u8), TrackedDevice>,
    /// Opened connections: handle id -> (bus, address)
    opened: HashMap<u32, (u8, u8)>,
    next_device_id: u32,
    next_handle_id: u32,
    /// Most recently attached candidate, preferred for permission grants
    last_attached: Option<(u8, u8)>,
    port: MonitorPort,
    cmd_rx: async_channel::Receiver<MonitorCommand>,
    hotplug_rx: mpsc::Receiver<HotplugMessage>,
    hotplug_tx: mpsc::Sender<HotplugMessage>,
    _hotplug_registration: Option<Registration<Context>>,
    blocks: ControlBlocks,
    filters: Vec<String>,
}

impl MonitorWorker {
    fn new(
        port: MonitorPort,
        cmd_rx: async_channel::Receiver<MonitorCommand>,
        blocks: ControlBlocks,
        filters: Vec<String>,
    ) -> std::result::Result<Self, rusb::Error> {
        let context = Context::new()?;
        let (hotplug_tx, hotplug_rx) = mpsc::channel();

        Ok(Self {
            context,
            devices: HashMap::new(),
            opened: HashMap::new(),
            next_device_id: 1,
            next_handle_id: 1,
            last_attached: None,
            port,
            cmd_rx,
            hotplug_rx,
            hotplug_tx,
            _hotplug_registration: None,
            blocks,
            filters,
        })
    }

    /// Worker loop: drain commands, pump libusb events, apply hot-plug
    /// notifications, until `Shutdown`
    fn run(mut self) {
        info!("usb monitor thread started");

        loop {
            match self.cmd_rx.try_recv() {
                Ok(MonitorCommand::Shutdown) => {
                    info!("usb monitor shutting down");
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(async_channel::TryRecvError::Empty) => {}
                Err(async_channel::TryRecvError::Closed) => break,
            }

            let timeout = Duration::from_millis(100);
            match self.context.handle_events(Some(timeout)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("usb event handling interrupted");
                }
                Err(e) => {
                    warn!("error handling usb events: {e}");
                    std::thread::sleep(Duration::from_millis(100));
                }
            }

            self.drain_hotplug();
        }

        info!("usb monitor thread stopped");
    }

    fn handle_command(&mut self, cmd: MonitorCommand) {
        match cmd {
            MonitorCommand::Register => {
                if let Err(e) = self.enumerate_devices() {
                    warn!("device enumeration failed: {e}");
                }
                if let Err(e) = self.register_hotplug() {
                    warn!("hot-plug registration failed: {e}");
                }
                info!("monitor registered, {} candidate device(s)", self.devices.len());
            }
            MonitorCommand::ListDevices { response } => {
                if let Err(e) = self.enumerate_devices() {
                    warn!("device enumeration failed: {e}");
                }
                let devices = self.devices.values().map(|d| d.info.clone()).collect();
                let _ = response.send(devices);
            }
            MonitorCommand::RequestPermission { epoch } => self.grant_or_cancel(epoch),
            MonitorCommand::Shutdown => unreachable!(),
        }
    }

    /// Scan the bus and add any candidate cameras not yet tracked
    fn enumerate_devices(&mut self) -> std::result::Result<(), rusb::Error> {
        for device in self.context.devices()?.iter() {
            let key = (device.bus_number(), device.address());
            if self.devices.contains_key(&key) {
                continue;
            }
            if let Some(tracked) = self.track_device(device) {
                self.emit(MonitorEvent::Attached {
                    device: tracked.info.id,
                });
                self.last_attached = Some(key);
                self.devices.insert(key, tracked);
            }
        }
        debug!("tracking {} candidate device(s)", self.devices.len());
        Ok(())
    }

    fn register_hotplug(&mut self) -> std::result::Result<(), rusb::Error> {
        if self._hotplug_registration.is_some() {
            return Ok(());
        }
        let relay = HotplugRelay {
            tx: self.hotplug_tx.clone(),
        };
        let registration = HotplugBuilder::new()
            .enumerate(false) // already enumerated
            .register(&self.context, Box::new(relay))?;
        self._hotplug_registration = Some(registration);
        debug!("hot-plug callbacks registered");
        Ok(())
    }

    fn drain_hotplug(&mut self) {
        while let Ok(msg) = self.hotplug_rx.try_recv() {
            match msg {
                HotplugMessage::Arrived { bus, address } => self.on_arrived(bus, address),
                HotplugMessage::Left { bus, address } => self.on_left(bus, address),
            }
        }
    }

    fn on_arrived(&mut self, bus: u8, address: u8) {
        let key = (bus, address);
        if self.devices.contains_key(&key) {
            return;
        }
        let Ok(devices) = self.context.devices() else {
            return;
        };
        for device in devices.iter() {
            if (device.bus_number(), device.address()) != key {
                continue;
            }
            if let Some(tracked) = self.track_device(device) {
                info!(
                    bus,
                    address,
                    vid = tracked.info.vendor_id,
                    pid = tracked.info.product_id,
                    "camera attached"
                );
                self.emit(MonitorEvent::Attached {
                    device: tracked.info.id,
                });
                self.last_attached = Some(key);
                self.devices.insert(key, tracked);
            }
            return;
        }
    }

    fn on_left(&mut self, bus: u8, address: u8) {
        let key = (bus, address);
        let Some(tracked) = self.devices.remove(&key) else {
            return;
        };
        let device_id = tracked.info.id;
        info!(bus, address, device = device_id.0, "camera detached");

        // Invalidate any open connection on this device before announcing
        // the detach, so the controller sees disconnect first.
        let handles: Vec<u32> = self
            .opened
            .iter()
            .filter(|(_, k)| **k == key)
            .map(|(h, _)| *h)
            .collect();
        for handle in handles {
            self.opened.remove(&handle);
            self.blocks.lock().unwrap().remove(&handle);
            self.emit(MonitorEvent::Disconnected {
                device: device_id,
                handle: DeviceHandle(handle),
            });
        }

        if self.last_attached == Some(key) {
            self.last_attached = None;
        }
        self.emit(MonitorEvent::Detached { device: device_id });
    }

    /// Build a tracked entry if the device passes the camera/filter check
    fn track_device(&mut self, device: Device<Context>) -> Option<TrackedDevice> {
        let desc = device.device_descriptor().ok()?;
        if !self.filters.is_empty() {
            if !check_filter(desc.vendor_id(), desc.product_id(), &self.filters) {
                return None;
            }
        } else if !is_video_device(&device) {
            return None;
        }

        let id = DeviceId(self.next_device_id);
        self.next_device_id += 1;

        let product = device
            .open()
            .ok()
            .and_then(|h| h.read_product_string_ascii(&desc).ok());

        Some(TrackedDevice {
            info: UsbDeviceInfo {
                id,
                vendor_id: desc.vendor_id(),
                product_id: desc.product_id(),
                bus: device.bus_number(),
                address: device.address(),
                product,
            },
            device,
        })
    }

    /// Answer a permission request by opening a device
    ///
    /// Access denial maps to `Cancelled`, the same outcome as the user
    /// dismissing a permission dialog.
    fn grant_or_cancel(&mut self, epoch: Epoch) {
        for handle in drain_superseded(&self.blocks, &mut self.opened) {
            debug!(handle, "dropping superseded grant");
        }

        let key = match self.pick_device() {
            Some(key) => key,
            None => {
                info!("permission request with no candidate camera present");
                self.emit(MonitorEvent::Cancelled { epoch });
                return;
            }
        };
        // pick_device only returns tracked keys
        let (device_id, device) = {
            let tracked = &self.devices[&key];
            (tracked.info.id, tracked.device.clone())
        };

        match device.open() {
            Ok(handle) => {
                let handle_id = self.next_handle_id;
                self.next_handle_id += 1;

                self.blocks.lock().unwrap().insert(
                    handle_id,
                    OpenedCamera { device, handle },
                );
                self.opened.insert(handle_id, key);

                info!(
                    device = device_id.0,
                    handle = handle_id,
                    "camera access granted"
                );
                self.emit(MonitorEvent::Connected {
                    device: device_id,
                    handle: DeviceHandle(handle_id),
                    epoch,
                });
            }
            Err(rusb::Error::Access) => {
                info!(device = device_id.0, "camera access denied");
                self.emit(MonitorEvent::Cancelled { epoch });
            }
            Err(e) => {
                warn!(device = device_id.0, "camera open failed: {e}");
                self.emit(MonitorEvent::Cancelled { epoch });
            }
        }
    }

    /// Prefer the most recently attached candidate, else any tracked one
    fn pick_device(&self) -> Option<(u8, u8)> {
        self.last_attached
            .filter(|key| self.devices.contains_key(key))
            .or_else(|| self.devices.keys().next().copied())
    }

    fn emit(&self, event: MonitorEvent) {
        if let Err(e) = self.port.send_blocking(event) {
            debug!("controller gone, dropping monitor event: {e}");
        }
    }
}

/// Drop grants still parked in the registry, returning their handle ids
///
/// The controller holds at most one granted handle and claims it from the
/// registry before it can request another, so anything unclaimed by the
/// time of the next permission request was superseded. The open rusb
/// handles drop here; claimed connections are untouched.
fn drain_superseded<V>(
    blocks: &Mutex<HashMap<u32, V>>,
    opened: &mut HashMap<u32, (u8, u8)>,
) -> Vec<u32> {
    let ids: Vec<u32> = blocks.lock().unwrap().drain().map(|(h, _)| h).collect();
    for handle in &ids {
        opened.remove(handle);
    }
    ids
}

/// Whether a device is a UVC camera (video class at device or interface level)
fn is_video_device(device: &Device<Context>) -> bool {
    if let Ok(desc) = device.device_descriptor()
        && desc.class_code() == CC_VIDEO
    {
        return true;
    }
    let Ok(config) = device.config_descriptor(0) else {
        return false;
    };
    config
        .interfaces()
        .flat_map(|i| i.descriptors())
        .any(|d| d.class_code() == CC_VIDEO)
}

/// Check if a VID/PID pair is allowed by the filters
///
/// Filter format: "0xVID:0xPID", with "*" as a wildcard on either side.
fn check_filter(vid: u16, pid: u16, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }

    for filter in filters {
        let parts: Vec<&str> = filter.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let vid_match = if parts[0] == "*" {
            true
        } else {
            u16::from_str_radix(parts[0].trim_start_matches("0x"), 16)
                .map(|v| v == vid)
                .unwrap_or(false)
        };
        if !vid_match {
            continue;
        }

        let pid_match = if parts[1] == "*" {
            true
        } else {
            u16::from_str_radix(parts[1].trim_start_matches("0x"), 16)
                .map(|p| p == pid)
                .unwrap_or(false)
        };
        if pid_match {
            return true;
        }
    }

    false
}

/// Spawn the monitor worker thread
///
/// Returns the controller-side `UsbMonitor` and the thread's join handle.
/// The thread exits on `Shutdown` (sent by `unregister`).
pub fn spawn_monitor_worker(
    port: MonitorPort,
    filters: Vec<String>,
    blocks: ControlBlocks,
) -> (UsbMonitor, std::thread::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = async_channel::bounded(16);

    let handle = std::thread::Builder::new()
        .name("usb-monitor".to_string())
        .spawn(move || match MonitorWorker::new(port, cmd_rx, blocks, filters) {
            Ok(worker) => worker.run(),
            Err(e) => error!("failed to start usb monitor: {e}"),
        })
        .expect("failed to spawn usb monitor thread");

    (UsbMonitor { cmd_tx }, handle)
}
