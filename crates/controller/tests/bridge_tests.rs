//! Monitor bridge integration tests
//!
//! The bridge carries hardware callbacks from the monitor-owned thread to
//! the controller task. These tests check cross-thread delivery, ordering,
//! and shutdown behavior.

use controller::{DeviceHandle, DeviceId, Epoch, MonitorEvent, create_monitor_bridge};
use std::thread;

#[tokio::test]
async fn test_events_arrive_in_delivery_order() {
    let (events, port) = create_monitor_bridge();

    let producer = thread::spawn(move || {
        let sequence = [
            MonitorEvent::Attached { device: DeviceId(1) },
            MonitorEvent::Connected {
                device: DeviceId(1),
                handle: DeviceHandle(1),
                epoch: Epoch(1),
            },
            MonitorEvent::Disconnected {
                device: DeviceId(1),
                handle: DeviceHandle(1),
            },
            MonitorEvent::Detached { device: DeviceId(1) },
        ];
        for ev in sequence {
            port.send_blocking(ev).unwrap();
        }
    });

    assert!(matches!(
        events.recv().await.unwrap(),
        MonitorEvent::Attached { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MonitorEvent::Connected { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MonitorEvent::Disconnected { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MonitorEvent::Detached { .. }
    ));

    producer.join().unwrap();
}

#[tokio::test]
async fn test_multiple_producer_clones() {
    let (events, port) = create_monitor_bridge();

    let port_a = port.clone();
    let a = thread::spawn(move || {
        port_a
            .send_blocking(MonitorEvent::Attached { device: DeviceId(1) })
            .unwrap();
    });
    let b = thread::spawn(move || {
        port.send_blocking(MonitorEvent::Attached { device: DeviceId(2) })
            .unwrap();
    });

    let mut seen = Vec::new();
    for _ in 0..2 {
        if let MonitorEvent::Attached { device } = events.recv().await.unwrap() {
            seen.push(device.0);
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2]);

    a.join().unwrap();
    b.join().unwrap();
}

#[tokio::test]
async fn test_try_recv_on_empty_bridge() {
    let (events, _port) = create_monitor_bridge();
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn test_recv_errors_once_monitor_is_gone() {
    let (events, port) = create_monitor_bridge();
    port.send_blocking(MonitorEvent::Detached { device: DeviceId(5) })
        .unwrap();
    drop(port);

    // Buffered event still delivered, then the closed channel surfaces
    assert!(events.recv().await.is_ok());
    assert!(events.recv().await.is_err());
}
