//! uvc-view
//!
//! Single-screen viewer for UVC-class USB cameras: watch for a camera,
//! ask for access, preview its stream, and capture stills. The connection
//! state machine lives in the `controller` crate; this binary wires it to
//! a rusb-backed device monitor, a UVC session, and a terminal UI.

mod config;
mod monitor;
mod session;
mod storage;
mod surface;
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use controller::{ConnectionController, create_monitor_bridge, setup_logging};
use tracing::{error, info};

use config::AppConfig;
use monitor::UsbMonitor;
use session::UvcSession;
use storage::CaptureDir;
use surface::TerminalSurface;

#[derive(Parser, Debug)]
#[command(name = "uvc-view")]
#[command(author, version, about = "Preview a UVC camera and capture stills")]
#[command(long_about = "
A single-screen viewer for UVC-class USB cameras. Plug a camera in, toggle
the preview with the space bar, capture stills with 'c'.

EXAMPLES:
    # Run with default config
    uvc-view

    # Run with custom config
    uvc-view --config /path/to/config.toml

    # List candidate cameras without starting the UI
    uvc-view --list-devices

    # Run with debug logging
    uvc-view --log-level debug

CONFIGURATION:
    The default configuration file lives at
    ~/.config/uvc-view/config.toml; --save-config writes the defaults there.
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// List candidate cameras and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = AppConfig::default();
        let path = AppConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        AppConfig::load(path).context("Failed to load configuration")?
    } else {
        AppConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("uvc-view v{}", env!("CARGO_PKG_VERSION"));

    let blocks = monitor::control_blocks();
    let (monitor_events, port) = create_monitor_bridge();
    let (usb_monitor, worker_handle) =
        monitor::spawn_monitor_worker(port, config.usb.filters.clone(), blocks.clone());

    if args.list_devices {
        let result = list_devices_mode(&usb_monitor).await;
        usb_monitor.shutdown();
        if worker_handle.join().is_err() {
            error!("usb monitor thread panicked");
        }
        return result;
    }

    let session = UvcSession::new(blocks);
    let (preview_surface, surface_view) = TerminalSurface::new();
    let storage = CaptureDir::new(config.capture.directory.clone());
    info!("capture directory: {}", storage.path().display());

    let (mut controller, status_rx, notice_rx) =
        ConnectionController::new(usb_monitor, session, preview_surface, storage);
    controller.set_aspect_ratio(config.preview.aspect_ratio());

    let result = tui::run(
        controller,
        monitor_events,
        status_rx,
        notice_rx,
        surface_view,
    )
    .await;

    // The monitor unregistered during controller teardown; wait for the
    // thread to wind down.
    if worker_handle.join().is_err() {
        error!("usb monitor thread panicked");
    }

    result
}

/// Print candidate cameras and exit
async fn list_devices_mode(usb_monitor: &UsbMonitor) -> Result<()> {
    let devices = usb_monitor
        .list_devices()
        .await
        .context("Failed to list devices")?;

    if devices.is_empty() {
        println!("No candidate cameras found.");
        return Ok(());
    }

    println!("{:<4} {:<12} {:<10} NAME", "ID", "VID:PID", "BUS:ADDR");
    for dev in devices {
        println!(
            "{:<4} {:04x}:{:04x}    {:<3}:{:<6} {}",
            dev.id.0,
            dev.vendor_id,
            dev.product_id,
            dev.bus,
            dev.address,
            dev.product.as_deref().unwrap_or("(unknown)")
        );
    }
    Ok(())
}
