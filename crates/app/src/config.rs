//! Application configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Preview geometry
    #[serde(default)]
    pub preview: PreviewSettings,
    /// Still capture settings
    #[serde(default)]
    pub capture: CaptureSettings,
    /// USB device selection
    #[serde(default)]
    pub usb: UsbSettings,
    /// Default log level (overridden by --log-level and RUST_LOG)
    #[serde(default = "AppConfig::default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

impl PreviewSettings {
    /// Width-over-height ratio the preview surface should keep
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Directory captured stills are written to
    ///
    /// Still capture is refused while this directory is missing and cannot
    /// be created, or is not writable.
    #[serde(default = "CaptureSettings::default_directory")]
    pub directory: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            directory: CaptureSettings::default_directory(),
        }
    }
}

impl CaptureSettings {
    fn default_directory() -> PathBuf {
        if let Some(pictures) = dirs::picture_dir() {
            pictures.join("uvc-view")
        } else if let Some(data) = dirs::data_local_dir() {
            data.join("uvc-view").join("captures")
        } else {
            PathBuf::from("./captures")
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsbSettings {
    /// VID:PID patterns ("0x046d:0x0825", "0x046d:*"); empty means any
    /// video-class device
    #[serde(default)]
    pub filters: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preview: PreviewSettings::default(),
            capture: CaptureSettings::default(),
            usb: UsbSettings::default(),
            log_level: Self::default_log_level(),
        }
    }
}

impl AppConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("uvc-view").join("config.toml")
        } else {
            PathBuf::from("uvc-view.toml")
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))
    }

    /// Load from the default path, falling back to built-in defaults
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring invalid config at {}: {e:#}", path.display());
                }
            }
        }
        Self::default()
    }

    /// Save configuration to a path, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
