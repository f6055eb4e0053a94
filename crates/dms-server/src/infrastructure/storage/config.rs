//! TOML-based configuration for the display manager service.
//!
//! Reads and writes `DmsConfig` at the platform-appropriate config file:
//! - Linux:    `~/.config/dms/config.toml` (or `$XDG_CONFIG_HOME/dms/config.toml`)
//! - macOS:    `~/Library/Application Support/DisplayManager/config.toml`
//! - Windows:  `%APPDATA%\DisplayManager\config.toml`
//!
//! # Example
//!
//! ```toml
//! [service]
//! log_level = "debug"
//! capture_timeout_ms = 2000
//!
//! [rotation]
//! device_rotation_offset = 90
//! start_locked = false
//!
//! [cutout]
//! waterfall_display = true
//! curved_screen_boundary = [40, 0, 40, 0]
//!
//! [[cutout.builtin_rects]]
//! x = 440
//! y = 0
//! width = 200
//! height = 80
//! ```
//!
//! Every field has a `#[serde(default = "...")]` so a missing file, a missing
//! section or a missing key all fall back to the built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dms_core::Rect;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level service configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DmsConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub cutout: CutoutConfig,
}

/// Topology and display behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How long a display capture may block before failing with a timeout.
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
    /// Delay between renderer subscription attempts.
    #[serde(default = "default_subscribe_retry_ms")]
    pub subscribe_retry_ms: u64,
    /// Upper bound on subscription attempts; `0` retries forever.
    #[serde(default = "default_subscribe_max_attempts")]
    pub subscribe_max_attempts: u32,
    /// Pre-create an unbound display that the first screen binds to.
    #[serde(default)]
    pub placeholder_display: bool,
}

/// Rotation decision engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationConfig {
    /// Subscribe to the gravity sensor at startup.
    #[serde(default = "default_true")]
    pub sensor_enabled: bool,
    /// Minimum spacing between two processed sensor samples.
    #[serde(default = "default_callback_interval_ms")]
    pub callback_interval_ms: u64,
    /// Sensor mounting offset in degrees (0, 90, 180 or 270).
    #[serde(default)]
    pub device_rotation_offset: u32,
    /// Start with the rotation lock engaged.
    #[serde(default)]
    pub start_locked: bool,
}

/// Worker thread settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

/// Cutout and waterfall description of the built-in panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CutoutConfig {
    /// Notch bounding rectangles of the built-in display, natural frame.
    #[serde(default)]
    pub builtin_rects: Vec<Rect>,
    #[serde(default)]
    pub waterfall_display: bool,
    /// Curved strip widths as `[left, top, right, bottom]`.
    #[serde(default)]
    pub curved_screen_boundary: Vec<u32>,
    #[serde(default)]
    pub waterfall_compression_when_horizontal: bool,
    #[serde(default)]
    pub waterfall_compression_size: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_capture_timeout_ms() -> u64 {
    2000
}
fn default_subscribe_retry_ms() -> u64 {
    50
}
fn default_subscribe_max_attempts() -> u32 {
    0
}
fn default_true() -> bool {
    true
}
fn default_callback_interval_ms() -> u64 {
    200
}
fn default_thread_name() -> String {
    "dms-worker".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            capture_timeout_ms: default_capture_timeout_ms(),
            subscribe_retry_ms: default_subscribe_retry_ms(),
            subscribe_max_attempts: default_subscribe_max_attempts(),
            placeholder_display: false,
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            sensor_enabled: default_true(),
            callback_interval_ms: default_callback_interval_ms(),
            device_rotation_offset: 0,
            start_locked: false,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
        }
    }
}

impl ServiceConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn subscribe_retry(&self) -> Duration {
        Duration::from_millis(self.subscribe_retry_ms)
    }
}

impl RotationConfig {
    pub fn callback_interval(&self) -> Duration {
        Duration::from_millis(self.callback_interval_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `DmsConfig` from the platform config file, returning the defaults if
/// the file does not exist yet.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<DmsConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `DmsConfig` from an explicit path, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<DmsConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DmsConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &DmsConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `dms` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("DisplayManager"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("dms"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("DisplayManager")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
