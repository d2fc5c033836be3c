//! TOML-based configuration for the steno device.
//!
//! Reads and writes `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\StenoLink\config.toml`
//! - Linux:    `~/.config/stenolink/config.toml`
//! - macOS:    `~/Library/Application Support/StenoLink/config.toml`
//!
//! Every field has a default, so a missing file, a missing section, or a
//! missing key all fall back to the values the machine is known to work
//! with:
//!
//! ```toml
//! [general]
//! log_level = "info"
//! flush_on_start = true
//!
//! [device]
//! transfer_timeout_ms = 2000
//! transfer_wait_ms = 100
//! poll_delay_ms = 100
//! flush_check_interval_ms = 1000
//! read_byte_count = 512
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use steno_core::protocol::DEFAULT_READ_BYTE_COUNT;
use thiserror::Error;

use crate::application::protocol_engine::EngineConfig;
use crate::application::steno_device::DeviceConfig;
use crate::application::stroke_poller::PollerConfig;
use crate::application::transport::TransferTiming;

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

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub device: DeviceSettings,
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneralConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Discard strokes buffered before the program started.
    #[serde(default = "default_true")]
    pub flush_on_start: bool,
}

/// Timing and sizing of the USB session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSettings {
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
    #[serde(default = "default_transfer_wait_ms")]
    pub transfer_wait_ms: u64,
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    #[serde(default = "default_flush_check_interval_ms")]
    pub flush_check_interval_ms: u64,
    /// Bytes requested by each read command.
    #[serde(default = "default_read_byte_count")]
    pub read_byte_count: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_transfer_timeout_ms() -> u64 {
    2000
}
fn default_transfer_wait_ms() -> u64 {
    100
}
fn default_poll_delay_ms() -> u64 {
    100
}
fn default_flush_check_interval_ms() -> u64 {
    1000
}
fn default_read_byte_count() -> u32 {
    DEFAULT_READ_BYTE_COUNT
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            flush_on_start: default_true(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            transfer_timeout_ms: default_transfer_timeout_ms(),
            transfer_wait_ms: default_transfer_wait_ms(),
            poll_delay_ms: default_poll_delay_ms(),
            flush_check_interval_ms: default_flush_check_interval_ms(),
            read_byte_count: default_read_byte_count(),
        }
    }
}

impl DeviceSettings {
    /// Converts the on-disk milliseconds into the runtime configuration.
    pub fn to_device_config(&self) -> DeviceConfig {
        DeviceConfig {
            engine: EngineConfig {
                timing: TransferTiming {
                    transfer_timeout: Duration::from_millis(self.transfer_timeout_ms),
                    wait: Duration::from_millis(self.transfer_wait_ms),
                },
                read_byte_count: self.read_byte_count,
            },
            poller: PollerConfig {
                poll_delay: Duration::from_millis(self.poll_delay_ms),
                flush_check_interval: Duration::from_millis(self.flush_check_interval_ms),
            },
        }
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

/// Loads `AppConfig` from the platform config file, returning defaults if the
/// file does not exist yet.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning defaults if the file is absent.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
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

/// Resolves the platform config directory including the `StenoLink` part.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("StenoLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("stenolink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("StenoLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("stenolink_test_{}_{name}", std::process::id()))
            .join("config.toml")
    }

    #[test]
    fn test_default_device_settings_match_machine_timing() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.device.transfer_timeout_ms, 2000);
        assert_eq!(cfg.device.transfer_wait_ms, 100);
        assert_eq!(cfg.device.poll_delay_ms, 100);
        assert_eq!(cfg.device.flush_check_interval_ms, 1000);
        assert_eq!(cfg.device.read_byte_count, 512);
    }

    #[test]
    fn test_general_defaults() {
        let cfg = GeneralConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.flush_on_start);
    }

    #[test]
    fn test_default_settings_convert_to_default_runtime_config() {
        assert_eq!(
            DeviceSettings::default().to_device_config(),
            DeviceConfig::default()
        );
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_device_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[device]
poll_delay_ms = 250
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.device.poll_delay_ms, 250);
        assert_eq!(cfg.device.transfer_wait_ms, 100);
        assert_eq!(
            cfg.device.to_device_config().poller.poll_delay,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip() {
        // Arrange
        let path = temp_path("round_trip");
        let mut cfg = AppConfig::default();
        cfg.general.log_level = "debug".to_string();
        cfg.general.flush_on_start = false;
        cfg.device.read_byte_count = 1024;

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_load_config_from_malformed_file_is_parse_error() {
        // Arrange
        let path = temp_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[device\npoll_delay_ms = ").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
    }
}
