//! On-disk configuration for a capture session, loaded once at startup and
//! handed to the supervisor as a [`SessionConfig`].

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::session::{CaptureFormat, SessionConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to find config directory")]
    NoConfigDir,

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// RF sample packing format, as named in `config.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigFormat {
    #[default]
    Signed16Bit,
    Unsigned10Bit,
    Unsigned10Bit4to1Decimation,
}

impl From<ConfigFormat> for CaptureFormat {
    fn from(f: ConfigFormat) -> Self {
        match f {
            ConfigFormat::Signed16Bit => CaptureFormat::Signed16Bit,
            ConfigFormat::Unsigned10Bit => CaptureFormat::Unsigned10Bit,
            ConfigFormat::Unsigned10Bit4to1Decimation => CaptureFormat::Unsigned10Bit4to1Decimation,
        }
    }
}

fn default_device_path() -> String {
    "sim://0".into()
}

fn default_usb_transfer_queue_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_disk_buffer_queue_bytes() -> usize {
    256 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".into()
}

/// Persisted capture configuration. Everything the supervisor needs to
/// start a session except the RF output path, which is supplied per
/// invocation rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub format: ConfigFormat,

    #[serde(default = "default_device_path")]
    pub device_path: String,

    pub test_mode: bool,

    pub use_small_usb_transfers: bool,

    #[serde(default = "default_usb_transfer_queue_bytes")]
    pub usb_transfer_queue_bytes: usize,

    #[serde(default = "default_disk_buffer_queue_bytes")]
    pub disk_buffer_queue_bytes: usize,

    /// Windows overlapped I/O / pipelined async writer instead of the
    /// synchronous one-buffer-at-a-time writer.
    pub use_async_file_io: bool,

    /// Re-check the per-frame sequence number against the previous frame's
    /// and fail the capture on a mismatch. Off by default: a dropped USB
    /// transfer causes exactly one expected gap, not a corrupt capture.
    pub sequence_number_check: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: ConfigFormat::default(),
            device_path: default_device_path(),
            test_mode: false,
            use_small_usb_transfers: false,
            usb_transfer_queue_bytes: default_usb_transfer_queue_bytes(),
            disk_buffer_queue_bytes: default_disk_buffer_queue_bytes(),
            use_async_file_io: true,
            sequence_number_check: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("com", "rfcapture", "rfcapture")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("com", "rfcapture", "rfcapture")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from file, or create and persist a default if none
    /// exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.usb_transfer_queue_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "usb_transfer_queue_bytes must be positive".into(),
            ));
        }

        if self.disk_buffer_queue_bytes < self.usb_transfer_queue_bytes {
            return Err(ConfigError::ValidationError(
                "disk_buffer_queue_bytes must be at least usb_transfer_queue_bytes".into(),
            ));
        }

        if self.device_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "device_path must not be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;

        info!("config saved to: {}", path.display());
        Ok(())
    }

    /// Build the one-shot [`SessionConfig`] the supervisor needs, given
    /// the RF output path chosen for this particular run.
    pub fn to_session_config(&self, rf_path: PathBuf) -> SessionConfig {
        SessionConfig {
            rf_path,
            format: self.format.into(),
            device_path: self.device_path.clone(),
            test_mode: self.test_mode,
            use_small_usb_transfers: self.use_small_usb_transfers,
            use_async_file_io: self.use_async_file_io,
            usb_transfer_queue_bytes: self.usb_transfer_queue_bytes,
            disk_buffer_queue_bytes: self.disk_buffer_queue_bytes,
            sequence_number_check: self.sequence_number_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_disk_buffer_smaller_than_transfer_queue() {
        let mut config = Config::default();
        config.disk_buffer_queue_bytes = config.usb_transfer_queue_bytes - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_device_path() {
        let mut config = Config::default();
        config.device_path = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.format = ConfigFormat::Unsigned10Bit;
        config.sequence_number_check = true;
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.format, ConfigFormat::Unsigned10Bit);
        assert!(parsed.sequence_number_check);
    }

    #[test]
    fn session_config_derives_audio_paths_from_rf_path() {
        let config = Config::default();
        let session = config.to_session_config(PathBuf::from("/tmp/capture.rf"));
        assert_eq!(session.audio16_path(), PathBuf::from("/tmp/capture.audio.wav"));
        assert_eq!(session.audio24_path(), PathBuf::from("/tmp/capture.audio24.wav"));
    }
}
