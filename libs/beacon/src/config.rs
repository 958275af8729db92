//! Beacon configuration
//!
//! Per-device values injected into the encoder and signer at construction.
//! Persisted as JSON under the platform data directory unless a path is
//! given explicitly.

use crate::advertisement::{DEVICE_TYPE_TRACKER, FIRMWARE_MAJOR, SERVICE_UUID, VENDOR_TAG};
use crate::identity::DeviceIdentity;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current configuration schema version
pub const CONFIG_VERSION: u32 = 1;

/// File name of the configuration inside the data directory
pub const CONFIG_FILE_NAME: &str = "beacon.json";

/// File name of the key next to the configuration
pub const KEY_FILE_NAME: &str = "beacon.key";

/// Default low-battery threshold in millivolts
pub const DEFAULT_LOW_BATTERY_MV: u16 = 2_400;

/// Configuration files larger than this are rejected
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Malformed JSON
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Semantically invalid value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// No platform data directory could be determined
    #[error("Cannot determine configuration directory")]
    NoConfigDir,
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Beacon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Configuration schema version for future migrations
    pub version: u32,

    /// Device short identifier
    pub identity: DeviceIdentity,

    /// Device type byte advertised in every payload
    #[serde(default = "default_device_type")]
    pub device_type: u8,

    /// Firmware major version advertised in every payload
    #[serde(default = "default_firmware_major")]
    pub firmware_major: u8,

    /// Vendor tag for the manufacturer data structure
    #[serde(default = "default_vendor_tag")]
    pub vendor_tag: u16,

    /// 128-bit service UUID, hex encoded
    #[serde(default = "default_service_uuid", with = "uuid_hex")]
    pub service_uuid: [u8; 16],

    /// Path of the hex-encoded signing key
    pub key_file: PathBuf,

    /// Battery voltage below which the low-battery flag is advertised
    #[serde(default = "default_low_battery_mv")]
    pub low_battery_threshold_mv: u16,
}

fn default_device_type() -> u8 {
    DEVICE_TYPE_TRACKER
}

fn default_firmware_major() -> u8 {
    FIRMWARE_MAJOR
}

fn default_vendor_tag() -> u16 {
    VENDOR_TAG
}

fn default_service_uuid() -> [u8; 16] {
    SERVICE_UUID
}

fn default_low_battery_mv() -> u16 {
    DEFAULT_LOW_BATTERY_MV
}

impl BeaconConfig {
    /// Configuration with the firmware defaults for `identity`
    pub fn new(identity: DeviceIdentity, key_file: impl Into<PathBuf>) -> Self {
        Self {
            version: CONFIG_VERSION,
            identity,
            device_type: DEVICE_TYPE_TRACKER,
            firmware_major: FIRMWARE_MAJOR,
            vendor_tag: VENDOR_TAG,
            service_uuid: SERVICE_UUID,
            key_file: key_file.into(),
            low_battery_threshold_mv: DEFAULT_LOW_BATTERY_MV,
        }
    }

    /// Platform data directory for beacon files
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("org", "tracker", "beacon")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::default_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load and validate a configuration file
    ///
    /// A relative `key_file` is resolved against the configuration's directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let io_err = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let size = fs::metadata(path).map_err(io_err)?.len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "{} is {size} bytes, limit {MAX_CONFIG_FILE_SIZE}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path).map_err(io_err)?;
        let mut config: Self = serde_json::from_str(&contents)?;
        config.validate()?;

        if config.key_file.is_relative()
            && let Some(dir) = path.parent()
        {
            config.key_file = dir.join(&config.key_file);
        }

        log::debug!(
            "Loaded configuration for {} from {}",
            config.identity,
            path.display()
        );
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let io_err = |source: io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)?;
        log::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        if self.key_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("key_file is empty".to_string()));
        }
        if self.low_battery_threshold_mv == 0 {
            return Err(ConfigError::Invalid(
                "low_battery_threshold_mv must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

mod uuid_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(uuid: &[u8; 16], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(uuid))
    }

    /// Accepts plain hex or the dashed canonical form
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 16], D::Error> {
        let s = String::deserialize(deserializer)?;
        let cleaned: String = s.chars().filter(|c| *c != '-').collect();
        let bytes = hex::decode(&cleaned).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| serde::de::Error::custom(format!("UUID must be 16 bytes, got {}", b.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> BeaconConfig {
        BeaconConfig::new(
            DeviceIdentity::from_bytes([1, 2, 3, 4, 5, 6]),
            KEY_FILE_NAME,
        )
    }

    #[test]
    fn test_defaults_match_firmware() {
        let config = sample();
        assert_eq!(config.device_type, 0x01);
        assert_eq!(config.firmware_major, 0x01);
        assert_eq!(config.vendor_tag, 0x1234);
        assert_eq!(config.service_uuid, SERVICE_UUID);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_resolves_key_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        sample().save_to_file(&path).unwrap();

        let loaded = BeaconConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.identity, sample().identity);
        assert_eq!(loaded.key_file, dir.path().join("nested").join(KEY_FILE_NAME));
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"version": 1, "identity": "01:02:03:04:05:06", "key_file": "/keys/beacon.key"}"#,
        )
        .unwrap();

        let config = BeaconConfig::load_from_file(&path).unwrap();
        assert_eq!(config.vendor_tag, VENDOR_TAG);
        assert_eq!(config.low_battery_threshold_mv, DEFAULT_LOW_BATTERY_MV);
        assert_eq!(config.key_file, PathBuf::from("/keys/beacon.key"));
    }

    #[test]
    fn test_dashed_service_uuid() {
        let json = r#"{"version": 1, "identity": "010203040506", "key_file": "k",
            "service_uuid": "0000FEED-0000-1000-8000-00805F9B34FB"}"#;
        let config: BeaconConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.service_uuid, SERVICE_UUID);

        let short = r#"{"version": 1, "identity": "010203040506", "key_file": "k",
            "service_uuid": "feed"}"#;
        assert!(serde_json::from_str::<BeaconConfig>(short).is_err());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut config = sample();
        config.version = 99;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_identity() {
        let json = r#"{"version": 1, "identity": "0102", "key_file": "k"}"#;
        assert!(serde_json::from_str::<BeaconConfig>(json).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = BeaconConfig::load_from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
