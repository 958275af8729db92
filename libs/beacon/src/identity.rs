//! Device short identifier
//!
//! A 6-byte opaque identifier assigned at provisioning time. It is the only
//! field shared between the advertisement and the validation response, and a
//! reader correlates the two through it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of the short identifier in bytes
pub const IDENTITY_LEN: usize = 6;

/// Identity parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    /// Input was not valid hex
    #[error("Invalid identity hex: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes
    #[error("Invalid identity length: expected {IDENTITY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Per-device short identifier (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity([u8; IDENTITY_LEN]);

impl DeviceIdentity {
    /// Create from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let array: [u8; IDENTITY_LEN] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Raw identifier bytes, exactly as they appear on the wire
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Lowercase hex without separators, e.g. `010203040506`
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for DeviceIdentity {
    type Err = IdentityError;

    /// Accepts plain hex (`010203040506`) or colon separated (`01:02:03:04:05:06`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| *c != ':').collect();
        let bytes = hex::decode(&cleaned).map_err(|e| IdentityError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; IDENTITY_LEN]> for DeviceIdentity {
    fn from(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }
}

// Stored as a hex string in config files
impl Serialize for DeviceIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DeviceIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
