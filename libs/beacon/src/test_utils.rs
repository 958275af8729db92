//! Fixtures shared by unit tests, integration tests and benchmarks
//!
//! The reference vector below was produced independently (zlib CRC32 and a
//! stock HMAC-SHA256) and pins the wire format.

use crate::config::BeaconConfig;
use crate::identity::DeviceIdentity;
use crate::validation::SigningKey;
use std::path::Path;

/// Reference identity `01:02:03:04:05:06`
pub const REFERENCE_IDENTITY: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

/// Reference key
pub const REFERENCE_KEY: &[u8] = b"test-key";

/// Reference signing time (unix seconds)
pub const REFERENCE_NOW: u32 = 100;

/// Advertisement for type 0x01, firmware 0x01, flags 0x00 and the reference identity
pub const REFERENCE_ADVERTISEMENT: [u8; 13] = [
    0x01, 0x01, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xf4, 0xd6, 0xec, 0x0d,
];

/// Validation response for the reference identity, key and time
pub const REFERENCE_VALIDATION: [u8; 18] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x64, 0x00, 0x00, 0x00, 0xe6, 0x31, 0x74, 0x1b, 0xf5, 0xe5,
    0x52, 0xe9,
];

/// Reference identity as a typed value
#[must_use]
pub fn reference_identity() -> DeviceIdentity {
    DeviceIdentity::from_bytes(REFERENCE_IDENTITY)
}

/// Reference key as a typed value
#[must_use]
pub fn reference_key() -> SigningKey {
    // Non-empty constant
    SigningKey::new(REFERENCE_KEY.to_vec()).expect("reference key is not empty")
}

/// Configuration for the reference identity with its key file in `dir`
#[must_use]
pub fn reference_config(dir: &Path) -> BeaconConfig {
    BeaconConfig::new(reference_identity(), dir.join(crate::config::KEY_FILE_NAME))
}
