//! Identity broadcast and validation for a BLE tracking beacon
//!
//! The beacon exposes its short identifier in two payloads:
//!
//! - an unauthenticated **advertisement**, broadcast continuously and
//!   protected only by a CRC32 against corruption;
//! - a **validation response**, produced on each read of a read-only
//!   attribute, carrying the identity, the current unix time and a truncated
//!   HMAC-SHA256 so a reader holding the key can check authenticity and
//!   freshness.
//!
//! # Wire formats
//!
//! ```text
//! advertisement  [device_type:1][fw_major:1][flags:1][identity:6][crc32 LE:4]   13 bytes
//! validation     [identity:6][unix_ts LE:4][hmac_sha256[..8]]                   18 bytes
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use tracker_beacon_lib::{encode_advertisement, sign_validation, SigningKey};
//!
//! let identity = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
//! let adv = encode_advertisement(0x01, 0x01, 0x00, &identity);
//! assert_eq!(&adv[3..9], &identity);
//!
//! let key = SigningKey::new(b"test-key".to_vec()).unwrap();
//! let response = sign_validation(&identity, 100, &key).unwrap();
//! assert_eq!(&response[..6], &identity);
//! ```

#![warn(missing_docs)]

pub mod advertisement;
pub mod beacon;
pub mod clock;
pub mod config;
pub mod identity;
pub mod keystore;
/// Shared fixtures for tests and benchmarks
pub mod test_utils;
pub mod transport;
pub mod validation;

// Re-export commonly used types
pub use advertisement::{
    ADVERTISEMENT_LEN, AdvertisementEncoder, AdvertisementError, AdvertisementPayload, Flags,
    encode_advertisement,
};
pub use beacon::{Beacon, BeaconError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BeaconConfig, ConfigError};
pub use identity::{DeviceIdentity, IdentityError};
pub use keystore::{FileKeyStore, KeyStore, KeyStoreError, StaticKeyStore};
pub use transport::{LogTransport, RadioTransport, RecordingTransport};
pub use validation::{
    SigningKey, VALIDATION_LEN, ValidationError, ValidationPayload, ValidationSigner,
    ValidationVerifier, VerifyError, sign_validation, write_validation,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
