//! Advertisement payload encoding
//!
//! The beacon broadcasts a fixed 13-byte manufacturer-data payload:
//!
//! ```text
//! [device_type:1][fw_major:1][flags:1][identity:6][crc32:4]
//! ```
//!
//! The checksum is CRC-32/ISO-HDLC (the IEEE 802.3 CRC used by zlib and
//! Ethernet: reflected polynomial `0xEDB88320`, init and xor-out
//! `0xFFFFFFFF`) over the first 9 bytes, stored little-endian.

use crate::identity::{DeviceIdentity, IDENTITY_LEN};
use std::fmt;
use thiserror::Error;

/// Bytes covered by the checksum (everything before it)
pub const CHECKSUMMED_LEN: usize = 3 + IDENTITY_LEN;

/// Length of the trailing CRC32
pub const CHECKSUM_LEN: usize = 4;

/// Total advertisement payload length
///
/// 9 header bytes plus the checksum. Buffers sized at 12 bytes truncate the
/// last checksum byte.
pub const ADVERTISEMENT_LEN: usize = CHECKSUMMED_LEN + CHECKSUM_LEN;

/// Tracker service UUID `0000FEED-0000-1000-8000-00805F9B34FB`, big-endian byte order
pub const SERVICE_UUID: [u8; 16] = [
    0x00, 0x00, 0xFE, 0xED, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB,
];

/// Vendor tag carried in the manufacturer-specific data AD structure
pub const VENDOR_TAG: u16 = 0x1234;

/// Device type byte for a tracker
pub const DEVICE_TYPE_TRACKER: u8 = 0x01;

/// Firmware major version of this build
pub const FIRMWARE_MAJOR: u8 = 0x01;

const OFFSET_DEVICE_TYPE: usize = 0;
const OFFSET_FW_MAJOR: usize = 1;
const OFFSET_FLAGS: usize = 2;
const OFFSET_IDENTITY: usize = 3;
const OFFSET_CHECKSUM: usize = CHECKSUMMED_LEN;

/// Advertisement decoding errors (reader side)
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdvertisementError {
    /// Payload was not exactly 13 bytes
    #[error("Invalid advertisement length: expected {ADVERTISEMENT_LEN} bytes, got {0}")]
    InvalidLength(usize),

    /// Stored checksum does not match the header bytes
    #[error("Checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch {
        /// Checksum read from the payload
        stored: u32,
        /// Checksum computed over the first 9 bytes
        computed: u32,
    },
}

/// Result type for advertisement operations
pub type Result<T> = std::result::Result<T, AdvertisementError>;

/// Transient state bits carried in the flags byte
///
/// Bits without a named constant are reserved and passed through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags(u8);

impl Flags {
    /// No state bits set
    pub const NONE: Self = Self(0x00);
    /// Battery is below the configured threshold
    pub const LOW_BATTERY: Self = Self(0x01);
    /// Device has recently moved
    pub const MOTION: Self = Self(0x02);

    /// Wrap a raw flags byte
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw flags byte
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy with the bits of `other` set or cleared
    #[must_use]
    pub const fn with(self, other: Self, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }
}

impl std::ops::BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::LOW_BATTERY) {
            names.push("low-battery");
        }
        if self.contains(Self::MOTION) {
            names.push("motion");
        }
        if names.is_empty() {
            write!(f, "0x{:02x}", self.0)
        } else {
            write!(f, "0x{:02x} ({})", self.0, names.join(", "))
        }
    }
}

/// Compute the advertisement checksum over the 9 header bytes
#[must_use]
pub fn checksum(header: &[u8; CHECKSUMMED_LEN]) -> u32 {
    crc32fast::hash(header)
}

/// Build the 13-byte advertisement payload
///
/// Pure and infallible: every input is a fixed-width value.
#[must_use]
pub fn encode_advertisement(
    device_type: u8,
    fw_major: u8,
    flags: u8,
    identity: &[u8; IDENTITY_LEN],
) -> [u8; ADVERTISEMENT_LEN] {
    let mut header = [0u8; CHECKSUMMED_LEN];
    header[OFFSET_DEVICE_TYPE] = device_type;
    header[OFFSET_FW_MAJOR] = fw_major;
    header[OFFSET_FLAGS] = flags;
    header[OFFSET_IDENTITY..].copy_from_slice(identity);

    let mut out = [0u8; ADVERTISEMENT_LEN];
    out[..CHECKSUMMED_LEN].copy_from_slice(&header);
    out[OFFSET_CHECKSUM..].copy_from_slice(&checksum(&header).to_le_bytes());
    out
}

/// Decoded advertisement payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisementPayload {
    /// Device type byte
    pub device_type: u8,
    /// Firmware major version
    pub fw_major: u8,
    /// Transient state flags
    pub flags: Flags,
    /// Device short identifier
    pub identity: DeviceIdentity,
}

impl AdvertisementPayload {
    /// Encode to the 13-byte wire format
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ADVERTISEMENT_LEN] {
        encode_advertisement(
            self.device_type,
            self.fw_major,
            self.flags.bits(),
            self.identity.as_bytes(),
        )
    }

    /// Parse and checksum-verify a received payload
    pub fn parse(data: &[u8]) -> Result<Self> {
        let bytes: &[u8; ADVERTISEMENT_LEN] = data
            .try_into()
            .map_err(|_| AdvertisementError::InvalidLength(data.len()))?;

        let mut header = [0u8; CHECKSUMMED_LEN];
        header.copy_from_slice(&bytes[..CHECKSUMMED_LEN]);
        let stored = u32::from_le_bytes([
            bytes[OFFSET_CHECKSUM],
            bytes[OFFSET_CHECKSUM + 1],
            bytes[OFFSET_CHECKSUM + 2],
            bytes[OFFSET_CHECKSUM + 3],
        ]);
        let computed = checksum(&header);
        if stored != computed {
            return Err(AdvertisementError::ChecksumMismatch { stored, computed });
        }

        let mut identity = [0u8; IDENTITY_LEN];
        identity.copy_from_slice(&header[OFFSET_IDENTITY..]);

        Ok(Self {
            device_type: header[OFFSET_DEVICE_TYPE],
            fw_major: header[OFFSET_FW_MAJOR],
            flags: Flags::from_bits(header[OFFSET_FLAGS]),
            identity: DeviceIdentity::from_bytes(identity),
        })
    }
}

/// Encoder bound to one device identity and firmware build
///
/// Only the flags vary between refreshes; the payload is recomputed on every
/// call rather than patched in place.
#[derive(Debug, Clone, Copy)]
pub struct AdvertisementEncoder {
    identity: DeviceIdentity,
    device_type: u8,
    fw_major: u8,
}

impl AdvertisementEncoder {
    /// Create an encoder for the given device
    #[must_use]
    pub const fn new(identity: DeviceIdentity, device_type: u8, fw_major: u8) -> Self {
        Self {
            identity,
            device_type,
            fw_major,
        }
    }

    /// Identity embedded in every payload
    #[must_use]
    pub const fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Build the payload for the current flags
    #[must_use]
    pub fn encode(&self, flags: Flags) -> [u8; ADVERTISEMENT_LEN] {
        encode_advertisement(
            self.device_type,
            self.fw_major,
            flags.bits(),
            self.identity.as_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

    #[test]
    fn test_crc_variant_check_value() {
        // CRC-32/ISO-HDLC check value
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_known_payload() {
        let payload = encode_advertisement(0x01, 0x01, 0x00, &ID);
        assert_eq!(
            payload,
            [0x01, 0x01, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xf4, 0xd6, 0xec, 0x0d]
        );
    }

    #[test]
    fn test_layout_and_checksum() {
        let payload = encode_advertisement(0xAB, 0x07, 0x03, &ID);
        assert_eq!(payload.len(), ADVERTISEMENT_LEN);
        assert_eq!(&payload[..3], &[0xAB, 0x07, 0x03]);
        assert_eq!(&payload[3..9], &ID);

        let crc = crc32fast::hash(&payload[..9]);
        assert_eq!(&payload[9..], &crc.to_le_bytes());
    }

    #[test]
    fn test_low_battery_flag_changes_checksum() {
        let normal = encode_advertisement(0x01, 0x01, Flags::NONE.bits(), &ID);
        let low = encode_advertisement(0x01, 0x01, Flags::LOW_BATTERY.bits(), &ID);
        assert_eq!(low[2], 0x01);
        assert_ne!(normal[9..], low[9..]);
        assert_eq!(
            low,
            [0x01, 0x01, 0x01, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x40, 0xdd, 0x9b, 0xab]
        );
    }

    #[test]
    fn test_parse_valid() {
        let bytes = encode_advertisement(0x01, 0x02, 0x02, &ID);
        let parsed = AdvertisementPayload::parse(&bytes).unwrap();
        assert_eq!(parsed.device_type, 0x01);
        assert_eq!(parsed.fw_major, 0x02);
        assert!(parsed.flags.contains(Flags::MOTION));
        assert_eq!(parsed.identity.as_bytes(), &ID);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn test_parse_rejects_tampered_identity() {
        let mut bytes = encode_advertisement(0x01, 0x01, 0x00, &ID);
        bytes[5] ^= 0x80;
        assert!(matches!(
            AdvertisementPayload::parse(&bytes),
            Err(AdvertisementError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(
            AdvertisementPayload::parse(&[0u8; 12]),
            Err(AdvertisementError::InvalidLength(12))
        );
        assert_eq!(
            AdvertisementPayload::parse(&[]),
            Err(AdvertisementError::InvalidLength(0))
        );
    }

    #[test]
    fn test_encoder_recomputes_per_flags() {
        let encoder =
            AdvertisementEncoder::new(DeviceIdentity::from_bytes(ID), DEVICE_TYPE_TRACKER, 1);
        let a = encoder.encode(Flags::NONE);
        let b = encoder.encode(Flags::LOW_BATTERY | Flags::MOTION);
        assert_eq!(a, encoder.encode(Flags::NONE));
        assert_eq!(b[2], 0x03);
        assert_eq!(a[3..9], b[3..9]);
    }

    #[test]
    fn test_flags_with_and_display() {
        let flags = Flags::NONE.with(Flags::LOW_BATTERY, true);
        assert!(flags.contains(Flags::LOW_BATTERY));
        assert_eq!(flags.with(Flags::LOW_BATTERY, false), Flags::NONE);
        assert_eq!(flags.to_string(), "0x01 (low-battery)");
        assert_eq!(Flags::from_bits(0x80).to_string(), "0x80");
    }

    #[test]
    fn test_service_uuid_layout() {
        assert_eq!(&SERVICE_UUID[2..4], &[0xFE, 0xED]);
    }
}
