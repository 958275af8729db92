//! Signed validation response
//!
//! Served on each read of the validation attribute:
//!
//! ```text
//! [identity:6][unix_ts:4 LE][hmac_sha256(key, identity || unix_ts)[..8]]
//! ```
//!
//! The response carries no nonce. A captured response stays valid for as
//! long as a reader is willing to accept its timestamp, so freshness is
//! enforced only by the reader-side window in [`ValidationVerifier`].

use crate::identity::{DeviceIdentity, IDENTITY_LEN};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Length of the encoded timestamp
pub const TIMESTAMP_LEN: usize = 4;

/// Length of the truncated MAC tag
pub const TAG_LEN: usize = 8;

/// Length of the signed message (`identity || timestamp`)
pub const MESSAGE_LEN: usize = IDENTITY_LEN + TIMESTAMP_LEN;

/// Total validation response length
pub const VALIDATION_LEN: usize = MESSAGE_LEN + TAG_LEN;

/// Validation signing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Caller buffer cannot hold the response; nothing was written
    #[error("Buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        required: usize,
        /// Bytes offered by the caller
        available: usize,
    },

    /// The keyed MAC could not be computed
    #[error("Signing primitive failure: {0}")]
    SigningPrimitiveFailure(String),

    /// Signing key has no bytes
    #[error("Signing key is empty")]
    EmptyKey,
}

/// Result type for validation signing
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Reader-side verification errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerifyError {
    /// Response was not exactly 18 bytes
    #[error("Invalid response length: expected {VALIDATION_LEN} bytes, got {0}")]
    InvalidLength(usize),

    /// Response names a different device than expected
    #[error("Identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch {
        /// Identity the reader correlated from the advertisement
        expected: DeviceIdentity,
        /// Identity in the response
        actual: DeviceIdentity,
    },

    /// MAC tag does not match
    #[error("Bad signature")]
    BadSignature,

    /// Timestamp is older than the reader accepts
    #[error("Stale response: {age}s old, limit {max_age}s")]
    Stale {
        /// Age of the response in seconds
        age: u32,
        /// Configured limit
        max_age: u32,
    },

    /// Timestamp is ahead of the reader clock by more than the allowed skew
    #[error("Response timestamp {ahead}s in the future, allowed skew {max_skew}s")]
    FromFuture {
        /// Seconds ahead of the reader clock
        ahead: u32,
        /// Configured skew
        max_skew: u32,
    },

    /// The verification key could not be used
    #[error("Verification failed: {0}")]
    Primitive(#[from] ValidationError),
}

/// Secret key shared between the beacon and authorised readers
///
/// Zeroized on drop. The raw bytes never leave this crate.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap provisioned key material
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        Ok(Self(bytes))
    }

    /// Key length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed key
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn mac(&self) -> Result<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.0)
            .map_err(|e| ValidationError::SigningPrimitiveFailure(e.to_string()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED; {}])", self.0.len())
    }
}

fn message(identity: &[u8; IDENTITY_LEN], now: u32) -> [u8; MESSAGE_LEN] {
    let mut msg = [0u8; MESSAGE_LEN];
    msg[..IDENTITY_LEN].copy_from_slice(identity);
    msg[IDENTITY_LEN..].copy_from_slice(&now.to_le_bytes());
    msg
}

/// Compute the truncated HMAC-SHA256 tag over `identity || now`
pub fn compute_tag(
    identity: &[u8; IDENTITY_LEN],
    now: u32,
    key: &SigningKey,
) -> Result<[u8; TAG_LEN]> {
    let mut mac = key.mac()?;
    mac.update(&message(identity, now));
    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&full[..TAG_LEN]);
    Ok(tag)
}

/// Build the 18-byte validation response
///
/// `now` must be sampled immediately before the call.
pub fn sign_validation(
    identity: &[u8; IDENTITY_LEN],
    now: u32,
    key: &SigningKey,
) -> Result<[u8; VALIDATION_LEN]> {
    let tag = compute_tag(identity, now, key)?;
    let mut out = [0u8; VALIDATION_LEN];
    out[..MESSAGE_LEN].copy_from_slice(&message(identity, now));
    out[MESSAGE_LEN..].copy_from_slice(&tag);
    Ok(out)
}

/// Write the validation response into a caller buffer
///
/// Returns the number of bytes written. A buffer shorter than
/// [`VALIDATION_LEN`] is rejected before any byte is touched.
pub fn write_validation(
    identity: &[u8; IDENTITY_LEN],
    now: u32,
    key: &SigningKey,
    out: &mut [u8],
) -> Result<usize> {
    if out.len() < VALIDATION_LEN {
        return Err(ValidationError::BufferTooSmall {
            required: VALIDATION_LEN,
            available: out.len(),
        });
    }
    let payload = sign_validation(identity, now, key)?;
    out[..VALIDATION_LEN].copy_from_slice(&payload);
    Ok(VALIDATION_LEN)
}

/// Signer bound to one device identity and its provisioned key
pub struct ValidationSigner {
    identity: DeviceIdentity,
    key: SigningKey,
}

impl ValidationSigner {
    /// Create a signer for the given device
    #[must_use]
    pub fn new(identity: DeviceIdentity, key: SigningKey) -> Self {
        Self { identity, key }
    }

    /// Identity embedded in every response
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Sign a response for timestamp `now`
    pub fn sign(&self, now: u32) -> Result<[u8; VALIDATION_LEN]> {
        sign_validation(self.identity.as_bytes(), now, &self.key)
    }

    /// Sign a response for timestamp `now` into `out`
    pub fn sign_into(&self, now: u32, out: &mut [u8]) -> Result<usize> {
        write_validation(self.identity.as_bytes(), now, &self.key, out)
    }
}

impl fmt::Debug for ValidationSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSigner")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Decoded validation response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPayload {
    /// Device short identifier
    pub identity: DeviceIdentity,
    /// Unix seconds at signing
    pub timestamp: u32,
    /// Truncated MAC tag
    pub tag: [u8; TAG_LEN],
}

impl ValidationPayload {
    /// Split an 18-byte response into its fields without checking the tag
    pub fn parse(data: &[u8]) -> std::result::Result<Self, VerifyError> {
        let bytes: &[u8; VALIDATION_LEN] = data
            .try_into()
            .map_err(|_| VerifyError::InvalidLength(data.len()))?;

        let mut identity = [0u8; IDENTITY_LEN];
        identity.copy_from_slice(&bytes[..IDENTITY_LEN]);
        let timestamp = u32::from_le_bytes([
            bytes[IDENTITY_LEN],
            bytes[IDENTITY_LEN + 1],
            bytes[IDENTITY_LEN + 2],
            bytes[IDENTITY_LEN + 3],
        ]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[MESSAGE_LEN..]);

        Ok(Self {
            identity: DeviceIdentity::from_bytes(identity),
            timestamp,
            tag,
        })
    }

    /// Encode back to wire format
    #[must_use]
    pub fn to_bytes(&self) -> [u8; VALIDATION_LEN] {
        let mut out = [0u8; VALIDATION_LEN];
        out[..MESSAGE_LEN].copy_from_slice(&message(self.identity.as_bytes(), self.timestamp));
        out[MESSAGE_LEN..].copy_from_slice(&self.tag);
        out
    }
}

/// Reader-side check of a validation response
///
/// The freshness window is a reader policy; the beacon itself signs whatever
/// timestamp its clock reports.
pub struct ValidationVerifier {
    key: SigningKey,
    expected_identity: Option<DeviceIdentity>,
    max_age: Option<u32>,
    max_skew: u32,
}

impl ValidationVerifier {
    /// Verifier that checks only the MAC
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            expected_identity: None,
            max_age: None,
            max_skew: 0,
        }
    }

    /// Require the response to name this device
    #[must_use]
    pub fn with_expected_identity(mut self, identity: DeviceIdentity) -> Self {
        self.expected_identity = Some(identity);
        self
    }

    /// Reject responses older than `max_age` seconds, or more than
    /// `max_skew` seconds ahead of the reader clock
    #[must_use]
    pub fn with_freshness(mut self, max_age: u32, max_skew: u32) -> Self {
        self.max_age = Some(max_age);
        self.max_skew = max_skew;
        self
    }

    /// Verify `data` against the reader clock `now`
    pub fn verify(&self, data: &[u8], now: u32) -> std::result::Result<ValidationPayload, VerifyError> {
        let payload = ValidationPayload::parse(data)?;

        if let Some(expected) = self.expected_identity
            && expected != payload.identity
        {
            return Err(VerifyError::IdentityMismatch {
                expected,
                actual: payload.identity,
            });
        }

        let mut mac = self.key.mac()?;
        mac.update(&message(payload.identity.as_bytes(), payload.timestamp));
        mac.verify_truncated_left(&payload.tag)
            .map_err(|_| VerifyError::BadSignature)?;

        if let Some(max_age) = self.max_age {
            if payload.timestamp > now {
                let ahead = payload.timestamp - now;
                if ahead > self.max_skew {
                    return Err(VerifyError::FromFuture {
                        ahead,
                        max_skew: self.max_skew,
                    });
                }
            } else {
                let age = now - payload.timestamp;
                if age > max_age {
                    return Err(VerifyError::Stale { age, max_age });
                }
            }
        }

        Ok(payload)
    }
}
