//! Beacon runtime
//!
//! Ties the advertisement encoder and validation signer to the external
//! collaborators: the broadcast side re-encodes and hands the payload to the
//! radio whenever the flags change, and the attribute dispatcher calls
//! [`Beacon::on_validation_read`] once per inbound read.

use crate::advertisement::{ADVERTISEMENT_LEN, AdvertisementEncoder, Flags};
use crate::clock::Clock;
use crate::config::{BeaconConfig, ConfigError};
use crate::identity::DeviceIdentity;
use crate::keystore::{KeyStore, KeyStoreError};
use crate::transport::RadioTransport;
use crate::validation::{self, SigningKey, ValidationError, ValidationSigner};
use thiserror::Error;

/// Beacon errors
#[derive(Error, Debug)]
pub enum BeaconError {
    /// Radio refused the payload
    #[error("Transport error: {0}")]
    Transport(String),

    /// Signing key could not be loaded
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation response could not be produced
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for beacon operations
pub type Result<T> = std::result::Result<T, BeaconError>;

/// A provisioned beacon
pub struct Beacon<C, T> {
    encoder: AdvertisementEncoder,
    signer: ValidationSigner,
    clock: C,
    transport: T,
    service_uuid: [u8; 16],
    vendor_tag: u16,
    low_battery_threshold_mv: u16,
    flags: Flags,
    advertising: bool,
}

impl<C: Clock, T: RadioTransport> Beacon<C, T> {
    /// Build a beacon from its configuration and provisioned key
    pub fn new(config: &BeaconConfig, key: SigningKey, clock: C, transport: T) -> Self {
        Self {
            encoder: AdvertisementEncoder::new(
                config.identity,
                config.device_type,
                config.firmware_major,
            ),
            signer: ValidationSigner::new(config.identity, key),
            clock,
            transport,
            service_uuid: config.service_uuid,
            vendor_tag: config.vendor_tag,
            low_battery_threshold_mv: config.low_battery_threshold_mv,
            flags: Flags::NONE,
            advertising: false,
        }
    }

    /// Build a beacon, loading the key from `key_store`
    pub fn from_key_store(
        config: &BeaconConfig,
        key_store: &impl KeyStore,
        clock: C,
        transport: T,
    ) -> Result<Self> {
        let key = key_store.load_signing_key()?;
        Ok(Self::new(config, key, clock, transport))
    }

    /// Device identity shared by both payloads
    pub fn identity(&self) -> &DeviceIdentity {
        self.encoder.identity()
    }

    /// Flags currently advertised
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// True once [`Beacon::start`] has handed a payload to the radio
    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// Payload for the current flags
    pub fn advertisement(&self) -> [u8; ADVERTISEMENT_LEN] {
        self.encoder.encode(self.flags)
    }

    /// Encode the payload and start advertising it
    pub fn start(&mut self) -> Result<()> {
        self.advertise()?;
        self.advertising = true;
        log::info!("Beacon {} advertising", self.identity());
        Ok(())
    }

    /// Change the advertised flags
    ///
    /// Returns true if the payload changed. While advertising, a changed
    /// payload is handed to the radio immediately.
    pub fn set_flags(&mut self, flags: Flags) -> Result<bool> {
        if flags == self.flags {
            return Ok(false);
        }
        log::debug!("Flags {} -> {}", self.flags, flags);
        let previous = self.flags;
        self.flags = flags;
        if self.advertising
            && let Err(e) = self.advertise()
        {
            self.flags = previous;
            return Err(e);
        }
        Ok(true)
    }

    /// Update the low-battery flag from a battery reading in millivolts
    pub fn update_battery(&mut self, millivolts: u16) -> Result<bool> {
        let low = millivolts < self.low_battery_threshold_mv;
        if low && !self.flags.contains(Flags::LOW_BATTERY) {
            log::warn!(
                "Battery low: {millivolts} mV < {} mV",
                self.low_battery_threshold_mv
            );
        }
        self.set_flags(self.flags.with(Flags::LOW_BATTERY, low))
    }

    /// Produce a validation response into `out`
    ///
    /// The clock is sampled on every call; responses are never cached.
    pub fn handle_validation_read(&self, out: &mut [u8]) -> validation::Result<usize> {
        let now = self.clock.now();
        self.signer.sign_into(now, out)
    }

    /// Attribute read entry point
    ///
    /// Returns the number of bytes written, or 0 if no response could be
    /// produced. Nothing is written on failure.
    pub fn on_validation_read(&self, out: &mut [u8]) -> usize {
        match self.handle_validation_read(out) {
            Ok(n) => {
                log::debug!("Served {n}-byte validation response");
                n
            }
            Err(e @ ValidationError::BufferTooSmall { .. }) => {
                log::warn!("Validation read rejected: {e}");
                0
            }
            Err(e) => {
                log::error!("Validation read failed: {e}");
                0
            }
        }
    }

    fn advertise(&mut self) -> Result<()> {
        let payload = self.encoder.encode(self.flags);
        self.transport
            .start_advertising(self.service_uuid, self.vendor_tag, &payload)
            .map_err(|e| BeaconError::Transport(e.to_string()))?;
        log::debug!("Advertisement refreshed: {}", hex::encode(payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::{AdvertisementPayload, VENDOR_TAG, SERVICE_UUID};
    use crate::clock::FixedClock;
    use crate::transport::RecordingTransport;
    use crate::validation::{VALIDATION_LEN, ValidationPayload};

    struct FailingTransport;

    impl RadioTransport for FailingTransport {
        type Error = String;

        fn start_advertising(&mut self, _: [u8; 16], _: u16, _: &[u8]) -> std::result::Result<(), String> {
            Err("radio off".to_string())
        }
    }

    fn config() -> BeaconConfig {
        BeaconConfig::new(DeviceIdentity::from_bytes([1, 2, 3, 4, 5, 6]), "beacon.key")
    }

    fn key() -> SigningKey {
        SigningKey::new(b"test-key".to_vec()).unwrap()
    }

    #[test]
    fn test_start_advertises_payload() {
        let radio = RecordingTransport::new();
        let mut beacon = Beacon::new(&config(), key(), FixedClock::new(100), radio.clone());
        assert!(!beacon.is_advertising());
        beacon.start().unwrap();
        assert!(beacon.is_advertising());

        let call = radio.last().unwrap();
        assert_eq!(call.service_uuid, SERVICE_UUID);
        assert_eq!(call.vendor_tag, VENDOR_TAG);
        assert_eq!(call.payload, beacon.advertisement().to_vec());
    }

    #[test]
    fn test_flag_change_readvertises_once() {
        let radio = RecordingTransport::new();
        let mut beacon = Beacon::new(&config(), key(), FixedClock::new(100), radio.clone());
        beacon.start().unwrap();

        assert!(beacon.set_flags(Flags::MOTION).unwrap());
        assert!(!beacon.set_flags(Flags::MOTION).unwrap());
        assert_eq!(radio.calls().len(), 2);

        let parsed = AdvertisementPayload::parse(&radio.last().unwrap().payload).unwrap();
        assert_eq!(parsed.flags, Flags::MOTION);
    }

    #[test]
    fn test_flags_before_start_not_sent() {
        let radio = RecordingTransport::new();
        let mut beacon = Beacon::new(&config(), key(), FixedClock::new(100), radio.clone());
        assert!(beacon.set_flags(Flags::MOTION).unwrap());
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn test_battery_threshold() {
        let radio = RecordingTransport::new();
        let mut beacon = Beacon::new(&config(), key(), FixedClock::new(100), radio);
        beacon.start().unwrap();

        assert!(beacon.update_battery(2_300).unwrap());
        assert!(beacon.flags().contains(Flags::LOW_BATTERY));
        assert!(!beacon.update_battery(2_200).unwrap());
        assert!(beacon.update_battery(3_000).unwrap());
        assert!(!beacon.flags().contains(Flags::LOW_BATTERY));
    }

    #[test]
    fn test_transport_failure_keeps_previous_flags() {
        let mut beacon = Beacon::new(&config(), key(), FixedClock::new(100), FailingTransport);
        assert!(matches!(beacon.start(), Err(BeaconError::Transport(_))));
        assert!(!beacon.is_advertising());

        // Not advertising, so the flag change is local only
        assert!(beacon.set_flags(Flags::LOW_BATTERY).unwrap());
    }

    #[test]
    fn test_validation_read_samples_clock() {
        let clock = FixedClock::new(100);
        let beacon = Beacon::new(&config(), key(), &clock, RecordingTransport::new());

        let mut first = [0u8; VALIDATION_LEN];
        assert_eq!(beacon.on_validation_read(&mut first), VALIDATION_LEN);
        clock.advance(1);
        let mut second = [0u8; VALIDATION_LEN];
        assert_eq!(beacon.on_validation_read(&mut second), VALIDATION_LEN);

        let a = ValidationPayload::parse(&first).unwrap();
        let b = ValidationPayload::parse(&second).unwrap();
        assert_eq!(a.timestamp, 100);
        assert_eq!(b.timestamp, 101);
        assert_ne!(a.tag, b.tag);
    }

    #[test]
    fn test_validation_read_small_buffer_returns_zero() {
        let beacon = Beacon::new(&config(), key(), FixedClock::new(100), RecordingTransport::new());
        let mut buf = [0x55u8; 10];
        assert_eq!(beacon.on_validation_read(&mut buf), 0);
        assert_eq!(buf, [0x55u8; 10]);
    }

    #[test]
    fn test_identity_shared_between_payloads() {
        let beacon = Beacon::new(&config(), key(), FixedClock::new(100), RecordingTransport::new());
        let adv = beacon.advertisement();
        let mut buf = [0u8; VALIDATION_LEN];
        beacon.on_validation_read(&mut buf);
        assert_eq!(adv[3..9], buf[..6]);
        assert_eq!(beacon.identity().as_bytes(), &[1, 2, 3, 4, 5, 6]);
    }
}
