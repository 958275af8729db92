//! Radio transport interface
//!
//! The radio stack owns advertising cadence and retransmission. The beacon
//! only hands it a fresh payload whenever the payload changes.

use std::sync::{Arc, Mutex, PoisonError};

/// Advertising side of the radio stack
pub trait RadioTransport {
    /// Error type for radio operations
    type Error: std::fmt::Display;

    /// Start (or restart) advertising `payload` as manufacturer data under
    /// `vendor_tag`, alongside the 128-bit service UUID
    fn start_advertising(
        &mut self,
        service_uuid: [u8; 16],
        vendor_tag: u16,
        payload: &[u8],
    ) -> Result<(), Self::Error>;
}

/// Transport that only logs what it would advertise
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl RadioTransport for LogTransport {
    type Error = std::convert::Infallible;

    fn start_advertising(
        &mut self,
        service_uuid: [u8; 16],
        vendor_tag: u16,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        log::info!(
            "Advertising service {} vendor 0x{vendor_tag:04x} payload {}",
            hex::encode(service_uuid),
            hex::encode(payload)
        );
        Ok(())
    }
}

/// One `start_advertising` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertised {
    /// Service UUID passed to the radio
    pub service_uuid: [u8; 16],
    /// Vendor tag passed to the radio
    pub vendor_tag: u16,
    /// Payload passed to the radio
    pub payload: Vec<u8>,
}

/// Transport that records every call; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<Advertised>>>,
}

impl RecordingTransport {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<Advertised> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent call
    #[must_use]
    pub fn last(&self) -> Option<Advertised> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl RadioTransport for RecordingTransport {
    type Error = std::convert::Infallible;

    fn start_advertising(
        &mut self,
        service_uuid: [u8; 16],
        vendor_tag: u16,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Advertised {
                service_uuid,
                vendor_tag,
                payload: payload.to_vec(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_clones_share_log() {
        let recorder = RecordingTransport::new();
        let mut handle = recorder.clone();
        handle.start_advertising([0u8; 16], 0x1234, &[1, 2, 3]).unwrap();
        handle.start_advertising([1u8; 16], 0x4321, &[4]).unwrap();

        assert_eq!(recorder.calls().len(), 2);
        let last = recorder.last().unwrap();
        assert_eq!(last.vendor_tag, 0x4321);
        assert_eq!(last.payload, vec![4]);
    }

    #[test]
    fn test_log_transport_never_fails() {
        assert!(LogTransport.start_advertising([0u8; 16], 0, &[]).is_ok());
    }
}
