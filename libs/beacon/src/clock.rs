//! Wall-clock source for validation timestamps

use std::sync::atomic::{AtomicU32, Ordering};

/// Source of the current unix time in seconds
pub trait Clock {
    /// Current unix time, sampled at the moment of the call
    fn now(&self) -> u32;
}

/// Host system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        let secs = chrono::Utc::now().timestamp();
        u32::try_from(secs).unwrap_or_else(|_| {
            log::warn!("System time {secs} outside 32-bit unix range, clamping");
            if secs < 0 { 0 } else { u32::MAX }
        })
    }
}

/// Manually driven clock for tests and offline tooling
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU32);

impl FixedClock {
    /// Clock frozen at `now`
    #[must_use]
    pub fn new(now: u32) -> Self {
        Self(AtomicU32::new(now))
    }

    /// Jump to `now`
    pub fn set(&self, now: u32) {
        self.0.store(now, Ordering::Relaxed);
    }

    /// Move forward by `secs`
    pub fn advance(&self, secs: u32) {
        self.0.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u32 {
        (**self).now()
    }
}
