//! USB link state as shown on the status LED.

use portable_atomic::{AtomicU8, Ordering};

/// Blink half-period while the host enumerates the device.
pub const ENUMERATING_BLINK_MS: u64 = 250;

/// Blink half-period after a USB error.
pub const ERROR_BLINK_MS: u64 = 60;

/// Where the device stands with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkStatus {
    /// Not attached, or suspended.
    NotReady = 0,
    /// Attached and being enumerated, not yet configured.
    Enumerating = 1,
    /// Configured, data flows.
    Ready = 2,
    /// The USB stack reported a failure.
    Error = 3,
}

impl LinkStatus {
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkStatus::Enumerating,
            2 => LinkStatus::Ready,
            3 => LinkStatus::Error,
            _ => LinkStatus::NotReady,
        }
    }

    /// LED level at `now_ms` on a single LED.
    ///
    /// Off when not ready, slow blink while enumerating, steady on when
    /// ready, fast blink on error.
    #[must_use]
    pub const fn led_on(self, now_ms: u64) -> bool {
        match self {
            LinkStatus::NotReady => false,
            LinkStatus::Enumerating => (now_ms / ENUMERATING_BLINK_MS) % 2 == 0,
            LinkStatus::Ready => true,
            LinkStatus::Error => (now_ms / ERROR_BLINK_MS) % 2 == 0,
        }
    }
}

/// [`LinkStatus`] shared between the USB stack and the bridge loop.
pub struct SharedLinkStatus(AtomicU8);

impl SharedLinkStatus {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(LinkStatus::NotReady as u8))
    }

    #[inline]
    pub fn set(&self, status: LinkStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> LinkStatus {
        LinkStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Whether the host has configured the device.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.get() == LinkStatus::Ready
    }
}

impl Default for SharedLinkStatus {
    fn default() -> Self {
        Self::new()
    }
}
