//! USB virtual serial port trait and error types.

/// Error type for sending a byte to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// IN endpoint not ready (host has not polled the previous packet).
    NotReady,
    /// Transmit staging area is full.
    Full,
    /// Device not configured / port closed.
    Disconnected,
}

/// Byte-stream view of the host-facing CDC ACM data channel.
///
/// All methods are non-blocking. The bridge loop polls them on every
/// iteration and must never be suspended by the USB stack.
///
/// # `no_std` Compatibility
///
/// All implementations must be `#![no_std]` compatible with no heap allocation.
pub trait UsbSerial {
    /// Take the next byte the host sent, if any.
    fn receive_byte(&mut self) -> Option<u8>;

    /// Check if the IN direction can accept data right now.
    fn is_in_ready(&self) -> bool;

    /// Queue one byte for the host.
    ///
    /// On error the byte was not accepted and the caller keeps it.
    fn send_byte(&mut self, byte: u8) -> Result<(), SendError>;

    /// Check if the host has configured the device.
    fn is_configured(&self) -> bool;

    /// Periodic service hook (connection upkeep, pending control requests).
    fn service(&mut self) {}
}
