//! Physical UART traits.

use crate::line_coding::FrameFormat;

/// Byte-level transmit side of the physical UART.
///
/// Reception does not go through this trait: the receive interrupt feeds
/// bytes straight into the [`RxProducer`](crate::RxProducer).
pub trait UartPort {
    /// Check if the transmitter can accept another byte.
    fn is_send_ready(&self) -> bool;

    /// Write one byte. Only called after [`is_send_ready`](Self::is_send_ready)
    /// returned `true`.
    fn send_byte(&mut self, byte: u8);
}

/// Register-level configuration of the physical UART.
///
/// [`SerialConfigTranslator`](crate::SerialConfigTranslator) calls these in a
/// fixed order; implementations perform each step literally and never
/// re-enable the UART on their own.
pub trait UartConfig {
    /// Force the TX pin high (idle) independently of the UART.
    fn hold_tx_idle(&mut self);

    /// Turn off receiver, transmitter and receive interrupt.
    fn disable(&mut self);

    /// Program the baud rate.
    ///
    /// `divisor` is the double-speed divisor for the requested `baud`. UARTs
    /// with a finer baud generator program `baud` directly, for example via
    /// [`fractional_divisors`](crate::fractional_divisors).
    fn set_baud_divisor(&mut self, divisor: u32, baud: u32);

    /// Program parity, stop bits and character size.
    fn set_frame_format(&mut self, format: FrameFormat);

    /// Turn on receiver, transmitter and receive-complete interrupt.
    fn enable(&mut self);

    /// Give the TX pin back to the UART.
    fn release_tx(&mut self);
}
