//! Line encoding requested by the host and its translation onto the UART.
//!
//! The frame format follows the classic USART control register layout
//! (`UPM1:0`, `USBS`, `UCSZ1:0`). Board code decodes it into whatever its UART
//! actually uses.

use crate::uart::UartConfig;
use fixed::types::U32F32;

/// Parity setting requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Stop bit setting requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

/// Serial line encoding as set by the host (baud, parity, stop and data bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineEncoding {
    /// Baud rate in bits per second.
    pub baud: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Data bits per character. Only 5 to 8 map onto the UART.
    pub data_bits: u8,
}

impl LineEncoding {
    /// 115200 baud, 8 data bits, no parity, one stop bit.
    pub const DEFAULT: Self = Self {
        baud: 115_200,
        parity: Parity::None,
        stop_bits: StopBits::One,
        data_bits: 8,
    };
}

impl Default for LineEncoding {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// UART frame format bits.
///
/// The all-zero pattern is the power-on default: 5 data bits, no parity,
/// one stop bit.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameFormat(pub u8);

impl FrameFormat {
    pub const UPM1: u8 = 1 << 5;
    pub const UPM0: u8 = 1 << 4;
    pub const USBS: u8 = 1 << 3;
    pub const UCSZ1: u8 = 1 << 2;
    pub const UCSZ0: u8 = 1 << 1;

    /// Build the frame format for a line encoding.
    ///
    /// Values with no mapping leave their bits cleared rather than failing:
    /// mark/space parity become no parity, 1.5 stop bits become one, and data
    /// bit counts other than 6, 7 or 8 fall back to 5.
    #[must_use]
    pub const fn from_encoding(encoding: &LineEncoding) -> Self {
        let mut bits = match encoding.parity {
            Parity::Odd => Self::UPM1 | Self::UPM0,
            Parity::Even => Self::UPM1,
            _ => 0,
        };

        if let StopBits::Two = encoding.stop_bits {
            bits |= Self::USBS;
        }

        bits |= match encoding.data_bits {
            6 => Self::UCSZ0,
            7 => Self::UCSZ1,
            8 => Self::UCSZ1 | Self::UCSZ0,
            _ => 0,
        };

        Self(bits)
    }

    #[must_use]
    pub const fn parity(self) -> Parity {
        match (self.0 & Self::UPM1 != 0, self.0 & Self::UPM0 != 0) {
            (true, true) => Parity::Odd,
            (true, false) => Parity::Even,
            _ => Parity::None,
        }
    }

    #[must_use]
    pub const fn stop_bits(self) -> StopBits {
        if self.0 & Self::USBS != 0 {
            StopBits::Two
        } else {
            StopBits::One
        }
    }

    /// Data bits per character (5-8).
    #[must_use]
    pub const fn data_bits(self) -> u8 {
        5 + ((self.0 >> 1) & 0b11)
    }
}

/// Double-speed UART divisor for `baud` given the UART input clock.
///
/// Uses 8x oversampling, which widens the reachable baud range at the cost of
/// sampling accuracy. A zero baud yields the largest divisor.
#[must_use]
pub const fn double_speed_divisor(clock_hz: u32, baud: u32) -> u32 {
    if baud == 0 {
        return u32::MAX;
    }
    let divisor = (clock_hz as u64 / 8 + baud as u64 / 2) / baud as u64;
    if divisor == 0 {
        0
    } else if divisor > u32::MAX as u64 {
        u32::MAX
    } else {
        divisor as u32 - 1
    }
}

/// Baud rate the UART actually runs at for a double-speed divisor.
#[must_use]
pub const fn effective_baud(clock_hz: u32, divisor: u32) -> u32 {
    (clock_hz as u64 / (8 * (divisor as u64 + 1))) as u32
}

/// Largest integer divisor a 16-bit baud rate register holds.
pub const MAX_INTEGER_DIVISOR: u32 = 0xFFFF;

/// Integer and fractional (1/64) divisors for a 16x oversampling UART, such
/// as the PL011.
///
/// Out-of-range rates clamp to the slowest or fastest setting the registers
/// can express; a zero baud yields the slowest.
#[must_use]
pub fn fractional_divisors(clock_hz: u32, baud: u32) -> (u32, u32) {
    if baud == 0 {
        return (MAX_INTEGER_DIVISOR, 0);
    }

    // clock / baud always fits the 32 integer bits, clock / (16 * baud) may not
    let divisor = U32F32::from_num(clock_hz) / U32F32::from_num(baud) / U32F32::from_num(16);
    let mut integer = divisor.int().to_num::<u32>();
    let mut fraction = (divisor.frac() * U32F32::from_num(64))
        .round()
        .to_num::<u32>();
    if fraction == 64 {
        integer += 1;
        fraction = 0;
    }

    if integer == 0 {
        (1, 0)
    } else if integer >= MAX_INTEGER_DIVISOR {
        (MAX_INTEGER_DIVISOR, 0)
    } else {
        (integer, fraction)
    }
}

/// Applies host line encodings to the physical UART.
pub struct SerialConfigTranslator {
    clock_hz: u32,
    current: Option<LineEncoding>,
}

impl SerialConfigTranslator {
    /// Create a translator for a UART clocked at `clock_hz`.
    #[must_use]
    pub const fn new(clock_hz: u32) -> Self {
        Self {
            clock_hz,
            current: None,
        }
    }

    /// The encoding most recently applied, if any.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&LineEncoding> {
        self.current.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Reconfigure the UART for `encoding`.
    ///
    /// TX is held idle and the UART fully disabled while the divisor and
    /// frame format change, so no partial character reaches the line.
    pub fn apply<R: UartConfig>(&mut self, uart: &mut R, encoding: &LineEncoding) {
        let format = FrameFormat::from_encoding(encoding);
        let divisor = double_speed_divisor(self.clock_hz, encoding.baud);

        uart.hold_tx_idle();
        uart.disable();
        uart.set_baud_divisor(divisor, encoding.baud);
        uart.set_frame_format(format);
        uart.enable();
        uart.release_tx();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "line encoding applied: {} baud (divisor {}), format {=u8:#x}",
            encoding.baud,
            divisor,
            format.0
        );

        self.current = Some(*encoding);
    }
}
