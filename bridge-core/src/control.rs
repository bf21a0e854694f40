//! Host line-state handling: UART reconfiguration and bootloader handshake.

use crate::handshake::{ArmState, BootKeyMemory, BootloaderHandshake, ResetTimer};
use crate::line_coding::{LineEncoding, SerialConfigTranslator};
use crate::uart::UartConfig;

/// Line encoding and control lines as last set by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostLineState {
    pub encoding: LineEncoding,
    /// Data Terminal Ready, asserted while a host application holds the port open.
    pub dtr: bool,
    /// Request To Send. Not used by the bridge.
    pub rts: bool,
}

/// Reacts to host line-state change events.
///
/// A changed encoding is applied to the UART; every event is fed to the
/// bootloader handshake.
pub struct LineControl<M, T> {
    translator: SerialConfigTranslator,
    handshake: BootloaderHandshake<M, T>,
}

impl<M: BootKeyMemory, T: ResetTimer> LineControl<M, T> {
    pub fn new(translator: SerialConfigTranslator, handshake: BootloaderHandshake<M, T>) -> Self {
        Self {
            translator,
            handshake,
        }
    }

    /// Handle a line encoding or control line change from the host.
    pub fn on_line_state<R: UartConfig>(&mut self, uart: &mut R, state: &HostLineState) -> ArmState {
        if self.translator.current() != Some(&state.encoding) {
            self.translator.apply(uart, &state.encoding);
        }
        self.handshake.on_line_state(state.encoding.baud, state.dtr)
    }

    /// Periodic service from the bridge loop.
    #[inline]
    pub fn service(&mut self) {
        self.handshake.service();
    }

    pub fn translator(&self) -> &SerialConfigTranslator {
        &self.translator
    }

    pub fn translator_mut(&mut self) -> &mut SerialConfigTranslator {
        &mut self.translator
    }

    pub fn handshake(&self) -> &BootloaderHandshake<M, T> {
        &self.handshake
    }
}
