//! BridgeScheduler: the cooperative loop moving bytes between USB and UART.

use crate::context::{RxConsumer, TickSource};
use crate::uart::UartPort;
use crate::usb::UsbSerial;

/// Polling loop forwarding bytes in both directions.
///
/// Host-to-device bytes go out on the UART immediately. Device-to-host bytes
/// collect in the receive buffer and are flushed to USB when the line goes
/// quiet or the buffer passes half full, trading a little latency for fewer,
/// fuller USB transactions.
pub struct BridgeScheduler<'a, U, P, C, const N: usize> {
    rx: RxConsumer<'a, N>,
    usb: U,
    uart: P,
    clock: C,
}

impl<'a, U, P, C, const N: usize> BridgeScheduler<'a, U, P, C, N>
where
    U: UsbSerial,
    P: UartPort,
    C: TickSource,
{
    /// Create a scheduler from the loop side of a
    /// [`BridgeContext`](crate::BridgeContext) and its collaborators.
    pub fn new(rx: RxConsumer<'a, N>, usb: U, uart: P, clock: C) -> Self {
        Self {
            rx,
            usb,
            uart,
            clock,
        }
    }

    /// Run the bridge forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    /// One loop iteration: USB to UART, UART to USB, then USB housekeeping.
    pub fn poll(&mut self) {
        self.forward_usb_to_uart();
        self.flush_uart_to_usb();
        self.service_usb();
    }

    /// Drain everything the host sent into the UART.
    ///
    /// Spins on the UART transmitter for each byte. Returns the number of
    /// bytes forwarded.
    pub fn forward_usb_to_uart(&mut self) -> usize {
        let mut forwarded = 0;
        while let Some(byte) = self.usb.receive_byte() {
            while !self.uart.is_send_ready() {
                core::hint::spin_loop();
            }
            self.uart.send_byte(byte);
            forwarded += 1;
        }
        forwarded
    }

    /// Push buffered UART bytes to the host if the flush policy says so.
    ///
    /// Bytes are only removed once the USB side accepted them; the first
    /// refusal stops the flush and leaves the rest queued for the next
    /// iteration. Returns the number of bytes sent.
    pub fn flush_uart_to_usb(&mut self) -> usize {
        let now = self.clock.now();
        if !self.rx.should_flush(now) || !self.usb.is_in_ready() {
            return 0;
        }

        let mut sent = 0;
        let mut remaining = self.rx.pending();
        while remaining > 0 {
            let Some(byte) = self.rx.peek() else {
                break;
            };
            if self.usb.send_byte(byte).is_err() {
                break;
            }
            self.rx.remove();
            sent += 1;
            remaining -= 1;
        }
        sent
    }

    /// Let the USB stack do its periodic work and track its configuration.
    pub fn service_usb(&mut self) {
        self.usb.service();
        self.rx.set_usb_configured(self.usb.is_configured());
    }

    /// Get a reference to the receive side.
    pub fn rx(&self) -> &RxConsumer<'a, N> {
        &self.rx
    }

    /// Get a reference to the USB serial port.
    pub fn usb(&self) -> &U {
        &self.usb
    }

    /// Get a mutable reference to the USB serial port.
    pub fn usb_mut(&mut self) -> &mut U {
        &mut self.usb
    }

    /// Get a reference to the UART.
    pub fn uart(&self) -> &P {
        &self.uart
    }

    /// Get a mutable reference to the UART.
    pub fn uart_mut(&mut self) -> &mut P {
        &mut self.uart
    }

    /// Decompose the scheduler into its components.
    pub fn into_parts(self) -> (RxConsumer<'a, N>, U, P, C) {
        (self.rx, self.usb, self.uart, self.clock)
    }
}
