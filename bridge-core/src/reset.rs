//! [`ResetTimer`] on top of a hardware watchdog.
//!
//! Only a scheduled reset ever reaches the watchdog. The cancel guard is a
//! deadline kept in software against a [`TickSource`], so a bridge loop that
//! spends a long time draining a slow UART can never trip it.

use crate::context::TickSource;
use crate::handshake::ResetTimer;
use core::time::Duration;

/// Watchdog that resets the device when it is not stopped in time.
pub trait ResetWatchdog {
    /// Start counting down; the device resets once `timeout` has elapsed.
    fn start(&mut self, timeout: Duration);

    /// Stop the countdown.
    fn stop(&mut self);
}

/// Reset timer driving a [`ResetWatchdog`].
pub struct WatchdogResetTimer<W, C> {
    watchdog: W,
    clock: C,
    tick_hz: u32,
    reset_pending: bool,
    /// Tick at which the guard window ends.
    guard_until: Option<u32>,
}

impl<W: ResetWatchdog, C: TickSource> WatchdogResetTimer<W, C> {
    /// Create the timer. `tick_hz` is the rate of `clock`.
    pub fn new(watchdog: W, clock: C, tick_hz: u32) -> Self {
        Self {
            watchdog,
            clock,
            tick_hz,
            reset_pending: false,
            guard_until: None,
        }
    }

    /// Whether a reset is committed to the watchdog.
    #[inline]
    #[must_use]
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Whether a guard window is still running.
    #[inline]
    #[must_use]
    pub fn guard_active(&self) -> bool {
        self.guard_until.is_some()
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }

    fn ticks(&self, duration: Duration) -> u32 {
        let ticks = duration.as_micros() as u64 * u64::from(self.tick_hz) / 1_000_000;
        // Deadlines are compared on signed differences
        ticks.min(i32::MAX as u64) as u32
    }
}

impl<W: ResetWatchdog, C: TickSource> ResetTimer for WatchdogResetTimer<W, C> {
    fn schedule_reset(&mut self, delay: Duration) {
        self.guard_until = None;
        self.watchdog.start(delay);
        self.reset_pending = true;
    }

    fn cancel(&mut self) {
        if self.reset_pending {
            self.watchdog.stop();
            self.reset_pending = false;
        }
    }

    fn start_guard(&mut self, window: Duration) {
        let until = self.clock.now().wrapping_add(self.ticks(window));
        self.guard_until = Some(until);
    }

    fn service(&mut self) {
        if let Some(until) = self.guard_until {
            if self.clock.now().wrapping_sub(until) as i32 >= 0 {
                self.guard_until = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::context::BridgeContext;
    use crate::control::{HostLineState, LineControl};
    use crate::handshake::{
        BootKeyMemory, BootKeySlot, BootloaderHandshake, ARM_RESET_DELAY, BOOTLOADER_BAUD,
        CANCEL_GUARD_DELAY,
    };
    use crate::line_coding::{FrameFormat, LineEncoding, SerialConfigTranslator};
    use crate::scheduler::BridgeScheduler;
    use crate::uart::{UartConfig, UartPort};
    use crate::usb::{SendError, UsbSerial};
    use core::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec;
    use std::vec::Vec;

    /// Microsecond clock shared between the mocks.
    #[derive(Clone)]
    struct Clock(Rc<Cell<u32>>);

    impl Clock {
        fn new(start: u32) -> Self {
            Self(Rc::new(Cell::new(start)))
        }

        fn advance(&self, ticks: u32) {
            self.0.set(self.0.get().wrapping_add(ticks));
        }
    }

    impl TickSource for Clock {
        fn now(&self) -> u32 {
            self.0.get()
        }
    }

    /// Watchdog that records its calls and fires once its countdown runs
    /// out on the shared clock.
    struct SimWatchdog {
        clock: Clock,
        deadline: Option<u32>,
        starts: Vec<Duration>,
        stops: usize,
    }

    impl SimWatchdog {
        fn new(clock: Clock) -> Self {
            Self {
                clock,
                deadline: None,
                starts: Vec::new(),
                stops: 0,
            }
        }

        fn fired(&self) -> bool {
            self.deadline
                .is_some_and(|deadline| self.clock.now().wrapping_sub(deadline) as i32 >= 0)
        }
    }

    impl ResetWatchdog for SimWatchdog {
        fn start(&mut self, timeout: Duration) {
            self.starts.push(timeout);
            self.deadline = Some(self.clock.now().wrapping_add(timeout.as_micros() as u32));
        }

        fn stop(&mut self) {
            self.stops += 1;
            self.deadline = None;
        }
    }

    fn timer(clock: &Clock) -> WatchdogResetTimer<SimWatchdog, Clock> {
        WatchdogResetTimer::new(SimWatchdog::new(clock.clone()), clock.clone(), 1_000_000)
    }

    #[test]
    fn test_reset_reaches_the_watchdog() {
        let clock = Clock::new(0);
        let mut timer = timer(&clock);

        timer.schedule_reset(ARM_RESET_DELAY);
        assert!(timer.reset_pending());
        assert_eq!(timer.watchdog().starts, vec![ARM_RESET_DELAY]);

        clock.advance(120_000);
        assert!(timer.watchdog().fired());
    }

    #[test]
    fn test_cancel_stops_a_pending_reset() {
        let clock = Clock::new(0);
        let mut timer = timer(&clock);

        timer.cancel();
        assert_eq!(timer.watchdog().stops, 0);

        timer.schedule_reset(ARM_RESET_DELAY);
        timer.cancel();
        assert!(!timer.reset_pending());
        assert_eq!(timer.watchdog().stops, 1);

        clock.advance(1_000_000);
        assert!(!timer.watchdog().fired());
    }

    #[test]
    fn test_guard_expires_in_software() {
        let clock = Clock::new(u32::MAX - 100_000);
        let mut timer = timer(&clock);

        timer.start_guard(CANCEL_GUARD_DELAY);
        assert!(timer.guard_active());
        assert!(timer.watchdog().starts.is_empty());

        clock.advance(249_999);
        timer.service();
        assert!(timer.guard_active());

        clock.advance(1);
        timer.service();
        assert!(!timer.guard_active());
        assert!(!timer.watchdog().fired());
    }

    #[test]
    fn test_arm_replaces_guard() {
        let clock = Clock::new(0);
        let mut timer = timer(&clock);

        timer.start_guard(CANCEL_GUARD_DELAY);
        timer.schedule_reset(ARM_RESET_DELAY);
        assert!(!timer.guard_active());
        assert!(timer.reset_pending());
    }

    struct NullUsb {
        from_host: VecDeque<u8>,
    }

    impl UsbSerial for NullUsb {
        fn receive_byte(&mut self) -> Option<u8> {
            self.from_host.pop_front()
        }

        fn is_in_ready(&self) -> bool {
            true
        }

        fn send_byte(&mut self, _byte: u8) -> Result<(), SendError> {
            Ok(())
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    /// UART whose transmitter takes one character time per byte at the
    /// programmed rate.
    struct SlowUart {
        clock: Clock,
        byte_ticks: u32,
        sent: usize,
    }

    impl UartPort for SlowUart {
        fn is_send_ready(&self) -> bool {
            true
        }

        fn send_byte(&mut self, _byte: u8) {
            self.clock.advance(self.byte_ticks);
            self.sent += 1;
        }
    }

    impl UartConfig for SlowUart {
        fn hold_tx_idle(&mut self) {}

        fn disable(&mut self) {}

        fn set_baud_divisor(&mut self, _divisor: u32, baud: u32) {
            // Ten bits per character at 1 MHz
            self.byte_ticks = 10_000_000 / baud;
        }

        fn set_frame_format(&mut self, _format: FrameFormat) {}

        fn enable(&mut self) {}

        fn release_tx(&mut self) {}
    }

    #[derive(Default)]
    struct Slots {
        legacy: u16,
    }

    impl BootKeyMemory for Slots {
        fn read_signature(&self) -> u16 {
            0
        }

        fn read_slot(&self, _slot: BootKeySlot) -> u16 {
            self.legacy
        }

        fn write_slot(&mut self, _slot: BootKeySlot, value: u16) {
            self.legacy = value;
        }
    }

    fn line(baud: u32, dtr: bool) -> HostLineState {
        HostLineState {
            encoding: LineEncoding {
                baud,
                ..LineEncoding::DEFAULT
            },
            dtr,
            rts: false,
        }
    }

    #[test]
    fn test_slow_drain_inside_guard_never_resets() {
        let clock = Clock::new(0);
        let mut context = BridgeContext::<16>::new();
        let (_producer, consumer) = context.split();

        let usb = NullUsb {
            from_host: (0..64).collect(),
        };
        let uart = SlowUart {
            clock: clock.clone(),
            byte_ticks: 0,
            sent: 0,
        };
        let mut scheduler = BridgeScheduler::new(consumer, usb, uart, clock.clone());
        let mut control = LineControl::new(
            SerialConfigTranslator::new(16_000_000),
            BootloaderHandshake::new(Slots::default(), timer(&clock)),
        );

        // Opening the port at 2400 baud cancels and starts the guard
        control.on_line_state(scheduler.uart_mut(), &line(2400, true));
        assert_eq!(scheduler.uart().byte_ticks, 4166);
        assert!(control.handshake().timer().guard_active());

        let start = clock.now();
        scheduler.poll();
        control.service();

        assert_eq!(scheduler.uart().sent, 64);
        assert!(clock.now().wrapping_sub(start) > 250_000);
        assert!(!control.handshake().timer().guard_active());
        let watchdog = control.handshake().timer().watchdog();
        assert!(watchdog.starts.is_empty());
        assert!(!watchdog.fired());
    }

    #[test]
    fn test_touch_still_resets_after_guard() {
        let clock = Clock::new(0);
        let mut uart = SlowUart {
            clock: clock.clone(),
            byte_ticks: 0,
            sent: 0,
        };
        let mut control = LineControl::new(
            SerialConfigTranslator::new(16_000_000),
            BootloaderHandshake::new(Slots::default(), timer(&clock)),
        );

        control.on_line_state(&mut uart, &line(BOOTLOADER_BAUD, true));
        control.on_line_state(&mut uart, &line(BOOTLOADER_BAUD, false));
        let timer = control.handshake().timer();
        assert!(timer.reset_pending());
        assert_eq!(timer.watchdog().starts, vec![ARM_RESET_DELAY]);

        clock.advance(120_000);
        control.service();
        assert!(control.handshake().timer().watchdog().fired());
    }
}
