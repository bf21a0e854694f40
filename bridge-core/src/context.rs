//! State shared between the UART receive interrupt and the bridge loop.
//!
//! [`BridgeContext`] owns the receive ring buffer and the flush timing. Split
//! it once at startup: the [`RxProducer`] goes to the interrupt handler and the
//! [`RxConsumer`] to the [`BridgeScheduler`](crate::BridgeScheduler).

use crate::ring_buffer::{Consumer, Producer, RingBuffer};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Default receive buffer size.
pub const RX_BUFFER_SIZE: usize = 1024;

/// Free-running tick counter used to time byte arrivals.
///
/// Ticks wrap around; only differences between two readings are used.
pub trait TickSource {
    fn now(&self) -> u32;
}

/// Inter-byte timing written by the producer and read by the loop.
struct FlushTiming {
    /// Tick of the most recently accepted byte.
    last_rx: AtomicU32,
    /// Ticks to wait after the last byte before flushing a partial buffer.
    timeout: AtomicU32,
    /// Bytes are only accepted while the host has configured the device.
    usb_configured: AtomicBool,
}

impl FlushTiming {
    const fn new() -> Self {
        Self {
            last_rx: AtomicU32::new(0),
            timeout: AtomicU32::new(0),
            usb_configured: AtomicBool::new(false),
        }
    }
}

/// Receive buffer plus flush timing, sized for `N` bytes.
pub struct BridgeContext<const N: usize> {
    buffer: RingBuffer<N>,
    timing: FlushTiming,
}

impl<const N: usize> BridgeContext<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: RingBuffer::new(),
            timing: FlushTiming::new(),
        }
    }

    /// Split into the interrupt-side producer and the loop-side consumer.
    pub fn split(&mut self) -> (RxProducer<'_, N>, RxConsumer<'_, N>) {
        let (producer, consumer) = self.buffer.split();
        let timing = &self.timing;
        (
            RxProducer {
                buffer: producer,
                timing,
            },
            RxConsumer {
                buffer: consumer,
                timing,
            },
        )
    }
}

impl<const N: usize> Default for BridgeContext<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive-interrupt side of the bridge.
pub struct RxProducer<'a, const N: usize> {
    buffer: Producer<'a, N>,
    timing: &'a FlushTiming,
}

impl<const N: usize> RxProducer<'_, N> {
    /// Store a byte received by the UART at tick `now`.
    ///
    /// Returns `false` when the byte was dropped, either because the host has
    /// not configured the device or because the buffer is full. Drops are
    /// silent.
    ///
    /// When the byte joins bytes still waiting to be flushed, the flush
    /// timeout becomes twice the gap since the previous byte.
    pub fn on_byte(&mut self, byte: u8, now: u32) -> bool {
        if !self.timing.usb_configured.load(Ordering::Acquire) || self.buffer.is_full() {
            return false;
        }

        if self.buffer.count() > 0 {
            let last = self.timing.last_rx.load(Ordering::Relaxed);
            let gap = now.wrapping_sub(last);
            self.timing
                .timeout
                .store(gap.saturating_mul(2), Ordering::Release);
        }
        self.timing.last_rx.store(now, Ordering::Release);

        self.buffer.insert(byte).is_ok()
    }
}

/// Bridge-loop side of the receive path.
pub struct RxConsumer<'a, const N: usize> {
    buffer: Consumer<'a, N>,
    timing: &'a FlushTiming,
}

impl<const N: usize> RxConsumer<'_, N> {
    /// Number of received bytes waiting for the host.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.count()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Current flush timeout in ticks.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> u32 {
        self.timing.timeout.load(Ordering::Acquire)
    }

    /// Decide whether buffered bytes should be pushed to the host at `now`.
    ///
    /// Flushes once the line has been quiet for the adaptive timeout, or as
    /// soon as more than half the buffer is used.
    #[must_use]
    pub fn should_flush(&self, now: u32) -> bool {
        let pending = self.pending();
        if pending > self.capacity() / 2 {
            return true;
        }
        if pending == 0 {
            return false;
        }
        let last = self.timing.last_rx.load(Ordering::Acquire);
        now.wrapping_sub(last) >= self.timeout()
    }

    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.buffer.peek()
    }

    #[inline]
    pub fn remove(&mut self) -> Option<u8> {
        self.buffer.remove()
    }

    /// Publish whether the host has configured the device.
    #[inline]
    pub fn set_usb_configured(&self, configured: bool) {
        self.timing
            .usb_configured
            .store(configured, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn usb_configured(&self) -> bool {
        self.timing.usb_configured.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_dropped_until_configured() {
        let mut context = BridgeContext::<8>::new();
        let (mut producer, consumer) = context.split();

        assert!(!producer.on_byte(1, 0));
        assert_eq!(consumer.pending(), 0);

        consumer.set_usb_configured(true);
        assert!(producer.on_byte(1, 0));
        assert_eq!(consumer.pending(), 1);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let mut context = BridgeContext::<4>::new();
        let (mut producer, mut consumer) = context.split();
        consumer.set_usb_configured(true);
        let capacity = consumer.capacity() as u8;

        for byte in 10..10 + capacity {
            assert!(producer.on_byte(byte, u32::from(byte)));
        }
        let timeout = consumer.timeout();
        assert!(!producer.on_byte(99, 1000));

        // The dropped byte leaves contents and timing untouched
        assert_eq!(consumer.timeout(), timeout);
        for byte in 10..10 + capacity {
            assert_eq!(consumer.remove(), Some(byte));
        }
        assert_eq!(consumer.remove(), None);
    }

    #[test]
    fn test_timeout_is_twice_the_gap() {
        let mut context = BridgeContext::<16>::new();
        let (mut producer, consumer) = context.split();
        consumer.set_usb_configured(true);

        producer.on_byte(b'a', 100);
        // First byte into an empty buffer keeps the previous timeout
        assert_eq!(consumer.timeout(), 0);

        producer.on_byte(b'b', 110);
        assert_eq!(consumer.timeout(), 20);

        producer.on_byte(b'c', 135);
        assert_eq!(consumer.timeout(), 50);
    }

    #[test]
    fn test_timeout_handles_tick_wraparound() {
        let mut context = BridgeContext::<16>::new();
        let (mut producer, consumer) = context.split();
        consumer.set_usb_configured(true);

        producer.on_byte(1, u32::MAX - 4);
        producer.on_byte(2, 5);
        assert_eq!(consumer.timeout(), 20);
        assert!(!consumer.should_flush(10));
        assert!(consumer.should_flush(25));
    }

    #[test]
    fn test_should_flush_after_timeout() {
        let mut context = BridgeContext::<16>::new();
        let (mut producer, consumer) = context.split();
        consumer.set_usb_configured(true);

        producer.on_byte(1, 0);
        producer.on_byte(2, 10);
        producer.on_byte(3, 20);
        assert_eq!(consumer.timeout(), 20);

        assert!(!consumer.should_flush(20));
        assert!(!consumer.should_flush(39));
        assert!(consumer.should_flush(40));
    }

    #[test]
    fn test_should_flush_above_half_capacity() {
        let mut context = BridgeContext::<16>::new();
        let (mut producer, consumer) = context.split();
        consumer.set_usb_configured(true);

        let half = (consumer.capacity() / 2) as u32;

        for i in 0..half {
            producer.on_byte(i as u8, i * 10);
        }
        // Exactly half: still waiting on the timeout
        assert!(!consumer.should_flush((half - 1) * 10));

        producer.on_byte(half as u8, half * 10);
        assert!(consumer.should_flush(half * 10));
    }

    #[test]
    fn test_empty_buffer_never_flushes() {
        let mut context = BridgeContext::<16>::new();
        let (_producer, consumer) = context.split();
        assert!(!consumer.should_flush(u32::MAX));
    }
}
