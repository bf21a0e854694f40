//! Fixed-size byte ring buffer shared between the UART receive interrupt
//! and the bridge loop.
//!
//! A thin wrapper over [`heapless::spsc::Queue`]. The queue is
//! single-producer/single-consumer: each half only ever advances its own
//! index and the fill level is derived from both, so the interrupt and the
//! main loop never need a lock.

use heapless::spsc::{self, Queue};

/// Returned by [`RingBuffer::insert`] when there is no room for the byte.
///
/// Carries the rejected byte back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferFull(pub u8);

/// Circular byte buffer backed by `N` bytes of storage.
///
/// `N` must be a power of two; other sizes fail to compile. The number of
/// bytes it holds at once is [`capacity`](Self::capacity), never more than `N`.
///
/// # Example
///
/// ```
/// use bridge_core::RingBuffer;
///
/// let mut buffer = RingBuffer::<4>::new();
/// buffer.insert(b'a').unwrap();
/// buffer.insert(b'b').unwrap();
/// assert_eq!(buffer.peek(), Some(b'a'));
/// assert_eq!(buffer.remove(), Some(b'a'));
/// assert_eq!(buffer.count(), 1);
/// ```
pub struct RingBuffer<const N: usize> {
    queue: Queue<u8, N>,
}

impl<const N: usize> RingBuffer<N> {
    const VALID_CAPACITY: () = assert!(
        N > 1 && N.is_power_of_two(),
        "ring buffer size must be a power of two"
    );

    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            queue: Queue::new(),
        }
    }

    /// Number of bytes the buffer can hold at once.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Append a byte. A full buffer rejects it and keeps its contents.
    #[inline]
    pub fn insert(&mut self, byte: u8) -> Result<(), BufferFull> {
        self.queue.enqueue(byte).map_err(BufferFull)
    }

    /// Remove and return the oldest byte.
    #[inline]
    pub fn remove(&mut self) -> Option<u8> {
        self.queue.dequeue()
    }

    /// Return the oldest byte without removing it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.queue.peek().copied()
    }

    /// Number of bytes currently stored.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Split the buffer into its interrupt-side and loop-side halves.
    ///
    /// The exclusive borrow guarantees there is exactly one of each.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (Producer { inner: producer }, Consumer { inner: consumer })
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write side of a split [`RingBuffer`], owned by the receive interrupt.
pub struct Producer<'a, const N: usize> {
    inner: spsc::Producer<'a, u8, N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Append a byte, rejecting it when the buffer is full.
    #[inline]
    pub fn insert(&mut self, byte: u8) -> Result<(), BufferFull> {
        self.inner.enqueue(byte).map_err(BufferFull)
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.inner.ready()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

/// Read side of a split [`RingBuffer`], owned by the bridge loop.
pub struct Consumer<'a, const N: usize> {
    inner: spsc::Consumer<'a, u8, N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Remove and return the oldest byte.
    #[inline]
    pub fn remove(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }

    /// Return the oldest byte without removing it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.inner.peek().copied()
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
