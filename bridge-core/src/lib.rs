//! Platform-agnostic UART to USB CDC bridge engine.
//!
//! This crate holds everything about the bridge that does not depend on a
//! particular chip or USB stack. It runs in `no_std` firmware and on the host
//! for testing.
//!
//! # Overview
//!
//! - [`ring_buffer`]: single-producer/single-consumer byte buffer over
//!   `heapless::spsc` ([`RingBuffer`])
//! - [`context`]: receive buffer and flush timing shared with the UART
//!   interrupt ([`BridgeContext`], [`RxProducer`], [`RxConsumer`])
//! - [`scheduler`]: the polling loop ([`BridgeScheduler`])
//! - [`line_coding`]: host line encodings and their UART translation
//!   ([`SerialConfigTranslator`])
//! - [`handshake`]: 1200 baud touch bootloader entry ([`BootloaderHandshake`])
//! - [`reset`]: reset timer over a hardware watchdog ([`WatchdogResetTimer`])
//! - [`status`]: USB link state for the status LED ([`LinkStatus`])
//! - [`control`]: dispatch of host line-state events ([`LineControl`])
//! - [`usb`], [`uart`]: traits implemented by board code
//!
//! # Data flow
//!
//! ```text
//!  UART RX IRQ ──► RxProducer ──► RingBuffer ──► RxConsumer ──► UsbSerial (IN)
//!  UsbSerial (OUT) ───────────── BridgeScheduler ────────────► UartPort (TX)
//!  host line state ──► LineControl ──► SerialConfigTranslator ─► UartConfig
//!                                  └─► BootloaderHandshake ────► BootKeyMemory, ResetTimer
//! ```
//!
//! # Example
//!
//! ```
//! use bridge_core::BridgeContext;
//!
//! let mut context = BridgeContext::<16>::new();
//! let (mut producer, consumer) = context.split();
//!
//! consumer.set_usb_configured(true);
//! producer.on_byte(b'a', 0);
//! producer.on_byte(b'b', 10);
//!
//! // Flushes once the line has been quiet for twice the last gap
//! assert_eq!(consumer.timeout(), 20);
//! assert!(!consumer.should_flush(25));
//! assert!(consumer.should_flush(30));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and control-path log events
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod context;
pub mod control;
pub mod handshake;
pub mod line_coding;
pub mod reset;
pub mod ring_buffer;
pub mod scheduler;
pub mod status;
pub mod uart;
pub mod usb;

// Re-export main types at crate root
pub use context::{BridgeContext, RxConsumer, RxProducer, TickSource, RX_BUFFER_SIZE};
pub use control::{HostLineState, LineControl};
pub use handshake::{
    ArmState, BootKeyMemory, BootKeySlot, BootloaderHandshake, ResetTimer, ARM_RESET_DELAY,
    BOOTLOADER_BAUD, BOOTLOADER_SIGNATURE, CANCEL_GUARD_DELAY, MAGIC_KEY,
};
pub use line_coding::{
    double_speed_divisor, effective_baud, fractional_divisors, FrameFormat, LineEncoding, Parity,
    SerialConfigTranslator, StopBits, MAX_INTEGER_DIVISOR,
};
pub use reset::{ResetWatchdog, WatchdogResetTimer};
pub use ring_buffer::{BufferFull, Consumer, Producer, RingBuffer};
pub use scheduler::BridgeScheduler;
pub use status::{LinkStatus, SharedLinkStatus};
pub use uart::{UartConfig, UartPort};
pub use usb::{SendError, UsbSerial};
