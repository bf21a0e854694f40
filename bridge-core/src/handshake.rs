//! Bootloader entry via the "1200 baud touch".
//!
//! A host requests firmware update mode by opening the port at 1200 baud and
//! closing it again (dropping DTR). The handshake writes [`MAGIC_KEY`] into a
//! slot that survives a reset and lets the watchdog reset the device; the
//! bootloader finds the key on the next boot and stays in update mode.
//!
//! Two bootloader generations look for the key in different places. Newer ones
//! carry [`BOOTLOADER_SIGNATURE`] in program memory and read a slot that the
//! application never touches. Older ones only read a slot inside application
//! memory, so whatever lived there is backed up on arm and put back on cancel.

use core::time::Duration;

/// Baud rate that, combined with DTR low, requests bootloader entry.
pub const BOOTLOADER_BAUD: u32 = 1200;

/// Value the bootloader looks for after reset.
pub const MAGIC_KEY: u16 = 0x7777;

/// Program memory signature of bootloaders that read the modern slot.
pub const BOOTLOADER_SIGNATURE: u16 = 0xDCFB;

/// Delay between arming and the reset, leaving time for the USB stack to
/// acknowledge the host's requests.
pub const ARM_RESET_DELAY: Duration = Duration::from_millis(120);

/// Guard window started on cancel while the host settles DTR.
pub const CANCEL_GUARD_DELAY: Duration = Duration::from_millis(250);

/// Location the magic key is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootKeySlot {
    /// Lower location shared with application memory (older bootloaders).
    Legacy,
    /// Reserved high location (bootloaders carrying the signature).
    Modern,
}

impl BootKeySlot {
    /// Pick the slot the installed bootloader reads.
    #[must_use]
    pub fn probe<M: BootKeyMemory>(memory: &M) -> Self {
        if memory.read_signature() == BOOTLOADER_SIGNATURE {
            BootKeySlot::Modern
        } else {
            BootKeySlot::Legacy
        }
    }
}

/// Memory that survives a watchdog reset, plus the program memory probe.
pub trait BootKeyMemory {
    /// Read the bootloader signature word from program memory.
    fn read_signature(&self) -> u16;

    fn read_slot(&self, slot: BootKeySlot) -> u16;

    fn write_slot(&mut self, slot: BootKeySlot, value: u16);
}

/// Watchdog-style delayed reset.
///
/// Each call supersedes whatever was scheduled before.
pub trait ResetTimer {
    /// Reset the device once `delay` has elapsed.
    fn schedule_reset(&mut self, delay: Duration);

    /// Drop any pending reset.
    fn cancel(&mut self);

    /// Start a guard window. It runs out on its own and never resets the
    /// device.
    fn start_guard(&mut self, window: Duration);

    /// Called from the bridge loop on every iteration.
    fn service(&mut self) {}
}

/// Handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmState {
    Idle,
    /// Magic key written and reset scheduled.
    Armed {
        slot: BootKeySlot,
        /// Value displaced from the legacy slot.
        backup: Option<u16>,
    },
    /// Reset cancelled, slot being cleared.
    ///
    /// Transient: only held while a cancel runs, so
    /// [`BootloaderHandshake::on_line_state`] never returns it.
    Cancelling {
        slot: BootKeySlot,
        backup: Option<u16>,
    },
}

/// Bootloader entry state machine.
pub struct BootloaderHandshake<M, T> {
    memory: M,
    timer: T,
    slot: BootKeySlot,
    state: ArmState,
}

impl<M: BootKeyMemory, T: ResetTimer> BootloaderHandshake<M, T> {
    /// Create the handshake, probing program memory for the slot to use.
    pub fn new(memory: M, timer: T) -> Self {
        let slot = BootKeySlot::probe(&memory);
        Self::with_slot(memory, timer, slot)
    }

    /// Create the handshake with an explicit slot.
    pub fn with_slot(memory: M, timer: T, slot: BootKeySlot) -> Self {
        Self {
            memory,
            timer,
            slot,
            state: ArmState::Idle,
        }
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> BootKeySlot {
        self.slot
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ArmState {
        self.state
    }

    /// React to a line encoding or control line change.
    ///
    /// Arms when the port sits at [`BOOTLOADER_BAUD`] with DTR dropped and
    /// cancels on anything else. Returns the resulting state.
    pub fn on_line_state(&mut self, baud: u32, dtr: bool) -> ArmState {
        if baud == BOOTLOADER_BAUD && !dtr {
            self.arm();
        } else {
            self.cancel();
        }
        self.state
    }

    /// Forward the loop's periodic service to the reset timer.
    #[inline]
    pub fn service(&mut self) {
        self.timer.service();
    }

    fn arm(&mut self) {
        let slot = self.slot;
        let backup = match (self.state, slot) {
            // Already armed: the slot holds the key, keep the original backup
            (ArmState::Armed { backup, .. }, _) => backup,
            (_, BootKeySlot::Legacy) => Some(self.memory.read_slot(slot)),
            (_, BootKeySlot::Modern) => None,
        };

        self.memory.write_slot(slot, MAGIC_KEY);
        self.timer.schedule_reset(ARM_RESET_DELAY);
        self.state = ArmState::Armed { slot, backup };

        #[cfg(feature = "defmt")]
        defmt::info!("bootloader entry armed ({})", slot);
    }

    fn cancel(&mut self) {
        #[cfg(feature = "defmt")]
        let was_armed = matches!(self.state, ArmState::Armed { .. });

        let slot = self.slot;
        let backup = match self.state {
            ArmState::Armed { backup, .. } | ArmState::Cancelling { backup, .. } => backup,
            ArmState::Idle => None,
        };
        self.state = ArmState::Cancelling { slot, backup };

        self.timer.cancel();
        self.timer.start_guard(CANCEL_GUARD_DELAY);

        match slot {
            BootKeySlot::Legacy => {
                // Without a backup nothing was ever written to application memory
                if let Some(value) = backup {
                    self.memory.write_slot(slot, value);
                }
            }
            BootKeySlot::Modern => self.memory.write_slot(slot, 0),
        }

        self.state = ArmState::Idle;

        #[cfg(feature = "defmt")]
        if was_armed {
            defmt::info!("bootloader entry cancelled");
        }
    }

    /// Get a reference to the persistent memory.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Get a reference to the reset timer.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Get a mutable reference to the reset timer.
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Decompose the handshake into its memory and timer.
    pub fn into_parts(self) -> (M, T) {
        (self.memory, self.timer)
    }
}
