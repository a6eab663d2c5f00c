//! Single-slot inter-core request channel.
//!
//! The hardware chip accepts exactly one pending address at a time, so the
//! handoff between the interface core and the synthesis core is a single
//! slot, not a queue:
//!
//! ```text
//! ProtocolMonitor ──try_publish──▶ RequestSlot ──try_take──▶ PlaybackEngine
//!    (core 0)                      (lock-free)                  (core 1)
//! ```
//!
//! # Rules
//!
//! - Producer side is wait-free: edge detection must never stall.
//! - Consumer side is wait-free too; "blocking receive" is poll + idle in
//!   the synthesis task.
//! - A request is observed exactly once: never duplicated, never lost.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU8, Ordering};

/// A latched playback request, moved from the interface core to the
/// synthesis core. Single owner at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackRequest {
    /// Allophone address latched from the bus (0-63).
    pub allophone_id: u8,
}

const SLOT_EMPTY: u8 = 0;
const SLOT_FULL: u8 = 1;

/// Lock-free single-slot SPSC channel.
///
/// # Safety
///
/// Uses `UnsafeCell` internally but is safe to use because:
/// - Single producer, single consumer (enforced by design, not by type system)
/// - The producer writes the slot only while `state == EMPTY`, the consumer
///   reads it only while `state == FULL`
/// - `state` transitions use release stores / acquire loads, so the payload
///   write is visible across cores before the FULL flag is
pub struct RequestSlot {
    state: AtomicU8,
    slot: UnsafeCell<PlaybackRequest>,
}

// SAFETY: single producer, single consumer, atomic coordination via `state`.
unsafe impl Sync for RequestSlot {}
unsafe impl Send for RequestSlot {}

impl RequestSlot {
    /// Create a new empty slot.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(SLOT_EMPTY),
            slot: UnsafeCell::new(PlaybackRequest { allophone_id: 0 }),
        }
    }

    /// Publish a request (producer side, wait-free).
    ///
    /// Returns the request back if the slot is still occupied. Under the
    /// busy-gating protocol this cannot happen; the caller treats it as a
    /// consistency violation.
    ///
    /// # Timing
    ///
    /// O(1), two atomic ops. Never blocks, never allocates.
    #[inline]
    pub fn try_publish(&self, request: PlaybackRequest) -> Result<(), PlaybackRequest> {
        if self.state.load(Ordering::Acquire) != SLOT_EMPTY {
            return Err(request);
        }

        // SAFETY: slot is EMPTY, so the consumer will not read until the
        // FULL store below; single producer means no write aliasing.
        unsafe {
            *self.slot.get() = request;
        }

        self.state.store(SLOT_FULL, Ordering::Release);
        Ok(())
    }

    /// Take the pending request, if any (consumer side, wait-free).
    ///
    /// # Timing
    ///
    /// O(1), two atomic ops. Never blocks.
    #[inline]
    pub fn try_take(&self) -> Option<PlaybackRequest> {
        if self.state.load(Ordering::Acquire) != SLOT_FULL {
            return None;
        }

        // SAFETY: slot is FULL, so the producer will not write until the
        // EMPTY store below; single consumer means no read aliasing.
        let request = unsafe { *self.slot.get() };

        self.state.store(SLOT_EMPTY, Ordering::Release);
        Some(request)
    }

    /// Check whether a request is pending.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.state.load(Ordering::Acquire) == SLOT_FULL
    }
}

impl Default for RequestSlot {
    fn default() -> Self {
        Self::new()
    }
}
