//! Shared hardware-visible signal state.
//!
//! Models the three lines the host computer can observe — the latched
//! address, LRQ (busy/ready, active low on the wire) and SBY (standby) —
//! plus the last sampled ALD level used for edge detection.
//!
//! Internal polarity: `busy == true` means "may not accept a new address";
//! the HAL inverts to the wire's active-low LRQ when driving the pin.
//!
//! # Concurrency
//!
//! One writer per field: the protocol monitor (core 0) writes the latch,
//! the ALD mirror and the busy/standby pair at acceptance; the playback
//! engine (core 1) writes the busy/standby pair at completion. The two
//! never write concurrently because completion only happens after
//! acceptance and before the next acceptance (single-slot channel).
//!
//! Busy and standby live in one atomic byte so `standby == !busy` holds at
//! every externally observable instant — there is no window where a reader
//! can see both asserted or both clear.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Busy bit in the line byte.
const LINE_BUSY: u8 = 0x01;
/// Standby bit in the line byte.
const LINE_STANDBY: u8 = 0x02;

/// Shared signal state, one instance per emulator, process lifetime.
pub struct SignalState {
    /// Last address accepted on an ALD edge (0-63).
    latched_address: AtomicU8,
    /// Busy/standby pair, single byte so both flip in one store.
    lines: AtomicU8,
    /// Previous sampled ALD level (edge detection state).
    last_ald_level: AtomicBool,
}

impl SignalState {
    /// Create the power-on state: ready, standby, ALD idle high.
    pub const fn new() -> Self {
        Self {
            latched_address: AtomicU8::new(0),
            lines: AtomicU8::new(LINE_STANDBY),
            last_ald_level: AtomicBool::new(true),
        }
    }

    /// Enter a playback session: latch the address, raise busy, drop
    /// standby. Written only by the protocol monitor.
    #[inline]
    pub fn begin_session(&self, address: u8) {
        self.latched_address.store(address, Ordering::Release);
        self.lines.store(LINE_BUSY, Ordering::Release);
    }

    /// Leave a playback session: drop busy, raise standby. Written only by
    /// the playback engine.
    #[inline]
    pub fn end_session(&self) {
        self.lines.store(LINE_STANDBY, Ordering::Release);
    }

    /// True while a session is in flight (new addresses are not accepted).
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.lines.load(Ordering::Acquire) & LINE_BUSY != 0
    }

    /// True while idle (not vocalizing). Complements [`is_busy`].
    ///
    /// [`is_busy`]: Self::is_busy
    #[inline]
    pub fn is_standby(&self) -> bool {
        self.lines.load(Ordering::Acquire) & LINE_STANDBY != 0
    }

    /// Last accepted address.
    #[inline]
    pub fn latched_address(&self) -> u8 {
        self.latched_address.load(Ordering::Acquire)
    }

    /// Previous sampled ALD level.
    #[inline]
    pub fn ald_level(&self) -> bool {
        self.last_ald_level.load(Ordering::Acquire)
    }

    /// Record the ALD level sampled this poll.
    #[inline]
    pub fn set_ald_level(&self, level: bool) {
        self.last_ald_level.store(level, Ordering::Release);
    }

    /// Consistent snapshot for the command facade.
    ///
    /// Busy and standby come from a single atomic load, so the snapshot can
    /// never show the invariant violated.
    #[inline]
    pub fn snapshot(&self) -> SignalSnapshot {
        let lines = self.lines.load(Ordering::Acquire);
        SignalSnapshot {
            latched_address: self.latched_address.load(Ordering::Acquire),
            busy: lines & LINE_BUSY != 0,
            standby: lines & LINE_STANDBY != 0,
        }
    }
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the externally visible lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub latched_address: u8,
    pub busy: bool,
    pub standby: bool,
}
