//! Fault state management for RustSp0256Emulator.
//!
//! Garbage audio is worse than silence. A synthesizer that plays the wrong
//! samples sounds broken to the host; one that goes quiet and reports a
//! fault is diagnosable. If in doubt, FAULT and stop.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Fault codes indicating why synthesis stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// A valid address had no descriptor in the allophone table.
    /// The table is incomplete; rendering would emit garbage.
    UnknownAllophone = 1,

    /// The single-slot channel was full at acceptance time.
    /// The busy-gating invariant was violated; protocol state is suspect.
    ChannelOverrun = 2,

    /// The sample bank asset failed to decode at startup.
    BankError = 3,

    /// GPIO or peripheral error.
    HardwareFault = 4,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::UnknownAllophone,
            2 => FaultCode::ChannelOverrun,
            3 => FaultCode::BankError,
            4 => FaultCode::HardwareFault,
            _ => FaultCode::None,
        }
    }
}

/// Thread-safe latched fault state.
///
/// Set by whichever loop detects the violation, checked by both loops every
/// iteration. While active, the protocol monitor ignores edges and the
/// playback engine refuses requests.
///
/// # Usage
///
/// ```ignore
/// static FAULT: FaultState = FaultState::new();
///
/// // In the render loop:
/// if table.get(id).is_none() {
///     FAULT.set(FaultCode::UnknownAllophone, id as u32);
///     return Err(FaultCode::UnknownAllophone);
/// }
///
/// // In the interface loop:
/// if FAULT.is_active() {
///     // edges ignored until cleared
/// }
/// ```
pub struct FaultState {
    /// True if fault is active.
    active: AtomicBool,

    /// Fault code (reason for fault).
    code: AtomicU8,

    /// Additional data (e.g., the offending allophone id).
    data: AtomicU32,

    /// Total fault count since boot (never cleared).
    count: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Set fault state.
    ///
    /// Atomically marks the fault active with the given code and data and
    /// increments the fault counter.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Check if fault is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Get fault data (meaning depends on fault code).
    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Get total fault count since boot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear fault state (after recovery).
    ///
    /// Note: This clears the active flag but does NOT reset the counter.
    /// Fault history is preserved for diagnostics.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Get a snapshot of the current fault state.
    #[inline]
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            active: self.is_active(),
            code: self.code(),
            data: self.data(),
            count: self.count(),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug)]
pub struct FaultSnapshot {
    pub active: bool,
    pub code: FaultCode,
    pub data: u32,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let fault = FaultState::new();

        assert!(!fault.is_active());
        assert_eq!(fault.code(), FaultCode::None);
        assert_eq!(fault.count(), 0);

        fault.set(FaultCode::UnknownAllophone, 42);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::UnknownAllophone);
        assert_eq!(fault.data(), 42);
        assert_eq!(fault.count(), 1);

        fault.clear();

        assert!(!fault.is_active());
        assert_eq!(fault.count(), 1); // Count preserved
    }

    #[test]
    fn test_fault_count_accumulates() {
        let fault = FaultState::new();

        fault.set(FaultCode::ChannelOverrun, 1);
        fault.clear();
        fault.set(FaultCode::UnknownAllophone, 2);
        fault.clear();
        fault.set(FaultCode::ChannelOverrun, 3);

        assert_eq!(fault.count(), 3);
    }

    #[test]
    fn test_fault_code_round_trip() {
        for code in [
            FaultCode::None,
            FaultCode::UnknownAllophone,
            FaultCode::ChannelOverrun,
            FaultCode::BankError,
            FaultCode::HardwareFault,
        ] {
            assert_eq!(FaultCode::from_u8(code as u8), code);
        }
    }
}
