//! Runtime configuration.
//!
//! A handful of tunables, each an atomic so both cores read them lock-free
//! mid-loop. Setters bump a generation counter; the interface loop reloads
//! its cached copies when the generation moves, the same scheme the
//! protocol uses to avoid re-reading config in the hot path.
//!
//! Safety: RT-safe. All access via atomics, no locks.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};

/// Global configuration instance.
pub static CONFIG: EmulatorConfig = EmulatorConfig::new();

/// Lock-free emulator parameters.
pub struct EmulatorConfig {
    /// Extra polls the ALD line must stay low before an edge is accepted.
    /// 0 reproduces the original chip's sample-at-edge behavior.
    debounce_polls: AtomicU8,

    /// Interface-loop poll period in microseconds.
    poll_interval_us: AtomicU32,

    /// Speak a short demo sequence at boot.
    startup_demo: AtomicBool,

    /// Bumped on every set; consumers cache against it.
    generation: AtomicU16,
}

impl EmulatorConfig {
    pub const fn new() -> Self {
        Self {
            debounce_polls: AtomicU8::new(0),
            poll_interval_us: AtomicU32::new(10),
            startup_demo: AtomicBool::new(false),
            generation: AtomicU16::new(0),
        }
    }

    #[inline]
    pub fn debounce_polls(&self) -> u8 {
        self.debounce_polls.load(Ordering::Relaxed)
    }

    pub fn set_debounce_polls(&self, polls: u8) {
        self.debounce_polls.store(polls, Ordering::Relaxed);
        self.bump();
    }

    #[inline]
    pub fn poll_interval_us(&self) -> u32 {
        self.poll_interval_us.load(Ordering::Relaxed)
    }

    pub fn set_poll_interval_us(&self, interval: u32) {
        self.poll_interval_us
            .store(interval.max(1), Ordering::Relaxed);
        self.bump();
    }

    #[inline]
    pub fn startup_demo(&self) -> bool {
        self.startup_demo.load(Ordering::Relaxed)
    }

    pub fn set_startup_demo(&self, enabled: bool) {
        self.startup_demo.store(enabled, Ordering::Relaxed);
        self.bump();
    }

    /// Current generation number.
    #[inline]
    pub fn generation(&self) -> u16 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
