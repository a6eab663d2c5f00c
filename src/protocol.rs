//! Address-load protocol state machine.
//!
//! Emulates the three-signal contract of the original chip: a falling edge
//! on ALD latches the 6-bit address bus, raises busy (LRQ) and drops
//! standby (SBY); the host must poll LRQ before sending the next address.
//!
//! Pure logic, no hardware dependencies. Consumes sampled line levels,
//! drives [`SignalState`] and publishes into the request slot. Fully
//! testable on host.
//!
//! The same acceptance path backs the command facade: `submit` is an ALD
//! edge without the line sampling.

use crate::channel::{PlaybackRequest, RequestSlot};
use crate::fault::{FaultCode, FaultState};
use crate::signal::SignalState;

/// Highest address the 6-bit bus can select.
pub use crate::allophone::ADDRESS_MAX;

/// Outcome of a submit (facade) or accepted-edge attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submit {
    /// Address latched, request published, busy raised.
    Accepted,
    /// A session is in flight (or the monitor is halted on a fault);
    /// nothing mutated. Normal chip behavior, not an error.
    RejectedBusy,
    /// Address outside 0-63; nothing mutated.
    RejectedInvalidAddress,
}

/// What a single poll observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Edge accepted, address latched and published.
    Latched(u8),
    /// Edge seen while busy; ignored per the chip contract.
    IgnoredBusy,
    /// Edge carried an out-of-range address (facade-only in practice).
    InvalidAddress,
    /// Publishing failed with the slot full: busy gating was violated.
    /// The fault is latched and the monitor halts.
    Overrun,
}

/// Edge-detecting protocol monitor.
///
/// Runs in the interface core's tight poll loop. Each `poll` compares the
/// sampled ALD level against the previous sample; a high-to-low transition
/// (the chip's documented polarity) is the trigger.
///
/// # Debounce
///
/// With `debounce_polls == 0` the address is sampled at the edge itself,
/// as the original hardware does. With N > 0 the line must stay low for N
/// further consecutive polls; the address is sampled at the confirming
/// poll and a bounce back to high cancels the pending edge.
pub struct ProtocolMonitor<'a> {
    signal: &'a SignalState,
    slot: &'a RequestSlot,
    fault: &'a FaultState,

    /// Cached from CONFIG; refreshed by the interface loop on generation
    /// change so the hot path never touches the global.
    debounce_polls: u8,

    /// Polls the line has stayed low since a falling edge (0 = no edge
    /// pending).
    pending_polls: u8,

    /// Total accepted addresses since boot.
    accepted: u32,
}

impl<'a> ProtocolMonitor<'a> {
    pub fn new(signal: &'a SignalState, slot: &'a RequestSlot, fault: &'a FaultState) -> Self {
        Self {
            signal,
            slot,
            fault,
            debounce_polls: 0,
            pending_polls: 0,
            accepted: 0,
        }
    }

    /// Update the cached debounce setting.
    pub fn set_debounce_polls(&mut self, polls: u8) {
        self.debounce_polls = polls;
        self.pending_polls = 0;
    }

    /// Total accepted addresses since boot.
    #[inline]
    pub fn accepted_count(&self) -> u32 {
        self.accepted
    }

    /// Feed one sample of the ALD line and the address bus.
    ///
    /// Called once per poll tick from the interface loop. Never blocks;
    /// the accept path is a handful of atomic stores, which is what keeps
    /// the edge-to-publish latency inside the microsecond budget.
    pub fn poll(&mut self, ald_level: bool, address: u8) -> Option<ProtocolEvent> {
        let previous = self.signal.ald_level();
        self.signal.set_ald_level(ald_level);

        // Falling edge between two consecutive samples
        if previous && !ald_level {
            if self.debounce_polls == 0 {
                return Some(self.accept_edge(address));
            }
            self.pending_polls = 1;
            return None;
        }

        if self.pending_polls > 0 {
            if ald_level {
                // Bounced back high before confirmation: glitch, discard
                self.pending_polls = 0;
                return None;
            }
            self.pending_polls = self.pending_polls.saturating_add(1);
            if self.pending_polls > self.debounce_polls {
                self.pending_polls = 0;
                return Some(self.accept_edge(address));
            }
        }

        None
    }

    /// Facade entry point: same acceptance rules as a hardware edge.
    pub fn submit(&mut self, allophone_id: u8) -> Submit {
        if allophone_id > ADDRESS_MAX {
            return Submit::RejectedInvalidAddress;
        }
        if self.fault.is_active() || self.signal.is_busy() {
            return Submit::RejectedBusy;
        }

        self.signal.begin_session(allophone_id);

        if self
            .slot
            .try_publish(PlaybackRequest { allophone_id })
            .is_err()
        {
            // Busy gating says this slot was empty; it was not. Protocol
            // state is no longer trustworthy.
            self.fault
                .set(FaultCode::ChannelOverrun, allophone_id as u32);
            return Submit::RejectedBusy;
        }

        self.accepted += 1;
        Submit::Accepted
    }

    fn accept_edge(&mut self, address: u8) -> ProtocolEvent {
        if self.fault.is_active() {
            // Halted: edges are ignored until the fault is cleared
            return ProtocolEvent::IgnoredBusy;
        }
        match self.submit(address) {
            Submit::Accepted => ProtocolEvent::Latched(address),
            Submit::RejectedBusy if self.fault.is_active() => ProtocolEvent::Overrun,
            Submit::RejectedBusy => ProtocolEvent::IgnoredBusy,
            Submit::RejectedInvalidAddress => ProtocolEvent::InvalidAddress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rig {
        signal: SignalState,
        slot: RequestSlot,
        fault: FaultState,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                signal: SignalState::new(),
                slot: RequestSlot::new(),
                fault: FaultState::new(),
            }
        }

        fn monitor(&self) -> ProtocolMonitor<'_> {
            ProtocolMonitor::new(&self.signal, &self.slot, &self.fault)
        }
    }

    #[test]
    fn test_falling_edge_latches() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        assert_eq!(monitor.poll(true, 27), None);
        assert_eq!(monitor.poll(false, 27), Some(ProtocolEvent::Latched(27)));

        assert!(rig.signal.is_busy());
        assert!(!rig.signal.is_standby());
        assert_eq!(rig.signal.latched_address(), 27);
        assert_eq!(rig.slot.try_take().unwrap().allophone_id, 27);
    }

    #[test]
    fn test_level_without_edge_does_nothing() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        // Steady high, then steady low after one edge
        assert_eq!(monitor.poll(true, 5), None);
        assert_eq!(monitor.poll(true, 5), None);
        monitor.poll(false, 5);
        assert_eq!(monitor.poll(false, 5), None);
        assert_eq!(monitor.poll(false, 5), None);

        // Rising edge is not a trigger either
        assert_eq!(monitor.poll(true, 5), None);

        assert_eq!(monitor.accepted_count(), 1);
    }

    #[test]
    fn test_edge_while_busy_ignored() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        monitor.poll(true, 27);
        assert_eq!(monitor.poll(false, 27), Some(ProtocolEvent::Latched(27)));

        // Host violates the contract: next edge before completion
        monitor.poll(true, 7);
        assert_eq!(monitor.poll(false, 7), Some(ProtocolEvent::IgnoredBusy));

        // Latch unchanged, channel still holds the first request
        assert_eq!(rig.signal.latched_address(), 27);
        assert_eq!(rig.slot.try_take().unwrap().allophone_id, 27);
    }

    #[test]
    fn test_submit_valid_ids_accepted() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        for id in 0..=ADDRESS_MAX {
            assert_eq!(monitor.submit(id), Submit::Accepted);
            assert!(rig.signal.is_busy());
            assert!(!rig.signal.is_standby());
            assert_eq!(rig.signal.latched_address(), id);

            // Drain and complete, as the playback engine would
            assert_eq!(rig.slot.try_take().unwrap().allophone_id, id);
            rig.signal.end_session();
        }
        assert_eq!(monitor.accepted_count(), 64);
    }

    #[test]
    fn test_submit_invalid_ids_rejected() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        monitor.submit(27);
        rig.slot.try_take().unwrap();
        rig.signal.end_session();
        let before = rig.signal.snapshot();

        for id in [64u8, 65, 100, 255] {
            assert_eq!(monitor.submit(id), Submit::RejectedInvalidAddress);
            assert_eq!(rig.signal.snapshot(), before);
            assert!(!rig.slot.is_full());
        }
    }

    #[test]
    fn test_submit_while_busy_rejected() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        assert_eq!(monitor.submit(27), Submit::Accepted);
        assert_eq!(monitor.submit(7), Submit::RejectedBusy);

        assert_eq!(rig.signal.latched_address(), 27);
        assert_eq!(monitor.accepted_count(), 1);
    }

    #[test]
    fn test_debounce_filters_glitch() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();
        monitor.set_debounce_polls(2);

        // One-poll glitch: edge, then straight back high
        monitor.poll(true, 27);
        assert_eq!(monitor.poll(false, 27), None);
        assert_eq!(monitor.poll(true, 27), None);
        assert!(!rig.signal.is_busy());
        assert!(!rig.slot.is_full());

        // Stable low: edge + two confirming polls latches, with the
        // address sampled at confirmation
        monitor.poll(false, 10);
        assert_eq!(monitor.poll(false, 11), None);
        assert_eq!(monitor.poll(false, 12), Some(ProtocolEvent::Latched(12)));
        assert_eq!(rig.signal.latched_address(), 12);
    }

    #[test]
    fn test_overrun_latches_fault_and_halts() {
        let rig = Rig::new();
        let mut monitor = rig.monitor();

        // Force the invariant violation: slot full but signal not busy
        rig.slot
            .try_publish(PlaybackRequest { allophone_id: 1 })
            .unwrap();

        assert_eq!(monitor.submit(2), Submit::RejectedBusy);
        assert!(rig.fault.is_active());
        assert_eq!(rig.fault.code(), FaultCode::ChannelOverrun);

        // Halted: even after the engine would have drained everything,
        // edges are ignored until the fault is cleared
        rig.slot.try_take();
        rig.signal.end_session();
        monitor.poll(true, 3);
        assert_eq!(monitor.poll(false, 3), Some(ProtocolEvent::IgnoredBusy));

        rig.fault.clear();
        monitor.poll(true, 3);
        assert_eq!(monitor.poll(false, 3), Some(ProtocolEvent::Latched(3)));
    }
}
