//! End-to-end pipeline tests: submit -> protocol -> channel -> playback,
//! including a dual-thread run mirroring the two-core layout.

use std::time::Instant;

use rust_sp0256_emulator::allophone::AllophoneTable;
use rust_sp0256_emulator::playback::{AmplitudeSink, PlaybackEngine, SampleClock};
use rust_sp0256_emulator::{
    FaultState, ProtocolMonitor, RequestSlot, SignalState, Submit,
};

/// Wall-clock microsecond source for real-time runs.
struct StdClock(Instant);

impl StdClock {
    fn new() -> Self {
        Self(Instant::now())
    }
}

impl SampleClock for StdClock {
    fn now_us(&self) -> i64 {
        self.0.elapsed().as_micros() as i64
    }
}

/// Sink that only counts writes.
#[derive(Default)]
struct CountingSink {
    writes: u64,
}

impl AmplitudeSink for CountingSink {
    fn write(&mut self, _duty: u16) {
        self.writes += 1;
    }
}

impl AmplitudeSink for &mut CountingSink {
    fn write(&mut self, _duty: u16) {
        self.writes += 1;
    }
}

#[test]
fn test_pause_session_returns_to_standby() {
    let table = AllophoneTable::placeholder();
    let slot = RequestSlot::new();
    let signal = SignalState::new();
    let fault = FaultState::new();

    let mut monitor = ProtocolMonitor::new(&signal, &slot, &fault);
    let mut sink = CountingSink::default();
    let mut engine =
        PlaybackEngine::new(&table, &slot, &signal, &fault, StdClock::new(), &mut sink);

    // PA1 = 10ms pause
    assert_eq!(monitor.submit(0), Submit::Accepted);
    assert!(signal.is_busy());

    let report = engine.run_once().unwrap().unwrap();

    // ~10ms elapsed, standby restored
    assert!(report.elapsed_us >= 9_977, "elapsed {}", report.elapsed_us);
    assert!(report.elapsed_us < 50_000, "elapsed {}", report.elapsed_us);
    assert!(signal.is_standby());
    assert!(!signal.is_busy());
}

#[test]
fn test_sequential_sessions_in_order_without_overlap() {
    let table = AllophoneTable::placeholder();
    let slot = RequestSlot::new();
    let signal = SignalState::new();
    let fault = FaultState::new();

    let mut monitor = ProtocolMonitor::new(&signal, &slot, &fault);
    let mut sink = CountingSink::default();
    let mut engine =
        PlaybackEngine::new(&table, &slot, &signal, &fault, StdClock::new(), &mut sink);

    // submit(27) -> wait standby -> submit(7)
    let mut emitted = Vec::new();
    for &id in &[27u8, 7] {
        assert_eq!(monitor.submit(id), Submit::Accepted);
        let report = engine.run_once().unwrap().unwrap();
        emitted.push((report.allophone_id, report.samples_emitted));
        assert!(signal.is_standby());
    }

    assert_eq!(emitted, vec![(27, 200), (7, 200)]);

    // Every sample write belongs to exactly one session: 2 buffers plus
    // the two trailing silence writes
    drop(engine);
    assert_eq!(sink.writes, 200 + 200 + 2);
}

#[test]
fn test_random_submissions_balance_requests_and_completions() {
    let table = AllophoneTable::placeholder();
    let slot = RequestSlot::new();
    let signal = SignalState::new();
    let fault = FaultState::new();

    let mut monitor = ProtocolMonitor::new(&signal, &slot, &fault);
    let mut sink = CountingSink::default();
    let mut engine =
        PlaybackEngine::new(&table, &slot, &signal, &fault, StdClock::new(), &mut sink);

    // Deterministic pseudo-random ids, voiced only (short buffers)
    let mut state = 0x2545F491u32;
    let mut next_id = || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (5 + (state >> 16) % 59) as u8
    };

    const N: u32 = 40;
    for _ in 0..N {
        let id = next_id();
        assert_eq!(monitor.submit(id), Submit::Accepted);
        let report = engine.run_once().unwrap().unwrap();
        assert_eq!(report.allophone_id, id);
    }

    // No duplication, no loss
    assert_eq!(monitor.accepted_count(), N);
    assert_eq!(engine.completed_count(), N);
    assert!(!slot.is_full());
    assert!(!fault.is_active());
}

#[test]
fn test_two_thread_pipeline_matches_core_split() {
    let table = AllophoneTable::placeholder();
    let slot = RequestSlot::new();
    let signal = SignalState::new();
    let fault = FaultState::new();

    const SEQUENCE: [u8; 6] = [27, 7, 45, 53, 1, 5]; // HH1 EH LL OW PA2 OY

    std::thread::scope(|scope| {
        // Interface side: submit each allophone once the busy line drops
        let submitter = scope.spawn(|| {
            let mut monitor = ProtocolMonitor::new(&signal, &slot, &fault);
            for &id in &SEQUENCE {
                while signal.is_busy() {
                    std::thread::yield_now();
                }
                assert_eq!(monitor.submit(id), Submit::Accepted);
            }
            monitor.accepted_count()
        });

        // Synthesis side: render until the whole sequence has played
        let renderer = scope.spawn(|| {
            let mut engine = PlaybackEngine::new(
                &table,
                &slot,
                &signal,
                &fault,
                StdClock::new(),
                CountingSink::default(),
            );
            let mut played = Vec::new();
            while played.len() < SEQUENCE.len() {
                match engine.run_once() {
                    Some(Ok(report)) => played.push(report.allophone_id),
                    Some(Err(code)) => panic!("render fault: {:?}", code),
                    None => std::thread::yield_now(),
                }
            }
            played
        });

        assert_eq!(submitter.join().unwrap(), SEQUENCE.len() as u32);

        // Strict FIFO: sessions complete in submission order
        assert_eq!(renderer.join().unwrap(), SEQUENCE.to_vec());
    });

    assert!(signal.is_standby());
    assert!(!slot.is_full());
    assert!(!fault.is_active());
}
