//! Sample-accurate playback engine.
//!
//! Runs on the synthesis core: takes latched requests from the channel,
//! streams the allophone's samples to the amplitude sink at 11025 Hz, and
//! flips busy back to standby on completion.
//!
//! Timing rule: every sample's deadline is computed from the session start
//! timestamp and the sample index against a monotonic clock — never by
//! accumulating per-sample delays — so rounding and scheduling error do
//! not drift across a buffer. A late sample degrades the reported accuracy
//! metric; it never aborts playback (continuity of output beats deadline
//! enforcement).

use crate::allophone::{AllophoneTable, SAMPLE_RATE_HZ};
use crate::channel::RequestSlot;
use crate::fault::{FaultCode, FaultState};
use crate::signal::SignalState;

/// Monotonic microsecond clock.
///
/// The target implements this over `esp_timer_get_time`; tests drive a
/// fake.
pub trait SampleClock {
    fn now_us(&self) -> i64;
}

/// Amplitude output boundary.
///
/// One call per sample tick with the full-scale 16-bit duty value; the
/// HAL rescales to the PWM timer's native resolution.
pub trait AmplitudeSink {
    fn write(&mut self, duty: u16);
}

/// Expand a signed 8-bit sample to the 16-bit duty axis.
///
/// Fixed linear scaling (65535 / 255 = 257 exactly): -128 maps to 0,
/// 0 to mid-scale, 127 to 65535. No truncation.
#[inline]
pub const fn duty_from_sample(sample: i8) -> u16 {
    (sample as i16 + 128) as u16 * 257
}

/// Duty value the line rests at between sessions (silence).
pub const SILENCE_DUTY: u16 = duty_from_sample(0);

/// Deadline of sample `index` relative to session start.
///
/// Multiply before divide: the 11025 Hz period is not a whole number of
/// microseconds, and accumulating a truncated period would drift tens of
/// milliseconds over a second of audio.
#[inline]
pub const fn sample_deadline_us(index: u32) -> i64 {
    index as i64 * 1_000_000 / SAMPLE_RATE_HZ as i64
}

/// What one completed session looked like.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub allophone_id: u8,
    pub samples_emitted: u32,
    /// Duration the sample count implies at the nominal rate.
    pub nominal_us: i64,
    /// Wall-clock duration actually taken.
    pub elapsed_us: i64,
    /// Samples emitted after their deadline.
    pub late_samples: u32,
}

impl SessionReport {
    /// Timing accuracy in parts per thousand (1000 = perfect).
    ///
    /// Reported, not enforced; values below 1000 mean playback ran slow.
    pub fn accuracy_permille(&self) -> u32 {
        if self.elapsed_us <= 0 {
            return 0;
        }
        (self.nominal_us * 1000 / self.elapsed_us) as u32
    }
}

/// The render half of the emulator.
///
/// Owns the clock and sink; shares the table, slot, signal and fault state
/// with the interface core.
pub struct PlaybackEngine<'a, C: SampleClock, S: AmplitudeSink> {
    table: &'a AllophoneTable<'a>,
    slot: &'a RequestSlot,
    signal: &'a SignalState,
    fault: &'a FaultState,
    clock: C,
    sink: S,
    completed: u32,
}

impl<'a, C: SampleClock, S: AmplitudeSink> PlaybackEngine<'a, C, S> {
    pub fn new(
        table: &'a AllophoneTable<'a>,
        slot: &'a RequestSlot,
        signal: &'a SignalState,
        fault: &'a FaultState,
        clock: C,
        sink: S,
    ) -> Self {
        Self {
            table,
            slot,
            signal,
            fault,
            clock,
            sink,
            completed: 0,
        }
    }

    /// Sessions completed since boot.
    #[inline]
    pub fn completed_count(&self) -> u32 {
        self.completed
    }

    /// Service the channel once.
    ///
    /// Returns `None` when idle (no request, or engine halted on a
    /// fault); the synthesis task inserts its idle wait in that case.
    pub fn run_once(&mut self) -> Option<Result<SessionReport, FaultCode>> {
        if self.fault.is_active() {
            return None;
        }
        let request = self.slot.try_take()?;
        Some(self.render(request.allophone_id))
    }

    /// Render one allophone and complete the session.
    pub fn render(&mut self, allophone_id: u8) -> Result<SessionReport, FaultCode> {
        let Some(descriptor) = self.table.get(allophone_id) else {
            // Table incomplete: refuse to guess at audio. Restore the
            // ready/standby lines so the host is not wedged, then halt.
            self.fault
                .set(FaultCode::UnknownAllophone, allophone_id as u32);
            self.sink.write(SILENCE_DUTY);
            self.signal.end_session();
            return Err(FaultCode::UnknownAllophone);
        };

        let samples = descriptor.samples();
        let start_us = self.clock.now_us();
        let mut late_samples = 0u32;

        for (index, &sample) in samples.iter().enumerate() {
            self.sink.write(duty_from_sample(sample));

            // Spin to the next sample's absolute deadline. The synthesis
            // core has nothing else to do, and a sleep-based wait cannot
            // hold a 90.7 us period.
            let due_us = start_us + sample_deadline_us(index as u32 + 1);
            if self.clock.now_us() > due_us {
                late_samples += 1;
            } else {
                while self.clock.now_us() < due_us {
                    core::hint::spin_loop();
                }
            }
        }

        let elapsed_us = self.clock.now_us() - start_us;

        // Park the line at silence and hand the bus back to the host
        self.sink.write(SILENCE_DUTY);
        self.signal.end_session();
        self.completed += 1;

        Ok(SessionReport {
            allophone_id,
            samples_emitted: samples.len() as u32,
            nominal_us: descriptor.nominal_duration_us(),
            elapsed_us,
            late_samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Fake monotonic clock advancing a fixed step per read.
    struct SteppingClock {
        now: Cell<i64>,
        step: i64,
    }

    impl SteppingClock {
        fn new(step: i64) -> Self {
            Self {
                now: Cell::new(0),
                step,
            }
        }
    }

    impl SampleClock for &SteppingClock {
        fn now_us(&self) -> i64 {
            let t = self.now.get();
            self.now.set(t + self.step);
            t
        }
    }

    /// Sink recording every duty value written.
    #[derive(Default)]
    struct RecordingSink {
        written: Vec<u16>,
    }

    impl AmplitudeSink for &mut RecordingSink {
        fn write(&mut self, duty: u16) {
            self.written.push(duty);
        }
    }

    #[test]
    fn test_duty_scaling_endpoints() {
        assert_eq!(duty_from_sample(-128), 0);
        assert_eq!(duty_from_sample(0), 32896);
        assert_eq!(duty_from_sample(127), 65535);
        assert_eq!(SILENCE_DUTY, 32896);
    }

    #[test]
    fn test_duty_scaling_monotone() {
        let mut previous = duty_from_sample(-128);
        for sample in -127i16..=127 {
            let duty = duty_from_sample(sample as i8);
            assert!(duty > previous);
            previous = duty;
        }
    }

    #[test]
    fn test_deadline_has_no_drift() {
        // Truncated period is 90 us; absolute deadlines pick up the
        // fractional microsecond instead of losing it every sample
        assert_eq!(sample_deadline_us(1), 90);
        assert_eq!(sample_deadline_us(2), 181);
        // 11025 samples land on exactly one second
        assert_eq!(sample_deadline_us(11025), 1_000_000);
        // whereas the accumulated truncated period would come up short
        assert_eq!(11025i64 * 90, 992_250);
    }

    #[test]
    fn test_render_emits_exact_sample_count() {
        let table = AllophoneTable::placeholder();
        let slot = RequestSlot::new();
        let signal = SignalState::new();
        let fault = FaultState::new();
        let clock = SteppingClock::new(45);
        let mut sink = RecordingSink::default();

        signal.begin_session(0);
        let mut engine =
            PlaybackEngine::new(&table, &slot, &signal, &fault, &clock, &mut sink);
        let report = engine.render(0).unwrap();

        // PA1: 110 samples plus the trailing silence write
        assert_eq!(report.samples_emitted, 110);
        assert_eq!(report.allophone_id, 0);
        assert_eq!(sink.written.len(), 111);
        assert!(sink.written.iter().all(|&duty| duty == SILENCE_DUTY));

        // Session closed: ready/standby restored
        assert!(!signal.is_busy());
        assert!(signal.is_standby());
    }

    #[test]
    fn test_unknown_allophone_faults_and_halts() {
        let table = AllophoneTable::placeholder();
        let slot = RequestSlot::new();
        let signal = SignalState::new();
        let fault = FaultState::new();
        let clock = SteppingClock::new(45);
        let mut sink = RecordingSink::default();

        signal.begin_session(64);
        let mut engine =
            PlaybackEngine::new(&table, &slot, &signal, &fault, &clock, &mut sink);

        assert_eq!(engine.render(64), Err(FaultCode::UnknownAllophone));
        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::UnknownAllophone);
        assert_eq!(fault.data(), 64);

        // Lines restored so the host is not wedged
        assert!(signal.is_standby());

        // Halted: pending requests are not serviced
        slot.try_publish(crate::channel::PlaybackRequest { allophone_id: 1 })
            .unwrap();
        assert!(engine.run_once().is_none());
        assert_eq!(engine.completed_count(), 0);
    }
}
