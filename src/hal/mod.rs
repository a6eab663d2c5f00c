//! Hardware abstraction: signal bus pins, PWM audio output, clock.
//!
//! All protocol and playback logic lives behind the `SampleClock` and
//! `AmplitudeSink` traits plus plain `u8`/`bool` line levels, so this is
//! the only module that touches ESP-IDF peripherals.

pub mod gpio;
pub mod pwm;

pub use gpio::BusPinConfig;
pub use pwm::PwmConfig;

#[cfg(not(test))]
pub use gpio::SignalBus;
#[cfg(not(test))]
pub use pwm::PwmSink;

/// Monotonic clock over the ESP high-resolution timer.
#[cfg(not(test))]
pub struct EspClock;

#[cfg(not(test))]
impl crate::playback::SampleClock for EspClock {
    #[inline]
    fn now_us(&self) -> i64 {
        // SAFETY: esp_timer_get_time is always safe to call
        unsafe { esp_idf_svc::sys::esp_timer_get_time() }
    }
}
