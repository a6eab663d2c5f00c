//! PWM audio output via the LEDC peripheral.
//!
//! The original chip's digital output is a 1-bit PWM stream filtered by an
//! RC network on the host board. Here the LEDC timer runs a 125 kHz
//! carrier and each 11025 Hz sample updates the duty cycle; the same RC
//! filter recovers the audio.

use crate::playback::SILENCE_DUTY;

#[cfg(not(test))]
use crate::playback::AmplitudeSink;
#[cfg(not(test))]
use esp_idf_svc::hal::gpio::AnyIOPin;
#[cfg(not(test))]
use esp_idf_svc::hal::ledc::{
    config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution,
};
#[cfg(not(test))]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(not(test))]
use esp_idf_svc::hal::units::Hertz;
#[cfg(not(test))]
use esp_idf_svc::sys::EspError;

/// PWM output configuration.
pub struct PwmConfig {
    /// Audio output pin.
    pub pin: i32,
    /// PWM carrier frequency in Hz. Must sit far above the 11025 Hz
    /// sample rate so the RC filter can strip it.
    pub carrier_hz: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            pin: 11,
            carrier_hz: 125_000,
        }
    }
}

/// LEDC-backed amplitude sink.
///
/// Accepts full-scale 16-bit duty values from the playback engine and
/// rescales them to the timer's native resolution.
#[cfg(not(test))]
pub struct PwmSink<'d> {
    driver: LedcDriver<'d>,
    max_duty: u32,
}

#[cfg(not(test))]
impl<'d> PwmSink<'d> {
    /// Configure the carrier timer and park the output at silence.
    ///
    /// At 125 kHz the LEDC source clock supports 9 bits of resolution;
    /// the full 16-bit sample axis is rescaled onto that.
    pub fn new(
        channel: impl Peripheral<P = impl LedcChannel> + 'd,
        timer: impl Peripheral<P = impl LedcTimer> + 'd,
        config: &PwmConfig,
    ) -> Result<Self, EspError> {
        let timer_config = TimerConfig::default()
            .frequency(Hertz(config.carrier_hz))
            .resolution(Resolution::Bits9);

        // SAFETY: the audio pin is claimed exactly once, from the board
        // config.
        let pin = unsafe { AnyIOPin::new(config.pin) };
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;
        let mut driver = LedcDriver::new(channel, timer_driver, pin)?;

        let max_duty = driver.get_max_duty();
        driver.set_duty(Self::rescale(SILENCE_DUTY, max_duty))?;

        Ok(Self { driver, max_duty })
    }

    #[inline]
    fn rescale(duty: u16, max_duty: u32) -> u32 {
        duty as u32 * max_duty / u16::MAX as u32
    }
}

#[cfg(not(test))]
impl AmplitudeSink for PwmSink<'_> {
    #[inline]
    fn write(&mut self, duty: u16) {
        // A failed duty update is unrecoverable mid-sample; skip rather
        // than stall the render loop.
        let _ = self.driver.set_duty(Self::rescale(duty, self.max_duty));
    }
}
