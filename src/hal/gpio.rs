//! GPIO HAL for the chip's signal bus.
//!
//! Inputs: 6-bit address bus (A1-A6) and the ALD strobe.
//! Outputs: LRQ (busy/ready, active low on the wire) and SBY (standby).
//!
//! Pin defaults follow the adapter schematic: the host's bus buffer
//! drives A1-A6 on GPIO0-5 and ALD on GPIO8; LRQ and SBY feed back on
//! GPIO13/14.

#[cfg(not(test))]
use esp_idf_svc::hal::gpio::{AnyIOPin, Input, Level, Output, PinDriver};
#[cfg(not(test))]
use esp_idf_svc::sys::EspError;

/// Signal bus pin assignment.
pub struct BusPinConfig {
    /// Address inputs A1-A6, LSB first.
    pub address_pins: [i32; 6],
    /// Address-load strobe input.
    pub ald_pin: i32,
    /// Load request output (active low: low = ready).
    pub lrq_pin: i32,
    /// Standby output (high = idle).
    pub sby_pin: i32,
}

impl Default for BusPinConfig {
    fn default() -> Self {
        Self {
            address_pins: [0, 1, 2, 3, 4, 5],
            ald_pin: 8,
            lrq_pin: 13,
            sby_pin: 14,
        }
    }
}

/// The emulated chip's side of the bus.
#[cfg(not(test))]
pub struct SignalBus<'d> {
    address: [PinDriver<'d, AnyIOPin, Input>; 6],
    ald: PinDriver<'d, AnyIOPin, Input>,
    lrq: PinDriver<'d, AnyIOPin, Output>,
    sby: PinDriver<'d, AnyIOPin, Output>,
}

#[cfg(not(test))]
impl SignalBus<'_> {
    /// Claim the configured pins and drive the power-on levels
    /// (ready + standby).
    pub fn new(config: &BusPinConfig) -> Result<Self, EspError> {
        let address = [
            Self::input(config.address_pins[0])?,
            Self::input(config.address_pins[1])?,
            Self::input(config.address_pins[2])?,
            Self::input(config.address_pins[3])?,
            Self::input(config.address_pins[4])?,
            Self::input(config.address_pins[5])?,
        ];
        let ald = Self::input(config.ald_pin)?;

        // SAFETY: pin numbers come from the board config; each is claimed
        // exactly once here.
        let mut lrq = PinDriver::output(unsafe { AnyIOPin::new(config.lrq_pin) })?;
        let mut sby = PinDriver::output(unsafe { AnyIOPin::new(config.sby_pin) })?;

        lrq.set_low()?; // ready
        sby.set_high()?; // standby

        Ok(Self {
            address,
            ald,
            lrq,
            sby,
        })
    }

    fn input(pin: i32) -> Result<PinDriver<'static, AnyIOPin, Input>, EspError> {
        // SAFETY: see new()
        PinDriver::input(unsafe { AnyIOPin::new(pin) })
    }

    /// Sample the 6-bit address bus.
    #[inline]
    pub fn read_address(&self) -> u8 {
        let mut address = 0u8;
        for (bit, pin) in self.address.iter().enumerate() {
            if pin.is_high() {
                address |= 1 << bit;
            }
        }
        address
    }

    /// Sample the ALD line level.
    #[inline]
    pub fn ald_level(&self) -> bool {
        self.ald.is_high()
    }

    /// Mirror the internal busy state onto LRQ and SBY.
    ///
    /// LRQ is active low on the wire: high while busy, low when a new
    /// address may be loaded. SBY is the complement.
    #[inline]
    pub fn drive(&mut self, busy: bool) -> Result<(), EspError> {
        self.lrq
            .set_level(if busy { Level::High } else { Level::Low })?;
        self.sby
            .set_level(if busy { Level::Low } else { Level::High })
    }
}
