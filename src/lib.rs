#![cfg_attr(not(test), no_std)]
//! Driver for the [ADC128D818], an 8-channel 12-bit monitoring ADC with an on-die temperature
//! sensor, connected via i2c. It requires a bus implementing [`Transport`] (use [`I2cTransport`]
//! to wrap any [`embedded_hal::i2c::I2c`]), a delay implementing
//! [`embedded_hal::delay::DelayNs`] and a millisecond [`Clock`].
//!
//! Usage:
//! ```ignore
//! const ADC_ADDRESS: u8 = 0x1D; // A0 and A1 tied low
//!
//! let mut bus = adc128d818::I2cTransport::new(&mut i2c);
//! let adc = adc128d818::sync_adc::Adc128d818::new(&mut bus, &mut delay, &clock, ADC_ADDRESS);
//! let mut adc = adc
//!     .begin(
//!         adc128d818::Config::default()
//!             .with_reference_voltage(3.3)
//!             .with_reference_mode(adc128d818::ReferenceMode::External)
//!             .with_disabled_mask(0b0011_0000), // IN4 and IN5 unused
//!     )
//!     .unwrap();
//!
//! let volts = adc.read_converted(0).unwrap();
//! let celsius = adc.read_temperature_converted().unwrap();
//! ```
//!
//! Every bus wait is bounded by [`TRANSACTION_TIMEOUT_MS`]. When the device does not answer in
//! time the driver carries on with whatever it has; timeouts are logged, not returned.
//!
//! [ADC128D818]: https://www.ti.com/lit/ds/symlink/adc128d818.pdf

pub mod mock;
pub mod sync_adc;
mod transport;

#[cfg(feature = "async")]
pub mod async_adc;

pub use transport::{Clock, I2cTransport, Transport, BUFFER_LENGTH};

use ufmt::{uDisplay, uwrite, Formatter};
use ufmt_write::uWrite;

/// Upper bound in milliseconds for every wait on the device.
pub const TRANSACTION_TIMEOUT_MS: u32 = 5;

/// Channel whose data register holds the temperature reading.
pub const TEMPERATURE_CHANNEL: u8 = 7;

/// Byte substituted for data that never arrived on the bus.
pub(crate) const NO_DATA: u8 = 0xFF;

#[repr(u8)]
#[derive(Copy, Clone)]
pub(crate) enum Register {
    Config = 0x00,
    ConvRate = 0x07,
    ChannelDisable = 0x08,
    OneShot = 0x09,
    AdvConfig = 0x0B,
    BusyStatus = 0x0C,
    ChannelData = 0x20,
}

impl Register {
    /// Data register of `channel`, 0x20 to 0x27.
    pub(crate) fn channel(channel: u8) -> u8 {
        (Register::ChannelData as u8).wrapping_add(channel)
    }
}

pub(crate) enum ConfigBits {
    Start = 0x01,
    Initialization = 0x80,
}

enum StatusBits {
    Busy = 0x01,
    NotReady = 0x02,
}

/// Voltage reference selection, bit 0 of the advanced configuration register.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReferenceMode {
    Internal = 0x00,
    External = 0x01,
}

/// Input configuration, bits 1-2 of the advanced configuration register.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperationMode {
    /// IN0-IN6 single-ended, channel 7 is the temperature sensor.
    SingleEndedWithTemp = 0x00,
    /// IN0-IN7 single-ended.
    SingleEnded = 0x01,
    /// Four pseudo-differential pairs and the temperature sensor.
    Differential = 0x02,
    /// IN0-IN3 single-ended, two pseudo-differential pairs and the temperature sensor.
    Mixed = 0x03,
}

/// Value of the conversion rate register.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConversionMode {
    /// Low power mode, one conversion cycle per one-shot trigger.
    OneShot = 0x00,
    Continuous = 0x01,
}

/// Device configuration written by `begin`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    reference_voltage: f32,
    reference_mode: ReferenceMode,
    operation_mode: OperationMode,
    conversion_mode: ConversionMode,
    disabled_mask: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_voltage: 5.0,
            reference_mode: ReferenceMode::External,
            operation_mode: OperationMode::SingleEnded,
            conversion_mode: ConversionMode::Continuous,
            disabled_mask: 0,
        }
    }
}

impl Config {
    /// Full scale voltage used by the converted reads.
    pub fn with_reference_voltage(mut self, volts: f32) -> Self {
        self.reference_voltage = volts;
        self
    }

    pub fn with_reference_mode(mut self, mode: ReferenceMode) -> Self {
        self.reference_mode = mode;
        self
    }

    pub fn with_operation_mode(mut self, mode: OperationMode) -> Self {
        self.operation_mode = mode;
        self
    }

    pub fn with_conversion_mode(mut self, mode: ConversionMode) -> Self {
        self.conversion_mode = mode;
        self
    }

    /// Bit `n` set disables channel `n`. Bit 7 is the temperature channel.
    pub fn with_disabled_mask(mut self, mask: u8) -> Self {
        self.disabled_mask = mask;
        self
    }

    pub fn reference_voltage(&self) -> f32 {
        self.reference_voltage
    }

    pub fn reference_mode(&self) -> ReferenceMode {
        self.reference_mode
    }

    pub fn operation_mode(&self) -> OperationMode {
        self.operation_mode
    }

    pub fn conversion_mode(&self) -> ConversionMode {
        self.conversion_mode
    }

    pub fn disabled_mask(&self) -> u8 {
        self.disabled_mask
    }

    pub fn is_enabled(&self, channel: u8) -> bool {
        channel < 8 && self.disabled_mask & (1 << channel) == 0
    }

    /// Advanced configuration register value.
    pub(crate) fn adv_config(&self) -> u8 {
        self.reference_mode as u8 | ((self.operation_mode as u8) << 1)
    }

    pub(crate) fn to_volts(&self, raw: u16) -> f32 {
        raw as f32 / 65535.0 * self.reference_voltage
    }
}

/// Decoded busy status register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Status {
    /// A conversion is in progress.
    pub busy: bool,
    /// The device is still running its power-on sequence.
    pub not_ready: bool,
}

impl From<u8> for Status {
    fn from(reg: u8) -> Self {
        Self {
            busy: reg & StatusBits::Busy as u8 != 0,
            not_ready: reg & StatusBits::NotReady as u8 != 0,
        }
    }
}

/// Temperature in half degrees Celsius.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Temperature {
    half_degrees: i32,
}

impl Temperature {
    /// Decodes a raw sample of the temperature channel.
    ///
    /// Bit 8 selects the negative branch, `-(512 - raw) / 2`, anything else is `raw / 2`.
    pub fn from_raw(raw: u16) -> Self {
        let raw = raw as i32;
        let half_degrees = if raw & 0x100 == 0 { raw } else { -(512 - raw) };
        Self { half_degrees }
    }

    pub fn half_degrees(&self) -> i32 {
        self.half_degrees
    }

    pub fn celsius(&self) -> f32 {
        self.half_degrees as f32 / 2.0
    }
}

impl uDisplay for Temperature {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        let magnitude = self.half_degrees.unsigned_abs();
        if self.half_degrees < 0 {
            f.write_str("-")?;
        }
        let tenths: u8 = if magnitude % 2 == 0 { 0 } else { 5 };
        uwrite!(f, "{}.{}", magnitude / 2, tenths)
    }
}

/// Combines the two data bytes of a channel register, dropping the four padding bits.
pub(crate) fn raw_sample(high: u8, low: u8) -> u16 {
    (((high as u16) << 8) | low as u16) & 0xFFF0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Buf(heapless::String<16>);

    impl uWrite for Buf {
        type Error = ();

        fn write_str(&mut self, s: &str) -> Result<(), ()> {
            self.0.push_str(s)
        }
    }

    fn render(t: Temperature) -> heapless::String<16> {
        let mut buf = Buf(heapless::String::new());
        uwrite!(&mut buf, "{}", t).unwrap();
        buf.0
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.reference_voltage(), 5.0);
        assert_eq!(config.reference_mode(), ReferenceMode::External);
        assert_eq!(config.operation_mode(), OperationMode::SingleEnded);
        assert_eq!(config.conversion_mode(), ConversionMode::Continuous);
        assert_eq!(config.disabled_mask(), 0);
    }

    #[test]
    fn adv_config_packs_reference_and_mode() {
        let config = Config::default();
        assert_eq!(config.adv_config(), 0b011);

        let config = config
            .with_reference_mode(ReferenceMode::Internal)
            .with_operation_mode(OperationMode::Mixed);
        assert_eq!(config.adv_config(), 0b110);
    }

    #[test]
    fn enabled_channels_follow_mask() {
        let config = Config::default().with_disabled_mask(0b1000_0010);
        assert!(config.is_enabled(0));
        assert!(!config.is_enabled(1));
        assert!(!config.is_enabled(7));
        assert!(!config.is_enabled(8));
    }

    #[test]
    fn raw_sample_drops_padding() {
        assert_eq!(raw_sample(0xAB, 0xCD), 0xABC0);
        assert_eq!(raw_sample(NO_DATA, NO_DATA), 0xFFF0);
    }

    #[test]
    fn status_bits() {
        assert_eq!(Status::from(0x00), Status { busy: false, not_ready: false });
        assert_eq!(Status::from(0x01), Status { busy: true, not_ready: false });
        assert_eq!(Status::from(0x02), Status { busy: false, not_ready: true });
    }

    #[test]
    fn positive_temperature() {
        let t = Temperature::from_raw(0x050);
        assert_eq!(t.celsius(), 40.0);
        assert_eq!(render(t).as_str(), "40.0");
    }

    #[test]
    fn negative_temperature() {
        let t = Temperature::from_raw(0x110);
        assert_eq!(t.celsius(), -120.0);
        assert_eq!(render(t).as_str(), "-120.0");
    }

    #[test]
    fn half_degree_rendering() {
        assert_eq!(render(Temperature::from_raw(0x051)).as_str(), "40.5");
        assert_eq!(render(Temperature::from_raw(0x1FF)).as_str(), "-0.5");
    }
}
