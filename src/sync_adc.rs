use embedded_hal::delay::DelayNs;

use crate::{
    raw_sample, Clock, Config, ConfigBits, Register, Status, Temperature, Transport, NO_DATA,
    TEMPERATURE_CHANNEL, TRANSACTION_TIMEOUT_MS,
};

/// Blocking API to the ADC.
///
/// Created unconfigured with [`Adc128d818::new`], started with [`Adc128d818::begin`].
pub struct Adc128d818<'a, T, D, C>
where
    T: Transport,
    D: DelayNs,
    C: Clock,
{
    bus: &'a mut T,
    delay: &'a mut D,
    clock: &'a C,
    address: u8,
    config: Config,
}

impl<'a, T, D, C> Adc128d818<'a, T, D, C>
where
    T: Transport,
    D: DelayNs,
    C: Clock,
{
    /// Create new instance, no bus traffic happens until [`Adc128d818::begin`].
    pub fn new(bus: &'a mut T, delay: &'a mut D, clock: &'a C, address: u8) -> Self {
        Self {
            bus,
            delay,
            clock,
            address,
            config: Config::default(),
        }
    }

    /// Brings the device up with `config`.
    ///
    /// Waits for the power-on sequence to finish, polling the busy status once per millisecond
    /// for at most [`TRANSACTION_TIMEOUT_MS`], then programs reference, input mode, conversion
    /// rate and disabled channels and sets the start bit with interrupts left disabled. The registers are written even when the device never
    /// reported ready. Limit registers are left alone.
    pub fn begin(mut self, config: Config) -> Result<Self, T::Error> {
        self.config = config;
        self.wait_ready()?;

        log::debug!(
            "ADC128D818 {:#04x}: adv config {:#04x}, conversion {}, disabled {:#010b}",
            self.address,
            config.adv_config(),
            config.conversion_mode() as u8,
            config.disabled_mask()
        );
        self.set_register(Register::AdvConfig as u8, config.adv_config())?;
        self.set_register(Register::ConvRate as u8, config.conversion_mode() as u8)?;
        self.set_register(Register::ChannelDisable as u8, config.disabled_mask())?;
        self.set_register(Register::Config as u8, ConfigBits::Start as u8)?;
        Ok(self)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Raw sample of `channel`, 12 bit left justified, the low 4 bits are always zero.
    ///
    /// Channel 7 holds the temperature in most operation modes, see
    /// [`Adc128d818::read_temperature`]. If the device does not answer within
    /// [`TRANSACTION_TIMEOUT_MS`] the missing bytes read as `0xFF`.
    pub fn read(&mut self, channel: u8) -> Result<u16, T::Error> {
        self.set_register_address(Register::channel(channel))?;
        self.bus.request(self.address, 2)?;
        self.wait_available();
        let high = self.bus.read().unwrap_or(NO_DATA);
        let low = self.bus.read().unwrap_or(NO_DATA);
        Ok(raw_sample(high, low))
    }

    /// Sample of `channel` scaled to the reference voltage.
    ///
    /// The full 16 bit range maps to the reference voltage.
    pub fn read_converted(&mut self, channel: u8) -> Result<f32, T::Error> {
        let raw = self.read(channel)?;
        Ok(self.config.to_volts(raw))
    }

    pub fn read_temperature(&mut self) -> Result<Temperature, T::Error> {
        Ok(Temperature::from_raw(self.read(TEMPERATURE_CHANNEL)?))
    }

    /// Temperature in degrees Celsius with half degree resolution.
    pub fn read_temperature_converted(&mut self) -> Result<f32, T::Error> {
        Ok(self.read_temperature()?.celsius())
    }

    /// Raw samples of all channels, `None` for the ones disabled in the config.
    pub fn read_all(&mut self) -> Result<[Option<u16>; 8], T::Error> {
        let mut samples = [None; 8];
        for (channel, sample) in (0u8..).zip(samples.iter_mut()) {
            if self.config.is_enabled(channel) {
                *sample = Some(self.read(channel)?);
            }
        }
        Ok(samples)
    }

    pub fn status(&mut self) -> Result<Status, T::Error> {
        self.set_register_address(Register::BusyStatus as u8)?;
        Ok(Status::from(self.read_current_register()?))
    }

    /// Starts a single conversion cycle, used with [`crate::ConversionMode::OneShot`].
    pub fn trigger_one_shot(&mut self) -> Result<(), T::Error> {
        self.set_register(Register::OneShot as u8, 1)
    }

    /// Restores the power-on register defaults.
    ///
    /// The configuration is not sent again, the device stays stopped until
    /// the driver is started anew.
    pub fn reset(&mut self) -> Result<(), T::Error> {
        self.set_register(Register::Config as u8, ConfigBits::Initialization as u8)
    }

    /// Polls the busy status until the not-ready bit clears or the timeout passes.
    fn wait_ready(&mut self) -> Result<(), T::Error> {
        self.set_register_address(Register::BusyStatus as u8)?;
        let start = self.clock.now_ms();
        loop {
            log::trace!("ADC128D818 {:#04x}: waiting for ready bit unset", self.address);
            if !Status::from(self.read_current_register()?).not_ready {
                return Ok(());
            }
            self.delay.delay_ms(1);
            if self.elapsed_since(start) > TRANSACTION_TIMEOUT_MS {
                log::warn!(
                    "ADC128D818 {:#04x}: not ready after {} ms, continuing",
                    self.address,
                    TRANSACTION_TIMEOUT_MS
                );
                return Ok(());
            }
        }
    }

    /// Waits for the first requested byte, at most [`TRANSACTION_TIMEOUT_MS`].
    fn wait_available(&mut self) {
        let start = self.clock.now_ms();
        while self.bus.available() == 0 {
            self.delay.delay_ms(1);
            if self.elapsed_since(start) > TRANSACTION_TIMEOUT_MS {
                log::warn!(
                    "ADC128D818 {:#04x}: no data after {} ms",
                    self.address,
                    TRANSACTION_TIMEOUT_MS
                );
                return;
            }
        }
    }

    fn elapsed_since(&self, start: u32) -> u32 {
        self.clock.now_ms().wrapping_sub(start)
    }

    fn read_current_register(&mut self) -> Result<u8, T::Error> {
        self.bus.request(self.address, 1)?;
        self.wait_available();
        Ok(self.bus.read().unwrap_or(NO_DATA))
    }

    fn set_register_address(&mut self, reg: u8) -> Result<(), T::Error> {
        self.bus.write(self.address, &[reg])
    }

    fn set_register(&mut self, reg: u8, value: u8) -> Result<(), T::Error> {
        self.bus.write(self.address, &[reg, value])
    }
}
