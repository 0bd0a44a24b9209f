use embedded_hal_async::{delay::DelayNs, i2c::I2c};

use crate::{
    raw_sample, Clock, Config, ConfigBits, Register, Status, Temperature, TEMPERATURE_CHANNEL,
    TRANSACTION_TIMEOUT_MS,
};

/// Async API to the ADC.
///
/// Register reads are single write-read transactions. Waiting for the device to become ready
/// suspends on the delay between polls instead of spinning.
pub struct Adc128d818<'a, I, D, C>
where
    I: I2c,
    D: DelayNs,
    C: Clock,
{
    i2c: &'a mut I,
    delay: &'a mut D,
    clock: &'a C,
    address: u8,
    config: Config,
}

impl<'a, I, D, C> Adc128d818<'a, I, D, C>
where
    I: I2c,
    D: DelayNs,
    C: Clock,
{
    /// Create new instance, no bus traffic happens until [`Adc128d818::begin`].
    pub fn new(i2c: &'a mut I, delay: &'a mut D, clock: &'a C, address: u8) -> Self {
        Self {
            i2c,
            delay,
            clock,
            address,
            config: Config::default(),
        }
    }

    /// Brings the device up with `config`, see [`crate::sync_adc::Adc128d818::begin`].
    pub async fn begin(mut self, config: Config) -> Result<Self, I::Error> {
        self.config = config;
        self.wait_ready().await?;

        log::debug!(
            "ADC128D818 {:#04x}: adv config {:#04x}, conversion {}, disabled {:#010b}",
            self.address,
            config.adv_config(),
            config.conversion_mode() as u8,
            config.disabled_mask()
        );
        self.set_register(Register::AdvConfig as u8, config.adv_config()).await?;
        self.set_register(Register::ConvRate as u8, config.conversion_mode() as u8).await?;
        self.set_register(Register::ChannelDisable as u8, config.disabled_mask()).await?;
        self.set_register(Register::Config as u8, ConfigBits::Start as u8).await?;
        Ok(self)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Raw sample of `channel`, 12 bit left justified.
    ///
    /// One write-read transaction. Unlike the blocking driver there is no
    /// [`TRANSACTION_TIMEOUT_MS`] wait here, bounding the transfer is left to the HAL.
    pub async fn read(&mut self, channel: u8) -> Result<u16, I::Error> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[Register::channel(channel)], &mut buf)
            .await?;
        Ok(raw_sample(buf[0], buf[1]))
    }

    /// Sample of `channel` scaled to the reference voltage.
    pub async fn read_converted(&mut self, channel: u8) -> Result<f32, I::Error> {
        let raw = self.read(channel).await?;
        Ok(self.config.to_volts(raw))
    }

    pub async fn read_temperature(&mut self) -> Result<Temperature, I::Error> {
        Ok(Temperature::from_raw(self.read(TEMPERATURE_CHANNEL).await?))
    }

    pub async fn read_temperature_converted(&mut self) -> Result<f32, I::Error> {
        Ok(self.read_temperature().await?.celsius())
    }

    /// Raw samples of all channels, `None` for the ones disabled in the config.
    pub async fn read_all(&mut self) -> Result<[Option<u16>; 8], I::Error> {
        let mut samples = [None; 8];
        for (channel, sample) in (0u8..).zip(samples.iter_mut()) {
            if self.config.is_enabled(channel) {
                *sample = Some(self.read(channel).await?);
            }
        }
        Ok(samples)
    }

    pub async fn status(&mut self) -> Result<Status, I::Error> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[Register::BusyStatus as u8], &mut buf)
            .await?;
        Ok(Status::from(buf[0]))
    }

    pub async fn trigger_one_shot(&mut self) -> Result<(), I::Error> {
        self.set_register(Register::OneShot as u8, 1).await
    }

    /// Restores the power-on register defaults without sending the configuration again.
    pub async fn reset(&mut self) -> Result<(), I::Error> {
        self.set_register(Register::Config as u8, ConfigBits::Initialization as u8)
            .await
    }

    async fn wait_ready(&mut self) -> Result<(), I::Error> {
        let start = self.clock.now_ms();
        loop {
            log::trace!("ADC128D818 {:#04x}: waiting for ready bit unset", self.address);
            if !self.status().await?.not_ready {
                return Ok(());
            }
            self.delay.delay_ms(1).await;
            if self.clock.now_ms().wrapping_sub(start) > TRANSACTION_TIMEOUT_MS {
                log::warn!(
                    "ADC128D818 {:#04x}: not ready after {} ms, continuing",
                    self.address,
                    TRANSACTION_TIMEOUT_MS
                );
                return Ok(());
            }
        }
    }

    async fn set_register(&mut self, reg: u8, value: u8) -> Result<(), I::Error> {
        self.i2c.write(self.address, &[reg, value]).await
    }
}
