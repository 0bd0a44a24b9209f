use embedded_hal::i2c::I2c;
use heapless::Deque;

/// Receive buffer size of [`I2cTransport`], the classic two-wire buffer length.
pub const BUFFER_LENGTH: usize = 32;

/// Byte oriented two-wire bus as seen by the driver.
///
/// Writes are complete transactions. Reads are split into a request and a drain of the
/// receive buffer, so a driver can wait for data to show up.
pub trait Transport {
    type Error;

    /// Write `bytes` to the device at `address` in one transaction.
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Ask the device at `address` for `count` bytes.
    fn request(&mut self, address: u8, count: u8) -> Result<(), Self::Error>;

    /// Number of received bytes not read yet.
    fn available(&self) -> usize;

    /// Next received byte, `None` if the buffer is empty.
    fn read(&mut self) -> Option<u8>;
}

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. May wrap.
    fn now_ms(&self) -> u32;
}

/// [`Transport`] over an [`embedded_hal::i2c::I2c`] bus.
///
/// A request is carried out as one blocking read, the received bytes are then handed out
/// one by one. At most [`BUFFER_LENGTH`] bytes are requested at once.
pub struct I2cTransport<I>
where
    I: I2c,
{
    i2c: I,
    rx: Deque<u8, BUFFER_LENGTH>,
}

impl<I> I2cTransport<I>
where
    I: I2c,
{
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            rx: Deque::new(),
        }
    }

    /// Give back the bus.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I> Transport for I2cTransport<I>
where
    I: I2c,
{
    type Error = I::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), I::Error> {
        self.i2c.write(address, bytes)
    }

    fn request(&mut self, address: u8, count: u8) -> Result<(), I::Error> {
        self.rx.clear();
        let count = (count as usize).min(BUFFER_LENGTH);
        let mut buf = [0u8; BUFFER_LENGTH];
        self.i2c.read(address, &mut buf[..count])?;
        for byte in &buf[..count] {
            // Cannot overflow, the deque was cleared and count is capped.
            let _ = self.rx.push_back(*byte);
        }
        Ok(())
    }

    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }
}
