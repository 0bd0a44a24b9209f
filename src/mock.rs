//! Test doubles for running the drivers without hardware.
//!
//! | Mock | Implements | Purpose |
//! |------|------------|---------|
//! | [`MockBus`] | [`Transport`], [`embedded_hal::i2c::I2c`] | Register model of one device, records transactions |
//! | [`MockClock`] | [`Clock`] | Controllable millisecond time source |
//! | [`MockDelay`] | [`embedded_hal::delay::DelayNs`] | Advances a [`MockClock`] instead of sleeping |
//!
//! With the `async` feature [`MockBus`] and [`MockDelay`] also implement the
//! `embedded-hal-async` traits.
//!
//! # Example
//!
//! ```rust
//! use adc128d818::mock::{MockBus, MockClock, MockDelay};
//! use adc128d818::sync_adc::Adc128d818;
//! use adc128d818::Config;
//!
//! let mut bus = MockBus::new(0x1D);
//! bus.channels[0] = 0x8000;
//! let clock = MockClock::new();
//! let mut delay = MockDelay::new(&clock);
//!
//! let mut adc = Adc128d818::new(&mut bus, &mut delay, &clock, 0x1D)
//!     .begin(Config::default())
//!     .unwrap();
//! assert_eq!(adc.read(0).unwrap(), 0x8000);
//! ```

use core::cell::Cell;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};
use heapless::{Deque, Vec};

use crate::{Clock, Transport, BUFFER_LENGTH};

/// Capacity of [`MockBus::transactions`]. Further transactions are not recorded.
pub const LOG_CAPACITY: usize = 128;

/// One bus transaction as seen by the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// Write of a register address only.
    SetPointer(u8),
    /// Write of a register address followed by a value.
    WriteRegister(u8, u8),
    /// Read of `count` bytes starting at `register`.
    Request { register: u8, count: u8 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    NoAcknowledge,
}

impl i2c::Error for MockError {
    fn kind(&self) -> ErrorKind {
        match self {
            MockError::NoAcknowledge => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
        }
    }
}

/// Register model of an ADC128D818.
///
/// The register pointer is kept across transactions like on the real device. Channel data
/// registers answer big endian from [`MockBus::channels`], all other registers answer from
/// [`MockBus::registers`].
#[derive(Debug)]
pub struct MockBus {
    address: u8,
    pointer: u8,
    rx: Deque<u8, BUFFER_LENGTH>,
    /// 8 bit registers, written by register writes.
    pub registers: [u8; 0x40],
    /// Contents of the channel data registers 0x20 to 0x27.
    pub channels: [u16; 8],
    /// Values answered by successive busy status reads before falling back to `registers`.
    pub busy_status: Deque<u8, 16>,
    /// When false the device acknowledges requests but never sends data.
    pub responsive: bool,
    /// When true every transaction is refused.
    pub nack: bool,
    pub transactions: Vec<Transaction, LOG_CAPACITY>,
}

impl MockBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            pointer: 0,
            rx: Deque::new(),
            registers: [0; 0x40],
            channels: [0; 8],
            busy_status: Deque::new(),
            responsive: true,
            nack: false,
            transactions: Vec::new(),
        }
    }

    /// Device that reports not-ready `polls` times before becoming ready.
    pub fn with_not_ready_polls(mut self, polls: usize) -> Self {
        for _ in 0..polls {
            if self.busy_status.push_back(0x02).is_err() {
                break;
            }
        }
        self
    }

    /// Register writes in order, pointer writes and reads left out.
    pub fn register_writes(&self) -> Vec<(u8, u8), LOG_CAPACITY> {
        self.transactions
            .iter()
            .filter_map(|t| match *t {
                Transaction::WriteRegister(reg, value) => Some((reg, value)),
                _ => None,
            })
            .collect()
    }

    /// Number of reads started at `register`.
    pub fn requests_of(&self, register: u8) -> usize {
        self.transactions
            .iter()
            .filter(|t| matches!(t, Transaction::Request { register: r, .. } if *r == register))
            .count()
    }

    fn log(&mut self, transaction: Transaction) {
        let _ = self.transactions.push(transaction);
    }

    fn check_address(&self, address: u8) -> Result<(), MockError> {
        if self.nack || address != self.address {
            return Err(MockError::NoAcknowledge);
        }
        Ok(())
    }

    fn write_bytes(&mut self, address: u8, bytes: &[u8]) -> Result<(), MockError> {
        self.check_address(address)?;
        let (&reg, values) = match bytes.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        self.pointer = reg;
        if values.is_empty() {
            self.log(Transaction::SetPointer(reg));
        }
        for &value in values {
            self.registers[reg as usize % self.registers.len()] = value;
            self.log(Transaction::WriteRegister(reg, value));
        }
        Ok(())
    }

    fn read_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<(), MockError> {
        self.check_address(address)?;
        self.log(Transaction::Request {
            register: self.pointer,
            count: buf.len() as u8,
        });
        let reg = self.pointer;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = match reg {
                0x20..=0x27 => {
                    let [high, low] = self.channels[(reg - 0x20) as usize].to_be_bytes();
                    if i % 2 == 0 {
                        high
                    } else {
                        low
                    }
                }
                0x0C if i == 0 => match self.busy_status.pop_front() {
                    Some(status) => status,
                    None => self.registers[reg as usize],
                },
                _ => self.registers[reg as usize % self.registers.len()],
            };
        }
        Ok(())
    }
}

impl Transport for MockBus {
    type Error = MockError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), MockError> {
        self.write_bytes(address, bytes)
    }

    fn request(&mut self, address: u8, count: u8) -> Result<(), MockError> {
        self.rx.clear();
        let mut buf = [0u8; BUFFER_LENGTH];
        let count = (count as usize).min(BUFFER_LENGTH);
        self.read_bytes(address, &mut buf[..count])?;
        if self.responsive {
            for byte in &buf[..count] {
                let _ = self.rx.push_back(*byte);
            }
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

impl i2c::ErrorType for MockBus {
    type Error = MockError;
}

impl i2c::I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), MockError> {
        for op in operations {
            match op {
                Operation::Write(bytes) => self.write_bytes(address, *bytes)?,
                Operation::Read(buf) => self.read_bytes(address, &mut **buf)?,
            }
        }
        Ok(())
    }
}

#[cfg(feature = "async")]
impl embedded_hal_async::i2c::I2c for MockBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), MockError> {
        i2c::I2c::transaction(self, address, operations)
    }
}

/// Millisecond clock that only moves when told to, or when a [`MockDelay`] sleeps on it.
#[derive(Debug, Default)]
pub struct MockClock {
    nanos: Cell<u64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `ms`, e.g. just before the millisecond counter wraps.
    pub fn starting_at(ms: u32) -> Self {
        Self {
            nanos: Cell::new(ms as u64 * 1_000_000),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.advance_ns(ms as u64 * 1_000_000);
    }

    fn advance_ns(&self, ns: u64) {
        self.nanos.set(self.nanos.get() + ns);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        (self.nanos.get() / 1_000_000) as u32
    }
}

/// Delay that advances a [`MockClock`] instead of sleeping.
#[derive(Debug)]
pub struct MockDelay<'a> {
    clock: &'a MockClock,
}

impl<'a> MockDelay<'a> {
    pub fn new(clock: &'a MockClock) -> Self {
        Self { clock }
    }
}

impl<'a> DelayNs for MockDelay<'a> {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(ns as u64);
    }
}

#[cfg(feature = "async")]
impl<'a> embedded_hal_async::delay::DelayNs for MockDelay<'a> {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(ns as u64);
    }
}
