//! N24C02 2-Kbit (256 x 8) serial EEPROM driver.
//!
//! The chip ignores its address while an internal write cycle runs (up to
//! 5 ms), so every access goes through a [`RetryPolicy`].

use crate::config::BusConfig;
use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::{I2cDevice, I2cHandle};
use crate::retry::RetryPolicy;
use crate::tracing::prelude::*;

/// Default I2C address (A2..A0 tied low)
pub const DEFAULT_ADDRESS: u8 = 0x50;

/// Capacity in bytes
pub const SIZE: usize = 256;

/// Write page size. A write that runs past a page boundary wraps to the
/// start of the same page.
pub const PAGE_SIZE: usize = 16;

pub struct N24c02<B: I2cBus = I2cHandle> {
    dev: I2cDevice<B>,
    retry: RetryPolicy,
}

impl N24c02 {
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        Ok(Self::new(I2cDevice::open(bus, addr)?))
    }

    /// Open on the configured bus, with the kernel settings and retry
    /// deadline from `config`.
    pub fn from_config(config: &BusConfig, addr: u8) -> Result<Self> {
        Ok(Self::new(config.open_i2c(addr)?).with_retry(config.retry_policy()))
    }
}

impl<B: I2cBus> N24c02<B> {
    pub fn new(dev: I2cDevice<B>) -> Self {
        Self {
            dev,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read `len` bytes starting at `offset`. Reads do not wrap.
    ///
    /// Zero-filled on the stub bus.
    pub fn read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        check_range(offset, len)?;
        let dev = &mut self.dev;
        self.retry.run(|| dev.read_registers(offset as u8, len))
    }

    /// Write `data` starting at `offset`, one page-aligned chunk per bus
    /// transaction.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_range(offset, data.len())?;

        let mut offset = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let room = PAGE_SIZE - offset % PAGE_SIZE;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));

            let mut frame = Vec::with_capacity(chunk.len() + 1);
            frame.push(offset as u8);
            frame.extend_from_slice(chunk);
            let dev = &mut self.dev;
            self.retry.run(|| dev.write(frame.clone()))?;
            trace!(offset, len = chunk.len(), "Wrote EEPROM page");

            offset += chunk.len();
            rest = tail;
        }
        Ok(())
    }
}

fn check_range(offset: usize, len: usize) -> Result<()> {
    if len == 0 || offset + len > SIZE {
        return Err(Error::invalid(format!(
            "EEPROM access of {} bytes at {} outside 0..{}",
            len, offset, SIZE
        )));
    }
    Ok(())
}
