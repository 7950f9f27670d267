//! Bus configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::I2cDevice;
use crate::retry::RetryPolicy;

/// Where and how to reach I2C devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Adapter index for `/dev/i2c-N`; `None` runs on the stub bus.
    pub i2c_bus: Option<u32>,

    /// Kernel address retries. `None` keeps the adapter default.
    pub i2c_retries: Option<u32>,

    /// Kernel adapter timeout in units of 10 ms. `None` keeps the default.
    pub i2c_timeout: Option<u32>,

    /// Deadline of the retry policy wrapped around busy-device operations,
    /// e.g. [`N24c02::from_config`](crate::peripheral::N24c02::from_config).
    pub retry_deadline: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            i2c_bus: None,
            i2c_retries: None,
            i2c_timeout: None,
            retry_deadline: Duration::from_millis(DEFAULT_DEADLINE_MS),
        }
    }
}

const DEFAULT_DEADLINE_MS: u64 = 500;
const MAX_DEADLINE_MS: u64 = 60_000;

impl BusConfig {
    /// Parse configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LINBUS_I2C_BUS`: adapter index (unset selects the stub bus)
    /// - `LINBUS_I2C_RETRIES`: kernel NACK retries
    /// - `LINBUS_I2C_TIMEOUT`: kernel timeout, 10 ms units
    /// - `LINBUS_RETRY_DEADLINE_MS`: retry deadline (default: 500, clamped
    ///   to 1-60000)
    pub fn from_env() -> Result<Self> {
        let deadline_ms = parse_var::<u64>("LINBUS_RETRY_DEADLINE_MS")?
            .unwrap_or(DEFAULT_DEADLINE_MS)
            .clamp(1, MAX_DEADLINE_MS);

        Ok(Self {
            i2c_bus: parse_var("LINBUS_I2C_BUS")?,
            i2c_retries: parse_var("LINBUS_I2C_RETRIES")?,
            i2c_timeout: parse_var("LINBUS_I2C_TIMEOUT")?,
            retry_deadline: Duration::from_millis(deadline_ms),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_deadline)
    }

    /// Open the device at `addr` on the configured bus and apply the kernel
    /// retry and timeout settings.
    pub fn open_i2c(&self, addr: u8) -> Result<I2cDevice> {
        let mut dev = I2cDevice::open(self.i2c_bus, addr)?;
        self.apply(&mut dev)?;
        Ok(dev)
    }

    pub fn apply<B: I2cBus>(&self, dev: &mut I2cDevice<B>) -> Result<()> {
        if let Some(retries) = self.i2c_retries {
            dev.set_retries(retries)?;
        }
        if let Some(timeout) = self.i2c_timeout {
            dev.set_timeout(timeout)?;
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{}={:?} is not a valid number", name, value))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            Err(Error::Config(format!("{} is not valid unicode", name)))
        }
    }
}
