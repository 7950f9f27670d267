//! Userspace access to Linux I2C, SPI and GPIO, plus drivers for the chips
//! commonly found on those buses.
//!
//! The centre of the crate is the I2C transaction engine in [`i2c`]: a list
//! of writes and reads is marshalled into one `I2C_RDWR` ioctl, so the whole
//! exchange happens between a single START and STOP. [`spi`] does the same
//! for `SPI_IOC_MESSAGE`. [`gpio`] wraps the GPIO character device and the
//! legacy sysfs interface. Chip drivers in [`peripheral`] are generic over
//! the bus traits in [`hw_trait`] and run unchanged against real hardware,
//! the stub bus, or a mock.

pub mod config;
pub mod error;
pub mod gpio;
pub mod hw_trait;
pub mod i2c;
pub mod peripheral;
pub mod regcache;
pub mod retry;
pub mod spi;
pub mod tracing;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
