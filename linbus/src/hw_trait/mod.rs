//! Hardware abstraction layer traits.
//!
//! This module defines the bus interface traits (I2C, SPI, GPIO) that let
//! the device types and chip drivers run against different backends: the
//! Linux character devices, the stub trace bus, or a test double.

pub mod gpio;
pub mod i2c;
pub mod spi;

// Re-export traits
pub use gpio::{Drive, GpioPin, PinConfig, PinMode};
pub use i2c::{I2cBus, Outcome};
pub use spi::SpiBus;

pub use crate::error::{Error, Result};
