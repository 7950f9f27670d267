//! LTC2945 wide range I2C power monitor driver (snapshot mode only).
//!
//! Each reading triggers one snapshot conversion of the selected input,
//! waits for the ADC busy bit to clear and reads the 12-bit result.
//!
//! The address is set by the ADR1/ADR0 pins:
//!
//! | ADR1 | ADR0 | address |
//! |------|------|---------|
//! | H    | L    | 0x67    |
//! | NC   | H    | 0x68    |
//! | H    | H    | 0x69    |
//! | NC   | NC   | 0x6A    |
//! | NC   | L    | 0x6B    |
//! | L    | H    | 0x6C    |
//! | H    | NC   | 0x6D    |
//! | L    | NC   | 0x6E    |
//! | L    | L    | 0x6F    |
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/2945fa.pdf>

use std::time::Duration;

use strum::FromRepr;

use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::{I2cDevice, I2cHandle};
use crate::retry::{poll_until, DEFAULT_DEADLINE};

/// Default I2C address (both address pins floating)
pub const DEFAULT_ADDRESS: u8 = 0x6A;

mod regs {
    pub const CONTROL: u8 = 0x00;
    pub const SENSE_MSB: u8 = 0x14;
    pub const VIN_MSB: u8 = 0x1E;
    pub const ADIN_MSB: u8 = 0x28;
}

/// CONTROL register bits
mod control {
    /// Snapshot mode
    pub const SNAPSHOT: u8 = 0x80;
    /// Snapshot channel: ADIN
    pub const ADIN: u8 = 0x40;
    /// Snapshot channel: VIN
    pub const VIN: u8 = 0x20;
    /// ADC busy (read only)
    pub const BUSY: u8 = 0x08;
    /// VIN measured at SENSE+ rather than VDD
    pub const VIN_SENSE: u8 = 0x04;
}

/// Delta SENSE resolution, volts per LSB
const SENSE_LSB: f64 = 25e-6;
/// VIN resolution, volts per LSB
const VIN_LSB: f64 = 25e-3;
/// ADIN resolution, volts per LSB
const ADIN_LSB: f64 = 0.5e-3;

/// Input to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Source {
    /// Voltage across the sense resistor
    DeltaSense = 0,
    /// Supply voltage at SENSE+
    SensePlus = 1,
    /// Supply voltage at VDD
    Vdd = 2,
    /// ADIN pin
    Adin = 3,
}

impl Source {
    fn control(self) -> u8 {
        match self {
            Source::DeltaSense => control::SNAPSHOT,
            Source::SensePlus => control::SNAPSHOT | control::VIN | control::VIN_SENSE,
            Source::Vdd => control::SNAPSHOT | control::VIN,
            Source::Adin => control::SNAPSHOT | control::ADIN,
        }
    }

    fn result_register(self) -> u8 {
        match self {
            Source::DeltaSense => regs::SENSE_MSB,
            Source::SensePlus | Source::Vdd => regs::VIN_MSB,
            Source::Adin => regs::ADIN_MSB,
        }
    }
}

pub struct Ltc2945<B: I2cBus = I2cHandle> {
    dev: I2cDevice<B>,
    deadline: Duration,
}

impl Ltc2945 {
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        Ok(Self::new(I2cDevice::open(bus, addr)?))
    }
}

impl<B: I2cBus> Ltc2945<B> {
    pub fn new(dev: I2cDevice<B>) -> Self {
        Self {
            dev,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// How long to wait for a conversion before giving up.
    pub fn set_deadline(&mut self, deadline: Duration) {
        self.deadline = deadline;
    }

    /// Convert `source` and return the raw 12-bit result.
    pub fn convert(&mut self, source: Source) -> Result<u16> {
        self.dev.write_register(regs::CONTROL, source.control())?;

        let dev = &mut self.dev;
        poll_until(self.deadline, "LTC2945 conversion", || {
            Ok(dev.read_register(regs::CONTROL)? & control::BUSY == 0)
        })?;

        let data = self.dev.read_registers(source.result_register(), 2)?;
        Ok(u16::from(data[0]) << 4 | u16::from(data[1]) >> 4)
    }

    /// Current through a sense resistor of `ohms`, in amps.
    pub fn i_sense(&mut self, ohms: f64) -> Result<f64> {
        if ohms.is_nan() || ohms <= 0.0 {
            return Err(Error::invalid(format!("Sense resistance {} must be positive", ohms)));
        }
        Ok(f64::from(self.convert(Source::DeltaSense)?) * SENSE_LSB / ohms)
    }

    /// SENSE+ voltage, 0 to 102.375 V.
    pub fn v_sense(&mut self) -> Result<f64> {
        Ok(f64::from(self.convert(Source::SensePlus)?) * VIN_LSB)
    }

    /// VDD voltage, 0 to 102.375 V.
    pub fn v_vdd(&mut self) -> Result<f64> {
        Ok(f64::from(self.convert(Source::Vdd)?) * VIN_LSB)
    }

    /// ADIN voltage, 0 to 2.0475 V.
    pub fn v_adin(&mut self) -> Result<f64> {
        Ok(f64::from(self.convert(Source::Adin)?) * ADIN_LSB)
    }
}
