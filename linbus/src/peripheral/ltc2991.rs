//! LTC2991 octal I2C voltage, current and temperature monitor driver.
//!
//! Inputs V1..V8 are used in pairs. Each pair is configured for
//! single-ended voltages, a differential voltage, or a remote diode
//! temperature; the driver switches the pair configuration as needed and
//! caches the three control registers so repeated readings of one kind do
//! not rewrite them.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/2991ff.pdf>

use std::time::Duration;

use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::{I2cDevice, I2cHandle};
use crate::regcache::RegisterCache;
use crate::retry::{poll_until, DEFAULT_DEADLINE};

/// Default I2C address (ADR2..ADR0 low)
pub const DEFAULT_ADDRESS: u8 = 0x48;

#[allow(dead_code)]
mod regs {
    /// Channel enable / trigger, busy flag in bit 2
    pub const TRIGGER: u8 = 0x01;
    pub const V1234_CONTROL: u8 = 0x06;
    pub const V5678_CONTROL: u8 = 0x07;
    pub const CONTROL: u8 = 0x08;
    /// V1, or T1 when pair 1 measures temperature
    pub const V1_T1: u8 = 0x0A;
    /// V2, or V1-V2 when pair 1 is differential
    pub const V2_D1: u8 = 0x0C;
    pub const V3_T2: u8 = 0x0E;
    pub const V4_D2: u8 = 0x10;
    pub const V5_T3: u8 = 0x12;
    pub const V6_D3: u8 = 0x14;
    pub const V7_T4: u8 = 0x16;
    pub const V8_D4: u8 = 0x18;
    /// Internal temperature
    pub const T_INTERNAL: u8 = 0x1A;
    /// Supply voltage, offset by 2.5 V
    pub const VCC: u8 = 0x1C;
}

const BUSY: u8 = 0x04;

/// Single-ended voltage LSB, microvolts
const SINGLE_ENDED_UV: f64 = 305.18;
/// Differential voltage LSB, microvolts
const DIFFERENTIAL_UV: f64 = 19.075;
/// VCC reads relative to this offset
const VCC_OFFSET: f64 = 2.5;
/// Diode ideality factor the chip assumes
const DEFAULT_ETA: f64 = 1.004;

/// Control register values for each measurement kind:
/// (V1234_CONTROL, V5678_CONTROL, CONTROL)
const SINGLE_ENDED: [u8; 3] = [0x00, 0x00, 0x00];
const DIFFERENTIAL: [u8; 3] = [0x11, 0x11, 0x00];
/// Temperature in Kelvin for every pair and the internal sensor
const KELVIN: [u8; 3] = [0x66, 0x66, 0x04];

pub struct Ltc2991<B: I2cBus = I2cHandle> {
    dev: I2cDevice<B>,
    cache: RegisterCache,
    deadline: Duration,
}

impl Ltc2991 {
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        Ok(Self::new(I2cDevice::open(bus, addr)?))
    }
}

impl<B: I2cBus> Ltc2991<B> {
    pub fn new(dev: I2cDevice<B>) -> Self {
        Self {
            dev,
            cache: RegisterCache::new(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn set_deadline(&mut self, deadline: Duration) {
        self.deadline = deadline;
    }

    fn control(&mut self, values: [u8; 3]) -> Result<()> {
        let registers = [regs::V1234_CONTROL, regs::V5678_CONTROL, regs::CONTROL];
        for (reg, value) in registers.into_iter().zip(values) {
            self.cache.update(&mut self.dev, reg, 0xff, value)?;
        }
        Ok(())
    }

    /// Start a conversion on `channel` (0 = internal/VCC, 1-4 = input
    /// pairs) and wait for it.
    fn trigger(&mut self, channel: u8) -> Result<()> {
        self.dev.write_register(regs::TRIGGER, 1 << (channel + 3))?;
        let dev = &mut self.dev;
        poll_until(self.deadline, "LTC2991 conversion", || {
            Ok(dev.read_register(regs::TRIGGER)? & BUSY == 0)
        })
    }

    fn read_result(&mut self, reg: u8) -> Result<(u8, u8)> {
        let data = self.dev.read_registers(reg, 2)?;
        Ok((data[0], data[1]))
    }

    /// Temperature in °C of `input` 0-4, where 0 is the internal sensor
    /// and 1-4 the remote diodes on V1/V2 through V7/V8.
    ///
    /// `eta` rescales for a diode whose ideality factor differs from the
    /// chip's assumed 1.004.
    pub fn temperature(&mut self, input: u8, eta: Option<f64>) -> Result<f64> {
        const REGS: [u8; 5] = [
            regs::T_INTERNAL,
            regs::V1_T1,
            regs::V3_T2,
            regs::V5_T3,
            regs::V7_T4,
        ];
        let reg = *REGS
            .get(input as usize)
            .ok_or_else(|| Error::invalid(format!("LTC2991 has no temperature input {}", input)))?;
        if let Some(eta) = eta {
            if eta.is_nan() || eta <= 0.0 {
                return Err(Error::invalid(format!("Ideality factor {} must be positive", eta)));
            }
        }

        self.control(KELVIN)?;
        self.trigger(input)?;
        let (high, low) = self.read_result(reg)?;
        let mut kelvin = f64::from(u16::from_be_bytes([high, low]) & 0x1fff) / 16.0;
        if let Some(eta) = eta {
            kelvin *= DEFAULT_ETA / eta;
        }
        Ok(kelvin - 273.15)
    }

    /// Single-ended voltage of `input` 0-8, where 0 is VCC and 1-8 are
    /// V1-V8.
    pub fn voltage(&mut self, input: u8) -> Result<f64> {
        const REGS: [u8; 9] = [
            regs::VCC,
            regs::V1_T1,
            regs::V2_D1,
            regs::V3_T2,
            regs::V4_D2,
            regs::V5_T3,
            regs::V6_D3,
            regs::V7_T4,
            regs::V8_D4,
        ];
        let reg = *REGS
            .get(input as usize)
            .ok_or_else(|| Error::invalid(format!("LTC2991 has no voltage input {}", input)))?;

        self.control(SINGLE_ENDED)?;
        // 0 -> 0, 1|2 -> 1, 3|4 -> 2, 5|6 -> 3, 7|8 -> 4
        self.trigger((input + 1) / 2)?;
        let (high, low) = self.read_result(reg)?;
        let volts = to_volts(high, low, SINGLE_ENDED_UV);
        Ok(if input == 0 { volts + VCC_OFFSET } else { volts })
    }

    /// Differential voltage of pair `input` 1-4: V1-V2, V3-V4, V5-V6 or
    /// V7-V8.
    pub fn differential(&mut self, input: u8) -> Result<f64> {
        const REGS: [u8; 4] = [regs::V2_D1, regs::V4_D2, regs::V6_D3, regs::V8_D4];
        let reg = *input
            .checked_sub(1)
            .and_then(|i| REGS.get(i as usize))
            .ok_or_else(|| Error::invalid(format!("LTC2991 has no differential input {}", input)))?;

        self.control(DIFFERENTIAL)?;
        self.trigger(input)?;
        let (high, low) = self.read_result(reg)?;
        Ok(to_volts(high, low, DIFFERENTIAL_UV))
    }
}

/// Decode a 14-bit magnitude with its sign in bit 14.
fn to_volts(high: u8, low: u8, microvolts_per_lsb: f64) -> f64 {
    let raw = i32::from(u16::from_be_bytes([high, low]) & 0x3fff);
    let value = if high & 0x40 != 0 { raw - 0x4000 } else { raw };
    f64::from(value) * microvolts_per_lsb / 1e6
}
