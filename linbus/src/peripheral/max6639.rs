//! MAX6639 2-channel temperature monitor and dual PWM fan controller driver.
//!
//! Typical use: [`reset`](Max6639::reset), then
//! [`set_fan_config`](Max6639::set_fan_config) for fans that need
//! non-default settings, then [`set_pwm_mode`](Max6639::set_pwm_mode) or
//! [`set_rpm_mode`](Max6639::set_rpm_mode) for each fan.
//!
//! Datasheet: <https://www.analog.com/media/en/technical-documentation/data-sheets/MAX6639-MAX6639F.pdf>

use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::{I2cDevice, I2cHandle};
use crate::regcache::RegisterCache;
use crate::tracing::prelude::*;

/// Default I2C address (ADD pin floating)
pub const DEFAULT_ADDRESS: u8 = 0x58;

/// Register addresses. Per-channel and per-fan registers are indexed by
/// channel or fan 1 and 2.
#[allow(dead_code)]
mod regs {
    pub const TEMP: [u8; 2] = [0x00, 0x01];
    pub const STATUS: u8 = 0x02;
    pub const MASK: u8 = 0x03;
    pub const CONFIG: u8 = 0x04;
    pub const EXT_TEMP: [u8; 2] = [0x05, 0x06];
    pub const ALERT_LIMIT: [u8; 2] = [0x08, 0x09];
    pub const OT_LIMIT: [u8; 2] = [0x0A, 0x0B];
    pub const THERM_LIMIT: [u8; 2] = [0x0C, 0x0D];
    pub const FAN_CONFIG1: [u8; 2] = [0x10, 0x14];
    pub const FAN_CONFIG2A: [u8; 2] = [0x11, 0x15];
    pub const FAN_CONFIG2B: [u8; 2] = [0x12, 0x16];
    pub const FAN_CONFIG3: [u8; 2] = [0x13, 0x17];
    pub const TACH: [u8; 2] = [0x20, 0x21];
    pub const START_TACH: [u8; 2] = [0x22, 0x23];
    pub const PPR: [u8; 2] = [0x24, 0x25];
    pub const DUTY: [u8; 2] = [0x26, 0x27];
    pub const START_TEMP: [u8; 2] = [0x28, 0x29];
    pub const DEVICE_ID: u8 = 0x3D;
    pub const MANUFACTURER_ID: u8 = 0x3E;
    pub const REVISION: u8 = 0x3F;
}

/// Global configuration register bits
mod config {
    pub const STANDBY: u8 = 0x80;
    pub const POR: u8 = 0x40;
    /// Disables the SMBus timeout when set
    pub const SMB_TIMEOUT_DISABLE: u8 = 0x20;
    /// Channel 2 measures the local sensor instead of a remote diode
    pub const LOCAL_CHANNEL2: u8 = 0x10;
    pub const PWM_HIGH_FREQ: u8 = 0x08;
}

/// Fan configuration 1 bits
mod fan1 {
    pub const PWM_MODE: u8 = 0x80;
    pub const RATE_OF_CHANGE: u8 = 0x70;
    /// Temperature channel control (bits 3:2) and RPM range (bits 1:0)
    pub const RPM_CONTROL: u8 = 0x8F;
}

/// Duty cycle register full scale
const DUTY_STEPS: f64 = 120.0;

const EXPECTED_MANUFACTURER: u8 = 0x4D;

/// Options for [`Max6639::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetOptions {
    pub standby: bool,
    pub smb_timeout: bool,
    /// Use the local sensor as channel 2
    pub local: bool,
    /// High-frequency PWM output
    pub pwm_high: bool,
}

/// Options for [`Max6639::set_fan_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanConfig {
    /// PWM frequency select 0-3
    pub freq: u8,
    /// PWM output inverted
    pub polarity: bool,
    /// Duty cycle rate of change 0-7
    pub rate_of_change: u8,
    /// Start the fan at full duty
    pub spinup: bool,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            freq: 1,
            polarity: false,
            rate_of_change: 0,
            spinup: true,
        }
    }
}

/// Options for [`Max6639::set_rpm_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpmMode {
    /// Base speed, 500-16000
    pub rpm: u32,
    /// Tachometer pulses per revolution, 1-4
    pub ppr: u8,
    /// Temperature (°C) of the fan's channel to regulate to; `None` runs
    /// the fan at a fixed speed
    pub target: Option<u8>,
    /// Keep running when the temperature falls below target
    pub continuous: bool,
}

impl RpmMode {
    pub fn new(rpm: u32) -> Self {
        Self {
            rpm,
            ppr: 2,
            target: None,
            continuous: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanSpeed {
    pub pwm_percent: u8,
    /// Only meaningful in RPM mode
    pub rpm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub device_id: u8,
    pub manufacturer_id: u8,
    pub revision: u8,
}

pub struct Max6639<B: I2cBus = I2cHandle> {
    dev: I2cDevice<B>,
    cache: RegisterCache,
    /// Tach clock select per fan, set by RPM mode
    clock: [u8; 2],
}

impl Max6639 {
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        Ok(Self::new(I2cDevice::open(bus, addr)?))
    }
}

impl<B: I2cBus> Max6639<B> {
    pub fn new(dev: I2cDevice<B>) -> Self {
        Self {
            dev,
            cache: RegisterCache::new(),
            clock: [0; 2],
        }
    }

    fn update(&mut self, reg: u8, mask: u8, value: u8) -> Result<()> {
        self.cache.update(&mut self.dev, reg, mask, value).map(drop)
    }

    pub fn identify(&mut self) -> Result<Identity> {
        let data = self.dev.read_registers(regs::DEVICE_ID, 3)?;
        let id = Identity {
            device_id: data[0],
            manufacturer_id: data[1],
            revision: data[2],
        };
        if id.manufacturer_id == EXPECTED_MANUFACTURER {
            info!(
                "Detected MAX6639: ID=0x{:02X}, Rev=0x{:02X}",
                id.device_id, id.revision
            );
        } else {
            warn!(
                "Unexpected MAX6639 manufacturer ID 0x{:02X}",
                id.manufacturer_id
            );
        }
        Ok(id)
    }

    /// Power-on reset, then apply `options`. Clears the register cache.
    pub fn reset(&mut self, options: ResetOptions) -> Result<()> {
        self.dev.write_register(regs::CONFIG, config::POR)?;

        let mut value = 0;
        if options.standby {
            value |= config::STANDBY;
        }
        if !options.smb_timeout {
            value |= config::SMB_TIMEOUT_DISABLE;
        }
        if options.local {
            value |= config::LOCAL_CHANNEL2;
        }
        if options.pwm_high {
            value |= config::PWM_HIGH_FREQ;
        }
        self.dev.write_register(regs::CONFIG, value)?;

        self.cache.invalidate();
        self.clock = [0; 2];
        debug!(config = value, "Reset MAX6639");
        Ok(())
    }

    pub fn set_fan_config(&mut self, fan: u8, config: FanConfig) -> Result<()> {
        let i = index(fan, "fan")?;
        if config.freq > 3 {
            return Err(Error::invalid(format!("PWM frequency select {} > 3", config.freq)));
        }
        if config.rate_of_change > 7 {
            return Err(Error::invalid(format!(
                "Rate of change {} > 7",
                config.rate_of_change
            )));
        }

        self.update(regs::FAN_CONFIG1[i], fan1::RATE_OF_CHANGE, config.rate_of_change << 4)?;
        self.update(
            regs::FAN_CONFIG2A[i],
            0x02,
            if config.polarity { 0x02 } else { 0x00 },
        )?;
        self.update(
            regs::FAN_CONFIG3[i],
            0x83,
            config.freq | if config.spinup { 0x00 } else { 0x80 },
        )
    }

    /// Run `fan` in PWM mode at `duty` percent.
    pub fn set_pwm_mode(&mut self, fan: u8, duty: u8) -> Result<()> {
        let i = index(fan, "fan")?;
        if duty > 100 {
            return Err(Error::invalid(format!("Duty cycle {}% > 100%", duty)));
        }
        self.update(regs::FAN_CONFIG1[i], fan1::PWM_MODE, fan1::PWM_MODE)?;
        // The chip moves the duty register itself, so it is never cached.
        let steps = (f64::from(duty) * DUTY_STEPS / 100.0).round() as u8;
        self.dev.write_register(regs::DUTY[i], steps)
    }

    /// Run `fan` in RPM mode.
    pub fn set_rpm_mode(&mut self, fan: u8, mode: RpmMode) -> Result<()> {
        let i = index(fan, "fan")?;
        if !(500..=16000).contains(&mode.rpm) {
            return Err(Error::invalid(format!("Fan speed {} RPM outside 500-16000", mode.rpm)));
        }
        if !(1..=4).contains(&mode.ppr) {
            return Err(Error::invalid(format!("Pulses per revolution {} outside 1-4", mode.ppr)));
        }
        if mode.target == Some(0) {
            return Err(Error::invalid("Target temperature must be 1-255°C"));
        }

        // Tach clock sets the full-scale speed: 2000, 4000, 8000, 16000 RPM.
        let clock: u8 = match mode.rpm {
            0..=1500 => 0,
            1501..=3000 => 1,
            3001..=5999 => 2,
            _ => 3,
        };
        self.clock[i] = clock;

        let start_tach = ((60_000u32 << clock) / mode.rpm).min(255) as u8;
        self.update(regs::START_TACH[i], 0xff, start_tach)?;
        self.update(regs::PPR[i], 0xff, ((mode.ppr - 1) << 6) | 0x1e)?;

        match mode.target {
            Some(target) => {
                // Fan 1 follows channel 1, fan 2 follows channel 2.
                let channel = [0x08, 0x04][i];
                self.update(regs::FAN_CONFIG1[i], fan1::RPM_CONTROL, channel | clock)?;
                self.update(regs::START_TEMP[i], 0xff, target)?;
                self.update(
                    regs::FAN_CONFIG2A[i],
                    0x01,
                    if mode.continuous { 0x01 } else { 0x00 },
                )
            }
            None => {
                self.update(regs::FAN_CONFIG1[i], fan1::RPM_CONTROL, clock)?;
                self.update(regs::FAN_CONFIG2A[i], 0x01, 0x01)
            }
        }
    }

    /// Temperature of `channel` 1 or 2 in °C, 0 to 255.875, or `None` on a
    /// diode fault.
    pub fn temperature(&mut self, channel: u8) -> Result<Option<f64>> {
        let i = index(channel, "channel")?;
        // Reading the low byte first latches the high byte.
        let low = self.dev.read_register(regs::EXT_TEMP[i])?;
        if low & 0x01 != 0 {
            return Ok(None);
        }
        let high = self.dev.read_register(regs::TEMP[i])?;
        Ok(Some(f64::from(high) + f64::from(low >> 5) / 8.0))
    }

    pub fn fan_speed(&mut self, fan: u8) -> Result<FanSpeed> {
        let i = index(fan, "fan")?;
        let duty = self.dev.read_register(regs::DUTY[i])?;
        let tach = self.dev.read_register(regs::TACH[i])?;
        let rpm = if tach == 0 {
            0
        } else {
            (60_000u32 << self.clock[i]) / u32::from(tach)
        };
        Ok(FanSpeed {
            pwm_percent: (f64::from(duty) * 100.0 / DUTY_STEPS).round() as u8,
            rpm,
        })
    }
}

fn index(n: u8, what: &str) -> Result<usize> {
    match n {
        1 | 2 => Ok(usize::from(n - 1)),
        _ => Err(Error::invalid(format!("MAX6639 has no {} {}", what, n))),
    }
}
