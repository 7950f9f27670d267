//! TMP100/TMP101 digital temperature sensor driver.
//!
//! Temperatures are 12-bit two's complement, left-justified in a 16-bit
//! register: the high byte is whole degrees, the top nibble of the low
//! byte sixteenths.
//!
//! Datasheet: <https://www.ti.com/lit/ds/symlink/tmp101.pdf>

use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::{I2cDevice, I2cHandle};

/// Default I2C address (ADD0 floating)
pub const DEFAULT_ADDRESS: u8 = 0x49;

mod regs {
    pub const TEMPERATURE: u8 = 0x00;
    pub const CONFIG: u8 = 0x01;
    pub const T_LOW: u8 = 0x02;
    pub const T_HIGH: u8 = 0x03;
}

/// Configuration register fields
mod config {
    /// OS/ALERT: alert output state, or one-shot trigger in shutdown
    pub const ALERT: u8 = 0x80;
    /// R1:R0 converter resolution, 9 to 12 bits
    pub const RESOLUTION: u8 = 0x60;
    pub const RESOLUTION_SHIFT: u8 = 5;
    /// F1:F0 consecutive faults before alert
    pub const FAULTS: u8 = 0x18;
    pub const FAULTS_SHIFT: u8 = 3;
    /// POL: alert output active high
    pub const POLARITY: u8 = 0x04;
    /// TM: interrupt mode instead of comparator mode
    pub const MODE: u8 = 0x02;
    /// SD: shutdown
    pub const SHUTDOWN: u8 = 0x01;
}

pub struct Tmp101<B: I2cBus = I2cHandle> {
    dev: I2cDevice<B>,
}

impl Tmp101 {
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        Ok(Self::new(I2cDevice::open(bus, addr)?))
    }
}

impl<B: I2cBus> Tmp101<B> {
    pub fn new(dev: I2cDevice<B>) -> Self {
        Self { dev }
    }

    pub fn device(&mut self) -> &mut I2cDevice<B> {
        &mut self.dev
    }

    fn read_celsius(&mut self, reg: u8) -> Result<f32> {
        let data = self.dev.read_registers(reg, 2)?;
        Ok(to_celsius(data[0], data[1]))
    }

    fn write_celsius(&mut self, reg: u8, celsius: f32) -> Result<()> {
        let [high, low] = from_celsius(celsius)?;
        self.dev.write([reg, high, low])
    }

    /// Current temperature in °C
    pub fn temperature(&mut self) -> Result<f32> {
        self.read_celsius(regs::TEMPERATURE)
    }

    pub fn config(&mut self) -> Result<u8> {
        self.dev.read_register(regs::CONFIG)
    }

    pub fn set_config(&mut self, config: u8) -> Result<()> {
        self.dev.write_register(regs::CONFIG, config)
    }

    fn update_config(&mut self, mask: u8, bits: u8) -> Result<()> {
        let config = self.config()?;
        self.set_config((config & !mask) | (bits & mask))
    }

    fn flag(&mut self, mask: u8) -> Result<bool> {
        Ok(self.config()? & mask != 0)
    }

    fn set_flag(&mut self, mask: u8, on: bool) -> Result<()> {
        self.update_config(mask, if on { mask } else { 0 })
    }

    /// Temperature at which the alert clears, in °C
    pub fn alert_low(&mut self) -> Result<f32> {
        self.read_celsius(regs::T_LOW)
    }

    pub fn set_alert_low(&mut self, celsius: f32) -> Result<()> {
        self.write_celsius(regs::T_LOW, celsius)
    }

    /// Temperature at which the alert fires, in °C
    pub fn alert_high(&mut self) -> Result<f32> {
        self.read_celsius(regs::T_HIGH)
    }

    pub fn set_alert_high(&mut self, celsius: f32) -> Result<()> {
        self.write_celsius(regs::T_HIGH, celsius)
    }

    pub fn alert(&mut self) -> Result<bool> {
        self.flag(config::ALERT)
    }

    pub fn set_alert(&mut self, on: bool) -> Result<()> {
        self.set_flag(config::ALERT, on)
    }

    /// Converter resolution: 0 = 9 bits through 3 = 12 bits
    pub fn resolution(&mut self) -> Result<u8> {
        Ok((self.config()? & config::RESOLUTION) >> config::RESOLUTION_SHIFT)
    }

    pub fn set_resolution(&mut self, resolution: u8) -> Result<()> {
        if resolution > 3 {
            return Err(Error::invalid(format!("TMP101 resolution {} > 3", resolution)));
        }
        self.update_config(config::RESOLUTION, resolution << config::RESOLUTION_SHIFT)
    }

    /// Fault queue: 0..=3 selects 1, 2, 4 or 6 consecutive faults
    pub fn faults(&mut self) -> Result<u8> {
        Ok((self.config()? & config::FAULTS) >> config::FAULTS_SHIFT)
    }

    pub fn set_faults(&mut self, faults: u8) -> Result<()> {
        if faults > 3 {
            return Err(Error::invalid(format!("TMP101 fault queue {} > 3", faults)));
        }
        self.update_config(config::FAULTS, faults << config::FAULTS_SHIFT)
    }

    pub fn polarity(&mut self) -> Result<bool> {
        self.flag(config::POLARITY)
    }

    pub fn set_polarity(&mut self, active_high: bool) -> Result<()> {
        self.set_flag(config::POLARITY, active_high)
    }

    /// True in interrupt mode, false in comparator mode
    pub fn mode(&mut self) -> Result<bool> {
        self.flag(config::MODE)
    }

    pub fn set_mode(&mut self, interrupt: bool) -> Result<()> {
        self.set_flag(config::MODE, interrupt)
    }

    pub fn shutdown(&mut self) -> Result<bool> {
        self.flag(config::SHUTDOWN)
    }

    pub fn set_shutdown(&mut self, on: bool) -> Result<()> {
        self.set_flag(config::SHUTDOWN, on)
    }
}

fn to_celsius(high: u8, low: u8) -> f32 {
    f32::from(i16::from_be_bytes([high, low])) / 256.0
}

fn from_celsius(celsius: f32) -> Result<[u8; 2]> {
    if !(-128.0..128.0).contains(&celsius) {
        return Err(Error::invalid(format!(
            "Temperature {}°C outside -128..128",
            celsius
        )));
    }
    Ok(((celsius * 256.0) as i16).to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;
    use test_case::test_case;

    const ADDR: u8 = DEFAULT_ADDRESS;

    fn sensor() -> (MockBus, Tmp101<MockBus>) {
        let mock = MockBus::new();
        let dev = I2cDevice::new(mock.clone(), ADDR).unwrap();
        (mock, Tmp101::new(dev))
    }

    #[test_case(0x19, 0x00, 25.0; "room")]
    #[test_case(0x00, 0x10, 0.0625; "one_lsb")]
    #[test_case(0xff, 0xf0, -0.0625; "just_below_zero")]
    #[test_case(0xe7, 0x00, -25.0; "negative")]
    #[test_case(0x7f, 0xf0, 127.9375; "maximum")]
    #[test_case(0x80, 0x00, -128.0; "minimum")]
    fn decodes_twos_complement(high: u8, low: u8, expected: f32) {
        let (mock, mut tmp) = sensor();
        mock.set_registers(ADDR, regs::TEMPERATURE, &[high, low]);
        assert_eq!(tmp.temperature().unwrap(), expected);
    }

    #[test]
    fn alert_limits() {
        let (mock, mut tmp) = sensor();
        tmp.set_alert_high(29.0).unwrap();
        tmp.set_alert_low(-27.5).unwrap();
        assert_eq!(mock.register(ADDR, regs::T_HIGH), 29);
        assert_eq!(tmp.alert_high().unwrap(), 29.0);
        assert_eq!(tmp.alert_low().unwrap(), -27.5);
        assert!(tmp.set_alert_high(128.0).is_err());
    }

    #[test]
    fn config_fields() {
        let (mock, mut tmp) = sensor();
        mock.set_registers(ADDR, regs::CONFIG, &[0x80]);

        tmp.set_resolution(3).unwrap();
        tmp.set_faults(2).unwrap();
        tmp.set_polarity(true).unwrap();
        assert_eq!(mock.register(ADDR, regs::CONFIG), 0x80 | 0x60 | 0x10 | 0x04);
        assert_eq!(tmp.resolution().unwrap(), 3);
        assert_eq!(tmp.faults().unwrap(), 2);
        assert!(tmp.polarity().unwrap());
        assert!(tmp.alert().unwrap());

        tmp.set_resolution(1).unwrap();
        assert_eq!(tmp.resolution().unwrap(), 1);
        // Other fields survive.
        assert_eq!(tmp.faults().unwrap(), 2);

        tmp.set_alert(false).unwrap();
        tmp.set_shutdown(true).unwrap();
        tmp.set_mode(true).unwrap();
        assert!(!tmp.alert().unwrap());
        assert!(tmp.shutdown().unwrap());
        assert!(tmp.mode().unwrap());

        assert!(tmp.set_resolution(4).is_err());
        assert!(tmp.set_faults(4).is_err());
    }

    #[test]
    fn stub_reads_zero() {
        let mut tmp = Tmp101::open(None, ADDR).unwrap();
        assert_eq!(tmp.temperature().unwrap(), 0.0);
    }
}
