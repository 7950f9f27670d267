//! TCA6408 8-bit I2C GPIO expander driver.
//!
//! Registers hold one bit per pin. The output, polarity and configuration
//! registers are cached, so pins can be changed one at a time without
//! reading the register back first.
//!
//! Datasheet: <https://www.ti.com/lit/ds/symlink/tca6408a.pdf>

use crate::error::{Error, Result};
use crate::hw_trait::{Drive, GpioPin, I2cBus, PinConfig};
use crate::i2c::{I2cDevice, I2cHandle};
use crate::regcache::RegisterCache;

/// Default I2C address (ADDR low)
pub const DEFAULT_ADDRESS: u8 = 0x20;

pub mod regs {
    /// Input port: 1 = pin is high (after polarity inversion)
    pub const INPUT: u8 = 0x00;
    /// Output port: 1 = drive high
    pub const OUTPUT: u8 = 0x01;
    /// Polarity inversion: 1 = input bit reads inverted
    pub const POLARITY: u8 = 0x02;
    /// Configuration: 1 = pin is an input
    pub const CONFIG: u8 = 0x03;
}

pub struct Tca6408<B: I2cBus = I2cHandle> {
    dev: I2cDevice<B>,
    cache: RegisterCache,
    /// Pins whose handles are active-low
    active_low: u8,
}

impl Tca6408 {
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        Ok(Self::new(I2cDevice::open(bus, addr)?))
    }
}

impl<B: I2cBus> Tca6408<B> {
    pub fn new(dev: I2cDevice<B>) -> Self {
        Self {
            dev,
            cache: RegisterCache::new(),
            active_low: 0,
        }
    }

    fn register(&mut self, reg: u8, mask: u8, value: u8) -> Result<()> {
        if mask == 0 {
            return Err(Error::invalid("TCA6408 pin mask is empty"));
        }
        self.cache.update(&mut self.dev, reg, mask, value)?;
        Ok(())
    }

    /// Make the masked pins inputs and return their masked states.
    pub fn input(&mut self, mask: u8) -> Result<u8> {
        self.register(regs::CONFIG, mask, mask)?;
        Ok(self.dev.read_register(regs::INPUT)? & mask)
    }

    /// Make the masked pins outputs driving the matching bits of `states`.
    ///
    /// The output latch is written before the direction so pins never
    /// briefly drive a stale level.
    pub fn output(&mut self, mask: u8, states: u8) -> Result<()> {
        self.register(regs::OUTPUT, mask, states)?;
        self.register(regs::CONFIG, mask, 0)
    }

    /// Set input polarity inversion for the masked pins.
    pub fn invert(&mut self, mask: u8, states: u8) -> Result<()> {
        self.register(regs::POLARITY, mask, states)
    }

    /// Return every pin to a non-inverted input and resynchronize the cache
    /// with the device.
    pub fn reset(&mut self) -> Result<()> {
        self.cache.invalidate();
        self.active_low = 0;
        self.input(0xff)?;
        self.invert(0xff, 0x00)
    }

    /// A handle to pin `n` (0-7).
    pub fn pin(&mut self, n: u8) -> Result<Tca6408Pin<'_, B>> {
        if n > 7 {
            return Err(Error::invalid(format!("TCA6408 has no pin {}", n)));
        }
        Ok(Tca6408Pin {
            chip: self,
            mask: 1 << n,
        })
    }
}

/// One pin of a [`Tca6408`].
pub struct Tca6408Pin<'a, B: I2cBus> {
    chip: &'a mut Tca6408<B>,
    mask: u8,
}

impl<B: I2cBus> Tca6408Pin<'_, B> {
    /// Make the pin active-low.
    ///
    /// The polarity register only inverts inputs, so outputs are inverted
    /// here by driving the complement of the requested level.
    pub fn invert(&mut self, on: bool) -> Result<()> {
        self.chip.invert(self.mask, fill(on))?;
        if on {
            self.chip.active_low |= self.mask;
        } else {
            self.chip.active_low &= !self.mask;
        }
        Ok(())
    }

    fn is_active_low(&self) -> bool {
        self.chip.active_low & self.mask != 0
    }
}

impl<B: I2cBus> GpioPin for Tca6408Pin<'_, B> {
    fn configure(&mut self, config: PinConfig) -> Result<()> {
        if config.drive != Drive::PushPull {
            return Err(Error::invalid("TCA6408 outputs are push-pull only"));
        }
        self.invert(config.active_low)?;
        if config.is_output() {
            self.set_output(config.state)
        } else {
            self.get_input().map(drop)
        }
    }

    fn set_output(&mut self, state: bool) -> Result<()> {
        let level = state ^ self.is_active_low();
        self.chip.output(self.mask, fill(level))
    }

    fn get_input(&mut self) -> Result<bool> {
        Ok(self.chip.input(self.mask)? != 0)
    }
}

fn fill(on: bool) -> u8 {
    if on {
        0xff
    } else {
        0x00
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;

    const ADDR: u8 = DEFAULT_ADDRESS;

    fn expander() -> (MockBus, Tca6408<MockBus>) {
        let mock = MockBus::new();
        // Power-on defaults: all inputs, no inversion, outputs latched high.
        mock.set_registers(ADDR, regs::OUTPUT, &[0xff, 0x00, 0xff]);
        let dev = I2cDevice::new(mock.clone(), ADDR).unwrap();
        (mock, Tca6408::new(dev))
    }

    #[test]
    fn input_reads_masked_state() {
        let (mock, mut chip) = expander();
        mock.set_registers(ADDR, regs::INPUT, &[0b1010_0101]);
        assert_eq!(chip.input(0x0f).unwrap(), 0b0000_0101);
    }

    #[test]
    fn output_sets_latch_then_direction() {
        let (mock, mut chip) = expander();
        chip.output(0x03, 0x01).unwrap();
        assert_eq!(mock.register(ADDR, regs::OUTPUT), 0xfd);
        assert_eq!(mock.register(ADDR, regs::CONFIG), 0xfc);

        let writes: Vec<u8> = mock
            .transactions()
            .iter()
            .filter(|t| t.segments.len() == 1)
            .map(|t| t.written()[0])
            .collect();
        assert_eq!(writes, vec![regs::OUTPUT, regs::CONFIG]);
    }

    #[test]
    fn cached_registers_are_not_rewritten() {
        let (mock, mut chip) = expander();
        chip.output(0x01, 0x00).unwrap();
        mock.clear_transactions();
        chip.output(0x01, 0x00).unwrap();
        assert!(mock.transactions().is_empty());
    }

    #[test]
    fn reset_restores_inputs() {
        let (mock, mut chip) = expander();
        chip.output(0xff, 0x00).unwrap();
        chip.invert(0x0f, 0xff).unwrap();
        chip.reset().unwrap();
        assert_eq!(mock.register(ADDR, regs::CONFIG), 0xff);
        assert_eq!(mock.register(ADDR, regs::POLARITY), 0x00);
    }

    #[test]
    fn empty_mask_rejected() {
        let (_, mut chip) = expander();
        assert!(chip.output(0, 0).is_err());
        assert!(chip.pin(8).is_err());
    }

    #[test]
    fn pin_handle() {
        let (mock, mut chip) = expander();
        mock.set_registers(ADDR, regs::INPUT, &[0b0000_0100]);

        chip.pin(0).unwrap().set_output(false).unwrap();
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x01, 0);
        assert_eq!(mock.register(ADDR, regs::CONFIG) & 0x01, 0);

        assert!(chip.pin(2).unwrap().get_input().unwrap());
        assert!(!chip.pin(3).unwrap().get_input().unwrap());

        let mut pin = chip.pin(1).unwrap();
        pin.configure(PinConfig::output(true).active_low(true)).unwrap();
        assert!(pin
            .configure(PinConfig::output(true).drive(Drive::OpenDrain))
            .is_err());
        assert_eq!(mock.register(ADDR, regs::POLARITY), 0x02);
        assert_eq!(mock.register(ADDR, regs::CONFIG) & 0x02, 0);
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x02, 0);
    }

    #[test]
    fn active_low_output_drives_complement() {
        let (mock, mut chip) = expander();
        let mut pin = chip.pin(0).unwrap();

        pin.configure(PinConfig::output(true).active_low(true)).unwrap();
        assert_eq!(mock.register(ADDR, regs::CONFIG) & 0x01, 0);
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x01, 0);

        pin.set_output(false).unwrap();
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x01, 0x01);

        // A fresh handle to the same pin keeps the inversion.
        chip.pin(0).unwrap().set_output(true).unwrap();
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x01, 0);

        chip.pin(0).unwrap().configure(PinConfig::output(true)).unwrap();
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x01, 0x01);
        assert_eq!(mock.register(ADDR, regs::POLARITY) & 0x01, 0);
    }

    #[test]
    fn reset_clears_active_low() {
        let (mock, mut chip) = expander();
        chip.output(0x08, 0x00).unwrap();
        chip.pin(3).unwrap().invert(true).unwrap();
        chip.reset().unwrap();
        chip.pin(3).unwrap().set_output(true).unwrap();
        assert_eq!(mock.register(ADDR, regs::OUTPUT) & 0x08, 0x08);
    }
}
