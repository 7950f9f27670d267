//! Write-through cache of device register values.
//!
//! Control registers of the fan controller, voltage monitor and GPIO
//! expander are only ever changed by this process, so drivers read each one
//! at most once and skip writes that would not change it.

use std::collections::HashMap;

use crate::error::Result;
use crate::hw_trait::I2cBus;
use crate::i2c::I2cDevice;

#[derive(Debug, Default, Clone)]
pub struct RegisterCache {
    values: HashMap<u8, u8>,
}

impl RegisterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reg: u8) -> Option<u8> {
        self.values.get(&reg).copied()
    }

    pub fn store(&mut self, reg: u8, value: u8) {
        self.values.insert(reg, value);
    }

    /// The cached value of `reg`, calling `load` on a miss.
    pub fn get_or_load(&mut self, reg: u8, load: impl FnOnce() -> Result<u8>) -> Result<u8> {
        if let Some(value) = self.get(reg) {
            return Ok(value);
        }
        let value = load()?;
        self.values.insert(reg, value);
        Ok(value)
    }

    /// Replace the bits of `reg` selected by `mask` with those of `value`.
    ///
    /// Returns the new register value when it differs from the cached one
    /// and must be written to the device, `None` when nothing changed.
    pub fn update_masked(
        &mut self,
        reg: u8,
        mask: u8,
        value: u8,
        load: impl FnOnce() -> Result<u8>,
    ) -> Result<Option<u8>> {
        let current = self.get_or_load(reg, load)?;
        let next = (current & !mask) | (value & mask);
        if next == current {
            return Ok(None);
        }
        self.values.insert(reg, next);
        Ok(Some(next))
    }

    /// [`update_masked`](Self::update_masked) against a pointer-register
    /// device, writing through when the value changed.
    pub fn update<B: I2cBus>(
        &mut self,
        dev: &mut I2cDevice<B>,
        reg: u8,
        mask: u8,
        value: u8,
    ) -> Result<bool> {
        match self.update_masked(reg, mask, value, || dev.read_register(reg))? {
            Some(next) => {
                // A failed write leaves the device state unknown.
                if let Err(e) = dev.write_register(reg, next) {
                    self.values.remove(&reg);
                    return Err(e);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget every cached value, e.g. after a device reset.
    pub fn invalidate(&mut self) {
        self.values.clear();
    }
}
