//! Hardware-less I2C bus that traces transactions instead of running them.

use super::Address;
use crate::error::Result;
use crate::hw_trait::{I2cBus, Outcome};
use crate::tracing::prelude::*;
use crate::transfer::Transaction;

/// A bus with no device file behind it.
///
/// Every submitted transaction is rendered as text, logged at INFO and kept
/// in [`trace`](Self::trace). Reads are never filled in.
#[derive(Debug, Default)]
pub struct StubI2c {
    lines: Vec<String>,
}

impl StubI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line rendered so far.
    pub fn trace(&self) -> &[String] {
        &self.lines
    }

    fn emit(&mut self, line: String) {
        info!("{}", line);
        self.lines.push(line);
    }
}

impl I2cBus for StubI2c {
    fn submit(&mut self, addr: Address, txn: &mut Transaction) -> Result<Outcome> {
        self.emit(format!("{} messages to {}:", txn.len(), addr));
        for (i, descriptor) in txn.descriptors().iter().enumerate() {
            self.emit(format!("  [{}] {}", i, descriptor));
        }
        Ok(Outcome::Traced)
    }
}
