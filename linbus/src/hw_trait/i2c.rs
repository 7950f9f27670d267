//! I2C bus abstraction trait.

use super::Result;
use crate::i2c::Address;
use crate::transfer::Transaction;

/// How a submitted transaction was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The bus ran the transaction; read descriptors hold received data.
    Completed,
    /// Nothing touched hardware; the transaction was only traced.
    Traced,
}

/// An open I2C bus connection.
///
/// Implementations run every descriptor of a [`Transaction`] as a single
/// atomic bus cycle (one START, repeated STARTs between segments, one STOP)
/// or fail without partial results.
pub trait I2cBus: Send {
    /// Run `txn` against the device at `addr`.
    fn submit(&mut self, addr: Address, txn: &mut Transaction) -> Result<Outcome>;

    /// Set how many times the adapter re-polls a device that does not ACK.
    fn set_retries(&mut self, _retries: u32) -> Result<()> {
        Ok(())
    }

    /// Set the adapter timeout, in units of 10 ms.
    fn set_timeout(&mut self, _timeout: u32) -> Result<()> {
        Ok(())
    }
}

impl<B: I2cBus + ?Sized> I2cBus for Box<B> {
    fn submit(&mut self, addr: Address, txn: &mut Transaction) -> Result<Outcome> {
        (**self).submit(addr, txn)
    }

    fn set_retries(&mut self, retries: u32) -> Result<()> {
        (**self).set_retries(retries)
    }

    fn set_timeout(&mut self, timeout: u32) -> Result<()> {
        (**self).set_timeout(timeout)
    }
}
