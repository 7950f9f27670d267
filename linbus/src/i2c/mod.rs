//! Atomic I2C transactions against `/dev/i2c-N`.
//!
//! An [`I2cDevice`] pairs an open bus with one validated 7-bit device
//! address. Its [`io`](I2cDevice::io) method builds a [`Transaction`] from a
//! list of [`TransferSpec`]s, submits it to the bus in one call, and returns
//! the bytes received by each read, in order. Writes never appear in the
//! result.
//!
//! ```no_run
//! use linbus::i2c::I2cDevice;
//! use linbus::transfer::TransferSpec;
//!
//! # fn main() -> linbus::Result<()> {
//! // `None` selects the stub bus, which only traces the transaction.
//! let mut gizmo = I2cDevice::open(None, 0x45)?;
//! let reads = gizmo.io(&[
//!     TransferSpec::write([0x41u8, 0x42]),
//!     TransferSpec::read(7),
//!     TransferSpec::write([0u8, 0, 0]),
//! ])?;
//! assert!(reads.is_empty());
//! # Ok(())
//! # }
//! ```

mod ffi;
pub mod linux;
pub mod stub;

use std::fmt;

use crate::error::{Error, Result};
use crate::hw_trait::{I2cBus, Outcome};
use crate::tracing::prelude::*;
use crate::transfer::{Payload, Transaction, TransferSpec};

pub use linux::LinuxI2c;
pub use stub::StubI2c;

/// Most messages the kernel accepts in one `I2C_RDWR` call.
pub const I2C_RDWR_IOCTL_MAX_MSGS: usize = 42;

/// A 7-bit device address outside the reserved ranges.
///
/// `0000xxx` (general call, CBUS, high-speed master codes) and `1111xxx`
/// (10-bit addressing, device ID) are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(u8);

impl Address {
    pub const MIN: u8 = 0x08;
    pub const MAX: u8 = 0x77;

    pub fn new(addr: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&addr) {
            return Err(Error::invalid(format!(
                "I2C address 0x{:02x} is reserved (valid range 0x{:02x}-0x{:02x})",
                addr,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(addr))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Address {
    type Error = Error;

    fn try_from(addr: u8) -> Result<Self> {
        Self::new(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// The bus handles [`I2cDevice::open`] can produce.
pub enum I2cHandle {
    Linux(LinuxI2c),
    Stub(StubI2c),
}

impl I2cBus for I2cHandle {
    fn submit(&mut self, addr: Address, txn: &mut Transaction) -> Result<Outcome> {
        match self {
            I2cHandle::Linux(bus) => bus.submit(addr, txn),
            I2cHandle::Stub(bus) => bus.submit(addr, txn),
        }
    }

    fn set_retries(&mut self, retries: u32) -> Result<()> {
        match self {
            I2cHandle::Linux(bus) => bus.set_retries(retries),
            I2cHandle::Stub(bus) => bus.set_retries(retries),
        }
    }

    fn set_timeout(&mut self, timeout: u32) -> Result<()> {
        match self {
            I2cHandle::Linux(bus) => bus.set_timeout(timeout),
            I2cHandle::Stub(bus) => bus.set_timeout(timeout),
        }
    }
}

/// One device on an I2C bus.
pub struct I2cDevice<B: I2cBus = I2cHandle> {
    bus: B,
    addr: Address,
}

impl I2cDevice<I2cHandle> {
    /// Open `/dev/i2c-<bus>` for the device at `addr`.
    ///
    /// With `bus == None` the device runs against the stub bus: nothing is
    /// opened and every transaction is traced instead of executed.
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        let addr = Address::new(addr)?;
        let handle = match bus {
            Some(bus) => I2cHandle::Linux(LinuxI2c::open(bus)?),
            None => I2cHandle::Stub(StubI2c::new()),
        };
        Ok(Self { bus: handle, addr })
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.bus, I2cHandle::Stub(_))
    }
}

impl<B: I2cBus> I2cDevice<B> {
    /// Use an already open bus for the device at `addr`.
    pub fn new(bus: B, addr: u8) -> Result<Self> {
        Ok(Self {
            bus,
            addr: Address::new(addr)?,
        })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Perform one atomic transaction with a single STOP.
    ///
    /// Returns the data of every read, in order. An empty result means no
    /// reads were requested, or the device sits on the stub bus.
    pub fn io(&mut self, specs: &[TransferSpec]) -> Result<Vec<Vec<u8>>> {
        let mut txn = Transaction::build(specs, I2C_RDWR_IOCTL_MAX_MSGS)?;
        trace!(addr = %self.addr, messages = txn.len(), "I2C transaction");

        match self.bus.submit(self.addr, &mut txn)? {
            Outcome::Completed => Ok(txn.into_reads()),
            Outcome::Traced => Ok(Vec::new()),
        }
    }

    /// [`io`](Self::io) using the alternating write/read slot convention.
    pub fn io_alternating(
        &mut self,
        items: impl IntoIterator<Item = Option<Payload>>,
    ) -> Result<Vec<Vec<u8>>> {
        self.io(&TransferSpec::alternating(items)?)
    }

    /// Set the number of times the adapter retries an unacknowledged address.
    pub fn set_retries(&mut self, retries: u32) -> Result<()> {
        self.bus.set_retries(retries)
    }

    /// Set the adapter timeout in units of 10 ms.
    pub fn set_timeout(&mut self, timeout: u32) -> Result<()> {
        self.bus.set_timeout(timeout)
    }

    pub fn write(&mut self, data: impl Into<Payload>) -> Result<()> {
        self.io(&[TransferSpec::write(data)]).map(drop)
    }

    /// Read `len` bytes. Returns an empty vector on the stub bus.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        self.io(&[TransferSpec::read(len)]).map(first)
    }

    /// Write then read with a repeated START in between.
    pub fn write_read(&mut self, data: impl Into<Payload>, len: usize) -> Result<Vec<u8>> {
        self.io(&[TransferSpec::write(data), TransferSpec::read(len)])
            .map(first)
    }

    /// Read one byte from register `reg` of a pointer-register device.
    ///
    /// Reads back 0 on the stub bus.
    pub fn read_register(&mut self, reg: u8) -> Result<u8> {
        let data = self.write_read(reg, 1)?;
        Ok(data.first().copied().unwrap_or(0))
    }

    /// Read `len` consecutive registers starting at `reg`.
    ///
    /// Zero-filled on the stub bus, so callers can always index the result.
    pub fn read_registers(&mut self, reg: u8, len: usize) -> Result<Vec<u8>> {
        let mut data = self.write_read(reg, len)?;
        data.resize(len, 0);
        Ok(data)
    }

    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.write([reg, value])
    }

    /// Write `values` to consecutive registers starting at `reg`.
    pub fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(values.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(values);
        self.write(frame)
    }
}

fn first(mut reads: Vec<Vec<u8>>) -> Vec<u8> {
    if reads.is_empty() {
        Vec::new()
    } else {
        reads.swap_remove(0)
    }
}
