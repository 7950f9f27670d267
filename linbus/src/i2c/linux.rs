//! `/dev/i2c-N` backend.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use nix::libc::c_int;

use super::{ffi, Address};
use crate::error::{Error, Result};
use crate::hw_trait::{I2cBus, Outcome};
use crate::tracing::prelude::*;
use crate::transfer::{Direction, Transaction};

/// An open I2C adapter character device.
///
/// The file descriptor is closed when the value is dropped.
pub struct LinuxI2c {
    file: File,
    path: PathBuf,
}

impl LinuxI2c {
    pub fn device_path(bus: u32) -> PathBuf {
        PathBuf::from(format!("/dev/i2c-{}", bus))
    }

    pub fn open(bus: u32) -> Result<Self> {
        let path = Self::device_path(bus);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::resource(&path, e))?;
        debug!(path = %path.display(), "Opened I2C bus");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn config_value(&self, name: &str, value: u32) -> Result<c_int> {
        c_int::try_from(value)
            .map_err(|_| Error::invalid(format!("I2C {} value {} too large", name, value)))
    }
}

impl I2cBus for LinuxI2c {
    fn submit(&mut self, addr: Address, txn: &mut Transaction) -> Result<Outcome> {
        // The messages point into the transaction's boxed buffers, which
        // `txn` keeps alive and in place until this function returns.
        let mut msgs: Vec<ffi::I2cMsg> = txn
            .descriptors_mut()
            .iter_mut()
            .map(|d| ffi::I2cMsg {
                addr: addr.get().into(),
                flags: match d.direction() {
                    Direction::Write => 0,
                    Direction::Read => ffi::I2C_M_RD,
                },
                // Lengths were bounded to u16 when the transaction was built.
                len: d.len() as u16,
                buf: d.data_mut().as_mut_ptr(),
            })
            .collect();
        let data = ffi::I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };

        // SAFETY: `data` and every buffer it references outlive the call, and
        // each `len` matches its buffer.
        unsafe { ffi::i2c_rdwr(self.file.as_raw_fd(), &data) }.map_err(|errno| {
            debug!(path = %self.path.display(), %addr, %errno, "I2C_RDWR failed");
            Error::Bus(errno)
        })?;

        Ok(Outcome::Completed)
    }

    fn set_retries(&mut self, retries: u32) -> Result<()> {
        let value = self.config_value("retries", retries)?;
        // SAFETY: I2C_RETRIES takes its argument by value.
        unsafe { ffi::i2c_set_retries(self.file.as_raw_fd(), value) }
            .map_err(|e| Error::resource(&self.path, e))?;
        debug!(path = %self.path.display(), retries, "Set I2C retries");
        Ok(())
    }

    fn set_timeout(&mut self, timeout: u32) -> Result<()> {
        let value = self.config_value("timeout", timeout)?;
        // SAFETY: I2C_TIMEOUT takes its argument by value.
        unsafe { ffi::i2c_set_timeout(self.file.as_raw_fd(), value) }
            .map_err(|e| Error::resource(&self.path, e))?;
        debug!(path = %self.path.display(), timeout, "Set I2C timeout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_index_maps_to_device_node() {
        assert_eq!(LinuxI2c::device_path(1), PathBuf::from("/dev/i2c-1"));
    }

    #[test]
    fn missing_device_is_a_resource_error() {
        let err = LinuxI2c::open(u32::MAX).err().unwrap();
        assert!(matches!(err, Error::Resource { .. }));
    }

    #[test]
    fn message_layout_matches_kernel() {
        assert_eq!(std::mem::size_of::<ffi::I2cMsg>(), 8 + std::mem::size_of::<usize>());
        assert_eq!(std::mem::offset_of!(ffi::I2cMsg, buf), std::mem::size_of::<usize>());
    }
}
