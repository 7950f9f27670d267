//! `/dev/spidevB.C` backend.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use super::{ffi, SpiMode, SpiTransaction};
use crate::error::{Error, Result};
use crate::hw_trait::SpiBus;
use crate::tracing::prelude::*;

pub struct LinuxSpi {
    file: File,
    path: PathBuf,
}

impl LinuxSpi {
    pub fn device_path(bus: u32, chipselect: u32) -> PathBuf {
        PathBuf::from(format!("/dev/spidev{}.{}", bus, chipselect))
    }

    pub fn open(bus: u32, chipselect: u32) -> Result<Self> {
        let path = Self::device_path(bus, chipselect);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::resource(&path, e))?;
        debug!(path = %path.display(), "Opened SPI device");
        Ok(Self { file, path })
    }

    fn read_u8(
        &self,
        ioctl: unsafe fn(nix::libc::c_int, *mut u8) -> nix::Result<nix::libc::c_int>,
    ) -> Result<u8> {
        let mut value = 0u8;
        // SAFETY: `value` is a valid u8 for the duration of the call.
        unsafe { ioctl(self.file.as_raw_fd(), &mut value) }
            .map_err(|e| Error::resource(&self.path, e))?;
        Ok(value)
    }

    fn write_u8(
        &self,
        ioctl: unsafe fn(nix::libc::c_int, *const u8) -> nix::Result<nix::libc::c_int>,
        value: u8,
    ) -> Result<()> {
        // SAFETY: `value` is a valid u8 for the duration of the call.
        unsafe { ioctl(self.file.as_raw_fd(), &value) }
            .map_err(|e| Error::resource(&self.path, e))?;
        Ok(())
    }
}

impl SpiBus for LinuxSpi {
    fn transfer(&mut self, txn: &mut SpiTransaction) -> Result<()> {
        let transfers: Vec<ffi::SpiIocTransfer> = txn
            .segments_mut()
            .iter_mut()
            .map(|s| {
                let options = *s.options();
                let sends = s.sends();
                let len = s.len() as u32;
                let buf = s.data_mut().as_mut_ptr() as u64;
                ffi::SpiIocTransfer {
                    tx_buf: if sends { buf } else { 0 },
                    rx_buf: buf,
                    len,
                    speed_hz: options.speed_hz,
                    delay_usecs: options.delay_usecs,
                    bits_per_word: options.bits_per_word,
                    cs_change: options.cs_change.into(),
                    ..Default::default()
                }
            })
            .collect();

        // SAFETY: every record points at a live segment buffer of `len`
        // bytes, borrowed through `txn` until the call returns.
        unsafe { ffi::spi_ioc_message(self.file.as_raw_fd(), &transfers) }.map_err(|errno| {
            debug!(path = %self.path.display(), %errno, "SPI_IOC_MESSAGE failed");
            Error::Bus(errno)
        })?;
        Ok(())
    }

    fn mode(&mut self) -> Result<SpiMode> {
        let raw = self.read_u8(ffi::spi_read_mode)?;
        // Higher bits carry CS_HIGH, LOOP and friends.
        SpiMode::from_repr(raw & 0x03)
            .ok_or_else(|| Error::invalid(format!("SPI mode 0x{:02x}", raw)))
    }

    fn set_mode(&mut self, mode: SpiMode) -> Result<()> {
        self.write_u8(ffi::spi_write_mode, mode as u8)
    }

    fn lsb_first(&mut self) -> Result<bool> {
        Ok(self.read_u8(ffi::spi_read_lsb_first)? != 0)
    }

    fn set_lsb_first(&mut self, lsb_first: bool) -> Result<()> {
        self.write_u8(ffi::spi_write_lsb_first, lsb_first.into())
    }

    fn bits_per_word(&mut self) -> Result<u8> {
        self.read_u8(ffi::spi_read_bits_per_word)
    }

    fn set_bits_per_word(&mut self, bits: u8) -> Result<()> {
        self.write_u8(ffi::spi_write_bits_per_word, bits)
    }

    fn speed_hz(&mut self) -> Result<u32> {
        let mut hz = 0u32;
        // SAFETY: `hz` is a valid u32 for the duration of the call.
        unsafe { ffi::spi_read_max_speed_hz(self.file.as_raw_fd(), &mut hz) }
            .map_err(|e| Error::resource(&self.path, e))?;
        Ok(hz)
    }

    fn set_speed_hz(&mut self, hz: u32) -> Result<()> {
        // SAFETY: `hz` is a valid u32 for the duration of the call.
        unsafe { ffi::spi_write_max_speed_hz(self.file.as_raw_fd(), &hz) }
            .map_err(|e| Error::resource(&self.path, e))?;
        Ok(())
    }
}
