//! Kernel records and ioctls from `linux/i2c.h` and `linux/i2c-dev.h`.

#![allow(dead_code)]

use nix::{ioctl_write_int_bad, ioctl_write_ptr_bad};

/// Read data, from slave to master.
pub const I2C_M_RD: u16 = 0x0001;
/// This is a ten bit chip address.
pub const I2C_M_TEN: u16 = 0x0010;

/// Number of times a device address is polled when not acknowledging.
pub const I2C_RETRIES: u16 = 0x0701;
/// Set timeout in units of 10 ms.
pub const I2C_TIMEOUT: u16 = 0x0702;
/// Combined read/write transfer, one STOP only.
pub const I2C_RDWR: u16 = 0x0707;

/// `struct i2c_msg`: one segment of a combined transfer.
#[repr(C)]
#[derive(Debug)]
pub struct I2cMsg {
    /// Slave address.
    pub addr: u16,
    /// 0 or [`I2C_M_RD`].
    pub flags: u16,
    /// Length of `buf` in bytes.
    pub len: u16,
    /// Data to send, or storage for received data.
    pub buf: *mut u8,
}

/// `struct i2c_rdwr_ioctl_data`: argument of [`I2C_RDWR`].
#[repr(C)]
#[derive(Debug)]
pub struct I2cRdwrIoctlData {
    /// Array of `nmsgs` messages.
    pub msgs: *mut I2cMsg,
    pub nmsgs: u32,
}

ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, I2cRdwrIoctlData);
ioctl_write_int_bad!(i2c_set_retries, I2C_RETRIES);
ioctl_write_int_bad!(i2c_set_timeout, I2C_TIMEOUT);
