//! Kernel records and ioctls from `linux/gpio.h` (line handle ABI v1).

use nix::ioctl_readwrite;

pub const GPIOHANDLES_MAX: usize = 64;

const GPIO_IOC_MAGIC: u8 = 0xB4;

/// `struct gpiohandle_request`.
#[repr(C)]
pub struct GpioHandleRequest {
    pub lineoffsets: [u32; GPIOHANDLES_MAX],
    pub flags: u32,
    pub default_values: [u8; GPIOHANDLES_MAX],
    pub consumer_label: [u8; 32],
    pub lines: u32,
    /// Filled in by the kernel.
    pub fd: i32,
}

impl Default for GpioHandleRequest {
    fn default() -> Self {
        Self {
            lineoffsets: [0; GPIOHANDLES_MAX],
            flags: 0,
            default_values: [0; GPIOHANDLES_MAX],
            consumer_label: [0; 32],
            lines: 0,
            fd: -1,
        }
    }
}

const _: () = assert!(std::mem::size_of::<GpioHandleRequest>() == 364);

/// `struct gpiohandle_data`.
#[repr(C)]
pub struct GpioHandleData {
    pub values: [u8; GPIOHANDLES_MAX],
}

impl Default for GpioHandleData {
    fn default() -> Self {
        Self {
            values: [0; GPIOHANDLES_MAX],
        }
    }
}

ioctl_readwrite!(gpio_get_linehandle, GPIO_IOC_MAGIC, 0x03, GpioHandleRequest);
ioctl_readwrite!(gpiohandle_get_line_values, GPIO_IOC_MAGIC, 0x08, GpioHandleData);
ioctl_readwrite!(gpiohandle_set_line_values, GPIO_IOC_MAGIC, 0x09, GpioHandleData);
