//! GPIO lines through the character device or the legacy sysfs tree.
//!
//! [`GpioLine`] requests a line handle from `/dev/gpiochipN` and is released
//! when dropped. [`SysfsGpio`] drives `/sys/class/gpio`, which is slower but
//! can leave a line configured after the process exits. Both implement
//! [`GpioPin`](crate::hw_trait::GpioPin).

pub mod cdev;
mod ffi;
pub mod sysfs;

pub use cdev::{GpioLine, HandleFlags};
pub use sysfs::{SysfsConfig, SysfsGpio};
