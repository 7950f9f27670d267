//! Kernel records and ioctls from `linux/spi/spidev.h`.

use nix::{ioctl_read, ioctl_write_buf, ioctl_write_ptr};

const SPI_IOC_MAGIC: u8 = b'k';

/// `struct spi_ioc_transfer`.
///
/// Buffer addresses are carried as 64-bit integers regardless of the
/// process word size. A zero `tx_buf` clocks out zeros.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiIocTransfer {
    pub tx_buf: u64,
    pub rx_buf: u64,
    pub len: u32,
    pub speed_hz: u32,
    pub delay_usecs: u16,
    pub bits_per_word: u8,
    pub cs_change: u8,
    pub tx_nbits: u8,
    pub rx_nbits: u8,
    pub word_delay_usecs: u8,
    pub pad: u8,
}

const _: () = assert!(std::mem::size_of::<SpiIocTransfer>() == 32);

ioctl_write_buf!(spi_ioc_message, SPI_IOC_MAGIC, 0, SpiIocTransfer);

ioctl_read!(spi_read_mode, SPI_IOC_MAGIC, 1, u8);
ioctl_write_ptr!(spi_write_mode, SPI_IOC_MAGIC, 1, u8);
ioctl_read!(spi_read_lsb_first, SPI_IOC_MAGIC, 2, u8);
ioctl_write_ptr!(spi_write_lsb_first, SPI_IOC_MAGIC, 2, u8);
ioctl_read!(spi_read_bits_per_word, SPI_IOC_MAGIC, 3, u8);
ioctl_write_ptr!(spi_write_bits_per_word, SPI_IOC_MAGIC, 3, u8);
ioctl_read!(spi_read_max_speed_hz, SPI_IOC_MAGIC, 4, u32);
ioctl_write_ptr!(spi_write_max_speed_hz, SPI_IOC_MAGIC, 4, u32);
