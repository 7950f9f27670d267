//! SPI bus abstraction trait.

use super::Result;
use crate::spi::{SpiMode, SpiTransaction};

/// An open SPI device (one bus, one chip select).
///
/// Besides running transactions, the device carries persistent settings
/// that apply to every transfer not overriding them.
pub trait SpiBus: Send {
    /// Run every segment of `txn` inside one chip-select window, subject to
    /// per-segment `cs_change` requests. Received bytes land in the segment
    /// buffers.
    fn transfer(&mut self, txn: &mut SpiTransaction) -> Result<()>;

    fn mode(&mut self) -> Result<SpiMode>;
    fn set_mode(&mut self, mode: SpiMode) -> Result<()>;

    fn lsb_first(&mut self) -> Result<bool>;
    fn set_lsb_first(&mut self, lsb_first: bool) -> Result<()>;

    fn bits_per_word(&mut self) -> Result<u8>;
    fn set_bits_per_word(&mut self, bits: u8) -> Result<()>;

    fn speed_hz(&mut self) -> Result<u32>;
    fn set_speed_hz(&mut self, hz: u32) -> Result<()>;
}
