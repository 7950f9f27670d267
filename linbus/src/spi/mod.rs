//! Atomic SPI transactions against `/dev/spidevB.C`.
//!
//! Each [`SpiSpec`] clocks out one buffer while clocking another in. A
//! [`Send`](SpiData::Send) spec transmits its payload and overwrites the same
//! buffer with what came back; a [`Clock`](SpiData::Clock) spec transmits
//! zeros to read a response. All specs of one [`SpiDevice::io`] call run
//! inside a single `SPI_IOC_MESSAGE` ioctl, so chip select stays asserted
//! across them unless a spec asks for `cs_change`.

mod ffi;
pub mod linux;

use std::fmt;

use strum::FromRepr;

use crate::error::{Error, Result};
use crate::hw_trait::SpiBus;
use crate::tracing::prelude::*;
use crate::transfer::{Payload, MAX_TRANSFER_LEN};

pub use linux::LinuxSpi;

/// Most transfers one `SPI_IOC_MESSAGE(N)` can carry: the ioctl size field
/// is 14 bits wide and each transfer record is 32 bytes.
pub const SPI_IOC_MAX_TRANSFERS: usize = ((1 << 14) - 1) / 32;

/// Clock polarity and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromRepr)]
#[repr(u8)]
pub enum SpiMode {
    /// Clock idles low, data sampled on the rising edge.
    #[default]
    Mode0 = 0,
    /// Clock idles low, data sampled on the falling edge.
    Mode1 = 1,
    /// Clock idles high, data sampled on the falling edge.
    Mode2 = 2,
    /// Clock idles high, data sampled on the rising edge.
    Mode3 = 3,
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Per-transfer overrides. Zero leaves the device setting in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferOptions {
    pub speed_hz: u32,
    /// Delay after the transfer, before any chip select change.
    pub delay_usecs: u16,
    pub bits_per_word: u8,
    /// Deassert chip select after this transfer.
    pub cs_change: bool,
}

/// What a spec puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpiData {
    /// Transmit the payload; the response replaces it.
    Send(Payload),
    /// Transmit this many zeros and keep the response.
    Clock(usize),
}

/// One transfer of an SPI transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiSpec {
    pub data: SpiData,
    pub options: TransferOptions,
}

impl SpiSpec {
    pub fn send(payload: impl Into<Payload>) -> Self {
        Self {
            data: SpiData::Send(payload.into()),
            options: TransferOptions::default(),
        }
    }

    pub fn clock(len: usize) -> Self {
        Self {
            data: SpiData::Clock(len),
            options: TransferOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn speed_hz(mut self, hz: u32) -> Self {
        self.options.speed_hz = hz;
        self
    }

    pub fn delay_usecs(mut self, usecs: u16) -> Self {
        self.options.delay_usecs = usecs;
        self
    }

    pub fn bits_per_word(mut self, bits: u8) -> Self {
        self.options.bits_per_word = bits;
        self
    }

    pub fn cs_change(mut self, cs_change: bool) -> Self {
        self.options.cs_change = cs_change;
        self
    }
}

/// A built transfer: its buffer and overrides.
#[derive(Debug)]
pub struct SpiSegment {
    sends: bool,
    options: TransferOptions,
    buf: Box<[u8]>,
}

impl SpiSegment {
    /// True when the buffer holds data to transmit, false when zeros are
    /// clocked out.
    pub fn sends(&self) -> bool {
        self.sends
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// Ordered transfers submitted in one ioctl.
#[derive(Debug)]
pub struct SpiTransaction {
    segments: Vec<SpiSegment>,
}

impl SpiTransaction {
    pub fn build(specs: &[SpiSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::invalid("SPI transaction has no transfers"));
        }
        if specs.len() > SPI_IOC_MAX_TRANSFERS {
            return Err(Error::invalid(format!(
                "SPI transaction has {} transfers, limit is {}",
                specs.len(),
                SPI_IOC_MAX_TRANSFERS
            )));
        }

        let mut segments = Vec::with_capacity(specs.len());
        for spec in specs {
            let (sends, buf) = match &spec.data {
                SpiData::Send(payload) => (true, payload.to_bytes()?),
                SpiData::Clock(len) => (false, vec![0u8; *len]),
            };
            if buf.is_empty() || buf.len() > MAX_TRANSFER_LEN {
                return Err(Error::invalid(format!(
                    "SPI transfer length {} outside 1..={}",
                    buf.len(),
                    MAX_TRANSFER_LEN
                )));
            }
            segments.push(SpiSegment {
                sends,
                options: spec.options,
                buf: buf.into_boxed_slice(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[SpiSegment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [SpiSegment] {
        &mut self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The received bytes of every transfer, in order.
    pub fn into_received(self) -> Vec<Vec<u8>> {
        self.segments.into_iter().map(|s| s.buf.into_vec()).collect()
    }
}

/// Device settings applied at open; `None` keeps the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpiConfig {
    pub mode: Option<SpiMode>,
    pub lsb_first: Option<bool>,
    pub bits_per_word: Option<u8>,
    pub speed_hz: Option<u32>,
}

/// One chip select on an SPI bus.
pub struct SpiDevice<S: SpiBus = LinuxSpi> {
    bus: S,
}

impl SpiDevice<LinuxSpi> {
    /// Open `/dev/spidev<bus>.<chipselect>` and apply `config`.
    pub fn open(bus: u32, chipselect: u32, config: SpiConfig) -> Result<Self> {
        Self::new(LinuxSpi::open(bus, chipselect)?, config)
    }
}

impl<S: SpiBus> SpiDevice<S> {
    pub fn new(bus: S, config: SpiConfig) -> Result<Self> {
        let mut dev = Self { bus };
        dev.apply(config)?;
        Ok(dev)
    }

    pub fn apply(&mut self, config: SpiConfig) -> Result<()> {
        if let Some(mode) = config.mode {
            self.set_mode(mode)?;
        }
        if let Some(lsb_first) = config.lsb_first {
            self.set_lsb_first(lsb_first)?;
        }
        if let Some(bits) = config.bits_per_word {
            self.set_bits_per_word(bits)?;
        }
        if let Some(hz) = config.speed_hz {
            self.set_speed_hz(hz)?;
        }
        Ok(())
    }

    pub fn bus(&self) -> &S {
        &self.bus
    }

    /// Run `specs` as one transaction and return what each transfer received.
    pub fn io(&mut self, specs: &[SpiSpec]) -> Result<Vec<Vec<u8>>> {
        let mut txn = SpiTransaction::build(specs)?;
        trace!(transfers = txn.len(), "SPI transaction");
        self.bus.transfer(&mut txn)?;
        Ok(txn.into_received())
    }

    pub fn mode(&mut self) -> Result<SpiMode> {
        self.bus.mode()
    }

    pub fn set_mode(&mut self, mode: SpiMode) -> Result<()> {
        debug!(%mode, "Set SPI mode");
        self.bus.set_mode(mode)
    }

    pub fn lsb_first(&mut self) -> Result<bool> {
        self.bus.lsb_first()
    }

    pub fn set_lsb_first(&mut self, lsb_first: bool) -> Result<()> {
        debug!(lsb_first, "Set SPI bit order");
        self.bus.set_lsb_first(lsb_first)
    }

    /// Word size in bits. The kernel reports 0 for the 8-bit default.
    pub fn bits_per_word(&mut self) -> Result<u8> {
        Ok(match self.bus.bits_per_word()? {
            0 => 8,
            bits => bits,
        })
    }

    pub fn set_bits_per_word(&mut self, bits: u8) -> Result<()> {
        debug!(bits, "Set SPI word size");
        self.bus.set_bits_per_word(bits)
    }

    pub fn speed_hz(&mut self) -> Result<u32> {
        self.bus.speed_hz()
    }

    pub fn set_speed_hz(&mut self, hz: u32) -> Result<()> {
        debug!(hz, "Set SPI clock");
        self.bus.set_speed_hz(hz)
    }
}
