//! Test doubles for the bus traits.
//!
//! [`MockBus`] behaves like a bus full of pointer-register chips: each
//! address owns a 256-byte register file, a write sets the register pointer
//! from its first byte and stores the rest with auto-increment, and a read
//! returns bytes from the pointer onwards. Clones share state, so a test
//! keeps one clone for inspection and hands the other to the code under
//! test.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use nix::errno::Errno;

use crate::error::{Error, Result};
use crate::hw_trait::{I2cBus, Outcome, SpiBus};
use crate::i2c::Address;
use crate::spi::{SpiMode, SpiTransaction};
use crate::transfer::{Direction, Transaction};

/// One descriptor as the bus saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Write(Vec<u8>),
    Read(usize),
}

/// One submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub addr: u8,
    pub segments: Vec<Segment>,
}

impl Submission {
    /// Concatenated bytes of every write segment.
    pub fn written(&self) -> Vec<u8> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Write(data) => Some(data.as_slice()),
                Segment::Read(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }
}

#[derive(Default)]
struct State {
    registers: HashMap<u8, [u8; 256]>,
    pointers: HashMap<u8, u8>,
    held: HashMap<(u8, u8), u8>,
    log: Vec<Submission>,
    failures: VecDeque<Errno>,
    retries: Option<u32>,
    timeout: Option<u32>,
}

#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<State>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Preload consecutive registers of the device at `addr`.
    pub fn set_registers(&self, addr: u8, reg: u8, values: &[u8]) {
        let mut state = self.lock();
        let file = state.registers.entry(addr).or_insert([0; 256]);
        for (i, value) in values.iter().enumerate() {
            file[reg.wrapping_add(i as u8) as usize] = *value;
        }
    }

    pub fn register(&self, addr: u8, reg: u8) -> u8 {
        self.lock()
            .registers
            .get(&addr)
            .map_or(0, |file| file[reg as usize])
    }

    /// Make reads of `reg` always return `value`, like a status register
    /// the device owns. Writes still land in the register file.
    pub fn hold(&self, addr: u8, reg: u8, value: u8) {
        self.lock().held.insert((addr, reg), value);
    }

    /// Fail the next `count` submissions with `errno`.
    pub fn fail_next(&self, count: usize, errno: Errno) {
        self.lock().failures.extend(std::iter::repeat(errno).take(count));
    }

    /// Every successful submission so far.
    pub fn transactions(&self) -> Vec<Submission> {
        self.lock().log.clone()
    }

    pub fn clear_transactions(&self) {
        self.lock().log.clear();
    }

    pub fn retries(&self) -> Option<u32> {
        self.lock().retries
    }

    pub fn timeout(&self) -> Option<u32> {
        self.lock().timeout
    }
}

impl I2cBus for MockBus {
    fn submit(&mut self, addr: Address, txn: &mut Transaction) -> Result<Outcome> {
        let mut state = self.lock();
        if let Some(errno) = state.failures.pop_front() {
            return Err(Error::Bus(errno));
        }

        let addr = addr.get();
        let mut pointer = state.pointers.get(&addr).copied().unwrap_or(0);
        let mut file = state.registers.get(&addr).copied().unwrap_or([0; 256]);
        let mut segments = Vec::with_capacity(txn.len());

        for descriptor in txn.descriptors_mut() {
            match descriptor.direction() {
                Direction::Write => {
                    let data = descriptor.data();
                    segments.push(Segment::Write(data.to_vec()));
                    if let Some((reg, values)) = data.split_first() {
                        pointer = *reg;
                        for value in values {
                            file[pointer as usize] = *value;
                            pointer = pointer.wrapping_add(1);
                        }
                    }
                }
                Direction::Read => {
                    segments.push(Segment::Read(descriptor.len()));
                    for byte in descriptor.data_mut() {
                        *byte = state
                            .held
                            .get(&(addr, pointer))
                            .copied()
                            .unwrap_or(file[pointer as usize]);
                        pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }

        state.registers.insert(addr, file);
        state.pointers.insert(addr, pointer);
        state.log.push(Submission { addr, segments });
        Ok(Outcome::Completed)
    }

    fn set_retries(&mut self, retries: u32) -> Result<()> {
        self.lock().retries = Some(retries);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: u32) -> Result<()> {
        self.lock().timeout = Some(timeout);
        Ok(())
    }
}

/// One SPI segment as the bus saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiRecord {
    pub tx: Vec<u8>,
    pub speed_hz: u32,
    pub bits_per_word: u8,
    pub delay_usecs: u16,
    pub cs_change: bool,
}

#[derive(Default)]
struct SpiState {
    mode: u8,
    lsb_first: bool,
    bits_per_word: u8,
    speed_hz: u32,
    responses: VecDeque<u8>,
    log: Vec<Vec<SpiRecord>>,
}

/// Loopback SPI device: received bytes echo what was sent, unless
/// responses were queued with [`respond`](Self::respond).
#[derive(Clone, Default)]
pub struct MockSpi {
    state: Arc<Mutex<SpiState>>,
}

impl MockSpi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SpiState> {
        self.state.lock().unwrap()
    }

    /// Bytes returned instead of the loopback data, consumed in order.
    pub fn respond(&self, bytes: &[u8]) {
        self.lock().responses.extend(bytes);
    }

    pub fn transfers(&self) -> Vec<Vec<SpiRecord>> {
        self.lock().log.clone()
    }
}

impl SpiBus for MockSpi {
    fn transfer(&mut self, txn: &mut SpiTransaction) -> Result<()> {
        let mut state = self.lock();
        let mut records = Vec::with_capacity(txn.len());
        for segment in txn.segments_mut() {
            let options = *segment.options();
            let tx = if segment.sends() {
                segment.data().to_vec()
            } else {
                vec![0; segment.len()]
            };
            records.push(SpiRecord {
                tx: tx.clone(),
                speed_hz: options.speed_hz,
                bits_per_word: options.bits_per_word,
                delay_usecs: options.delay_usecs,
                cs_change: options.cs_change,
            });
            for (rx, sent) in segment.data_mut().iter_mut().zip(tx) {
                *rx = state.responses.pop_front().unwrap_or(sent);
            }
        }
        state.log.push(records);
        Ok(())
    }

    fn mode(&mut self) -> Result<SpiMode> {
        let raw = self.lock().mode;
        SpiMode::from_repr(raw).ok_or_else(|| Error::invalid("bad mode"))
    }

    fn set_mode(&mut self, mode: SpiMode) -> Result<()> {
        self.lock().mode = mode as u8;
        Ok(())
    }

    fn lsb_first(&mut self) -> Result<bool> {
        Ok(self.lock().lsb_first)
    }

    fn set_lsb_first(&mut self, lsb_first: bool) -> Result<()> {
        self.lock().lsb_first = lsb_first;
        Ok(())
    }

    fn bits_per_word(&mut self) -> Result<u8> {
        Ok(self.lock().bits_per_word)
    }

    fn set_bits_per_word(&mut self, bits: u8) -> Result<()> {
        self.lock().bits_per_word = bits;
        Ok(())
    }

    fn speed_hz(&mut self) -> Result<u32> {
        Ok(self.lock().speed_hz)
    }

    fn set_speed_hz(&mut self, hz: u32) -> Result<()> {
        self.lock().speed_hz = hz;
        Ok(())
    }
}
