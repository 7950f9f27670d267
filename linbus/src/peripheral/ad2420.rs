//! AD2420 A2B (Automotive Audio Bus) transceiver driver.
//!
//! A master transceiver answers on two I2C addresses. The base address
//! reaches the master's own registers. The bus address (base + 1) is
//! forwarded over the A2B link to whichever slave node the master's
//! NODEADR register selects, or to an I2C peripheral behind that node.
//!
//! Only the linkage to master, slave and peripheral I2C is provided; link
//! discovery and audio configuration are left to callers via
//! [`master_io`](Ad2420::master_io).

use crate::error::{Error, Result};
use crate::hw_trait::I2cBus;
use crate::i2c::{I2cDevice, I2cHandle};
use crate::tracing::prelude::*;
use crate::transfer::TransferSpec;

/// Default base address
pub const DEFAULT_ADDRESS: u8 = 0x68;

/// Highest slave node index
pub const MAX_NODE: u8 = 15;

/// Highest 7-bit peripheral address
pub const MAX_PERIPHERAL: u8 = 0x7F;

/// Register map
pub mod regs {
    pub const CHIP: u8 = 0x00;
    pub const NODEADR: u8 = 0x01;
    pub const VENDOR: u8 = 0x02;
    pub const PRODUCT: u8 = 0x03;
    pub const VERSION: u8 = 0x04;
    pub const CAPABILITY: u8 = 0x05;
    pub const SWCTL: u8 = 0x09;
    pub const BCDNSLOTS: u8 = 0x0A;
    pub const LDNSLOTS: u8 = 0x0B;
    pub const LUPSLOTS: u8 = 0x0C;
    pub const DNSLOTS: u8 = 0x0D;
    pub const UPSLOTS: u8 = 0x0E;
    pub const RESPCYCS: u8 = 0x0F;
    pub const SLOTFMT: u8 = 0x10;
    pub const DATCTL: u8 = 0x11;
    pub const CONTROL: u8 = 0x12;
    pub const DISCVRY: u8 = 0x13;
    pub const SWSTAT: u8 = 0x14;
    pub const INTSTAT: u8 = 0x15;
    pub const INTSRC: u8 = 0x16;
    pub const INTTYPE: u8 = 0x17;
    pub const INTPND0: u8 = 0x18;
    pub const INTPND1: u8 = 0x19;
    pub const INTPND2: u8 = 0x1A;
    pub const INTMSK0: u8 = 0x1B;
    pub const INTMSK1: u8 = 0x1C;
    pub const INTMSK2: u8 = 0x1D;
    pub const BECCTL: u8 = 0x1E;
    pub const BECNT: u8 = 0x1F;
    pub const TESTMODE: u8 = 0x20;
    pub const ERRCNT0: u8 = 0x21;
    pub const ERRCNT1: u8 = 0x22;
    pub const ERRCNT2: u8 = 0x23;
    pub const ERRCNT3: u8 = 0x24;
    pub const NODE: u8 = 0x29;
    pub const DISCSTAT: u8 = 0x2B;
    pub const TXACTL: u8 = 0x2E;
    pub const TXBCTL: u8 = 0x30;
    pub const LINTTYPE: u8 = 0x3E;
    pub const I2CCFG: u8 = 0x3F;
    pub const PLLCTL: u8 = 0x40;
    pub const I2SGCFG: u8 = 0x41;
    pub const I2SCFG: u8 = 0x42;
    pub const I2SRATE: u8 = 0x43;
    pub const I2STXOFFSET: u8 = 0x44;
    pub const I2SRXOFFSET: u8 = 0x45;
    pub const SYNCOFFSET: u8 = 0x46;
    pub const PDMCTL: u8 = 0x47;
    pub const ERRMGMT: u8 = 0x48;
    pub const GPIODAT: u8 = 0x4A;
    pub const GPIODATSET: u8 = 0x4B;
    pub const GPIODATCLR: u8 = 0x4C;
    pub const GPIOOEN: u8 = 0x4D;
    pub const GPIOIEN: u8 = 0x4E;
    pub const GPIOIN: u8 = 0x4F;
    pub const PINTEN: u8 = 0x50;
    pub const PINTINV: u8 = 0x51;
    pub const PINCFG: u8 = 0x52;
    pub const I2STEST: u8 = 0x53;
    pub const RAISE: u8 = 0x54;
    pub const GENERR: u8 = 0x55;
    pub const I2SRRATE: u8 = 0x56;
    pub const I2SRRCTL: u8 = 0x57;
    pub const I2SRRSOFFS: u8 = 0x58;
    pub const CLK1CFG: u8 = 0x59;
    pub const CLK2CFG: u8 = 0x5A;
    pub const BMMCFG: u8 = 0x5B;
    pub const SUSCFG: u8 = 0x5C;
    pub const PDMCTL2: u8 = 0x5D;
    pub const UPMASK0: u8 = 0x60;
    pub const UPMASK1: u8 = 0x61;
    pub const UPMASK2: u8 = 0x62;
    pub const UPMASK3: u8 = 0x63;
    pub const UPOFFSET: u8 = 0x64;
    pub const DNMASK0: u8 = 0x65;
    pub const DNMASK1: u8 = 0x66;
    pub const DNMASK2: u8 = 0x67;
    pub const DNMASK3: u8 = 0x68;
    pub const DNOFFSET: u8 = 0x69;
    pub const CHIPID0: u8 = 0x6A;
    pub const CHIPID1: u8 = 0x6B;
    pub const CHIPID2: u8 = 0x6C;
    pub const CHIPID3: u8 = 0x6D;
    pub const CHIPID4: u8 = 0x6E;
    pub const CHIPID5: u8 = 0x6F;
    pub const GPIODEN: u8 = 0x80;
    pub const GPIOD0MSK: u8 = 0x81;
    pub const GPIOD1MSK: u8 = 0x82;
    pub const GPIOD2MSK: u8 = 0x83;
    pub const GPIOD3MSK: u8 = 0x84;
    pub const GPIOD4MSK: u8 = 0x85;
    pub const GPIOD5MSK: u8 = 0x86;
    pub const GPIOD6MSK: u8 = 0x87;
    pub const GPIOD7MSK: u8 = 0x88;
    pub const GPIODDAT: u8 = 0x89;
    pub const GPIODINV: u8 = 0x8A;
    pub const MBOX0CTL: u8 = 0x90;
    pub const MBOX0STAT: u8 = 0x91;
    pub const MBOX0B0: u8 = 0x92;
    pub const MBOX0B1: u8 = 0x93;
    pub const MBOX0B2: u8 = 0x94;
    pub const MBOX0B3: u8 = 0x95;
    pub const MBOX1CTL: u8 = 0x96;
    pub const MBOX1STAT: u8 = 0x97;
    pub const MBOX1B0: u8 = 0x98;
    pub const MBOX1B1: u8 = 0x99;
    pub const MBOX1B2: u8 = 0x9A;
    pub const MBOX1B3: u8 = 0x9B;
}

/// NODEADR bit routing bus-address traffic to the node's peripheral
const NODEADR_PERI: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub vendor: u8,
    pub product: u8,
    pub version: u8,
    pub chip_id: [u8; 6],
}

pub struct Ad2420<B: I2cBus = I2cHandle> {
    base: I2cDevice<B>,
    bus: I2cDevice<B>,
}

impl Ad2420 {
    /// Open the base address `addr` and the bus address `addr + 1`.
    pub fn open(bus: Option<u32>, addr: u8) -> Result<Self> {
        let bus_addr = addr
            .checked_add(1)
            .ok_or_else(|| Error::invalid(format!("No bus address above 0x{:02x}", addr)))?;
        Ok(Self::new(
            I2cDevice::open(bus, addr)?,
            I2cDevice::open(bus, bus_addr)?,
        ))
    }
}

impl<B: I2cBus> Ad2420<B> {
    pub fn new(base: I2cDevice<B>, bus: I2cDevice<B>) -> Self {
        Self { base, bus }
    }

    /// Transaction with the master's own registers.
    pub fn master_io(&mut self, specs: &[TransferSpec]) -> Result<Vec<Vec<u8>>> {
        self.base.io(specs)
    }

    /// Transaction with the registers of slave `node`.
    pub fn slave_io(&mut self, node: u8, specs: &[TransferSpec]) -> Result<Vec<Vec<u8>>> {
        self.select(node, 0)?;
        self.bus.io(specs)
    }

    /// Transaction with the I2C peripheral at `peripheral` behind slave
    /// `node`.
    pub fn peripheral_io(
        &mut self,
        node: u8,
        peripheral: u8,
        specs: &[TransferSpec],
    ) -> Result<Vec<Vec<u8>>> {
        if peripheral > MAX_PERIPHERAL {
            return Err(Error::invalid(format!(
                "Peripheral address 0x{:02x} is not 7-bit",
                peripheral
            )));
        }
        // Point the slave at its peripheral first, then flip the master
        // into peripheral routing.
        self.slave_io(node, &[TransferSpec::write([regs::CHIP, peripheral])])?;
        self.select(node, NODEADR_PERI)?;
        self.bus.io(specs)
    }

    fn select(&mut self, node: u8, flags: u8) -> Result<()> {
        if node > MAX_NODE {
            return Err(Error::invalid(format!("A2B node {} > {}", node, MAX_NODE)));
        }
        self.base.write_register(regs::NODEADR, node | flags)
    }

    pub fn identify(&mut self) -> Result<Identity> {
        let info = self.base.read_registers(regs::VENDOR, 3)?;
        let chip = self.base.read_registers(regs::CHIPID0, 6)?;
        let mut chip_id = [0u8; 6];
        chip_id.copy_from_slice(&chip);
        let id = Identity {
            vendor: info[0],
            product: info[1],
            version: info[2],
            chip_id,
        };
        info!(
            "Detected AD24{:02X}: vendor=0x{:02X}, version=0x{:02X}, id={:02X?}",
            id.product, id.vendor, id.version, id.chip_id
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBus, Segment};

    const BASE: u8 = DEFAULT_ADDRESS;
    const BUS: u8 = DEFAULT_ADDRESS + 1;

    fn transceiver() -> (MockBus, Ad2420<MockBus>) {
        let mock = MockBus::new();
        let chip = Ad2420::new(
            I2cDevice::new(mock.clone(), BASE).unwrap(),
            I2cDevice::new(mock.clone(), BUS).unwrap(),
        );
        (mock, chip)
    }

    fn writes(mock: &MockBus) -> Vec<(u8, Vec<u8>)> {
        mock.transactions()
            .into_iter()
            .map(|t| (t.addr, t.written()))
            .collect()
    }

    #[test]
    fn master_io_goes_to_base_address() {
        let (mock, mut chip) = transceiver();
        chip.master_io(&[TransferSpec::write([regs::GPIOOEN, 2])]).unwrap();
        assert_eq!(writes(&mock), vec![(BASE, vec![regs::GPIOOEN, 2])]);
    }

    #[test]
    fn slave_io_selects_node_first() {
        let (mock, mut chip) = transceiver();
        mock.set_registers(BUS, regs::VENDOR, &[0xad]);
        let reads = chip
            .slave_io(3, &[TransferSpec::write(regs::VENDOR), TransferSpec::read(1)])
            .unwrap();
        assert_eq!(reads, vec![vec![0xad]]);
        assert_eq!(
            writes(&mock),
            vec![(BASE, vec![regs::NODEADR, 3]), (BUS, vec![regs::VENDOR])]
        );
    }

    #[test]
    fn peripheral_io_sequence() {
        let (mock, mut chip) = transceiver();
        chip.peripheral_io(2, 0x50, &[TransferSpec::write([0u8, 0xff])])
            .unwrap();
        assert_eq!(
            writes(&mock),
            vec![
                (BASE, vec![regs::NODEADR, 2]),
                (BUS, vec![regs::CHIP, 0x50]),
                (BASE, vec![regs::NODEADR, 0x22]),
                (BUS, vec![0, 0xff]),
            ]
        );
    }

    #[test]
    fn limits_checked_before_io() {
        let (mock, mut chip) = transceiver();
        assert!(chip.slave_io(16, &[TransferSpec::read(1)]).is_err());
        assert!(chip.peripheral_io(1, 0x80, &[TransferSpec::read(1)]).is_err());
        assert!(mock.transactions().is_empty());
    }

    #[test]
    fn identify_reads_ids() {
        let (mock, mut chip) = transceiver();
        mock.set_registers(BASE, regs::VENDOR, &[0xad, 0x20, 0x01]);
        mock.set_registers(BASE, regs::CHIPID0, &[1, 2, 3, 4, 5, 6]);
        let id = chip.identify().unwrap();
        assert_eq!(id.product, 0x20);
        assert_eq!(id.chip_id, [1, 2, 3, 4, 5, 6]);

        let reads = mock.transactions();
        assert!(reads
            .iter()
            .all(|t| t.addr == BASE && matches!(t.segments[1], Segment::Read(_))));
    }

    #[test]
    fn opens_both_addresses() {
        assert!(Ad2420::open(None, 0x68).is_ok());
        // 0x77 has no valid bus address above it.
        assert!(Ad2420::open(None, 0x77).is_err());
    }
}
