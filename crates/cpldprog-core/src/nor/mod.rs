//! SPI NOR flash protocol
//!
//! The SPI-attached FPGAs (Xilinx and Anlogic parts) are configured from a
//! plain NOR flash sitting next to them, so programming those devices means
//! programming the flash. This module speaks the standard 3-byte-address
//! command set: every mutating command is preceded by a write enable and
//! followed by a bounded poll of the WIP bit.

pub mod opcodes;

#[cfg(feature = "alloc")]
pub mod target;

use crate::error::{Error, Result};
use crate::transport::{send, Transport};

/// Program page size in bytes
pub const PAGE_SIZE: usize = 256;

/// Erase sector size in bytes
pub const SECTOR_SIZE: usize = 0x1_0000;

/// Poll interval while waiting for a page program, in microseconds
const PROGRAM_POLL_US: u32 = 50;

/// Page program completion budget, in microseconds
const PROGRAM_TIMEOUT_US: u32 = 10_000;

/// Poll interval while waiting for a sector erase, in microseconds
const ERASE_POLL_US: u32 = 10_000;

/// Sector erase completion budget, in microseconds
const ERASE_TIMEOUT_US: u32 = 3_000_000;

/// Dual-image flash layout for one board family
///
/// Both families keep a factory ("golden") image and a field-updatable
/// image in the same flash; they just disagree on which half is which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorLayout {
    /// Base address of the field-update image
    pub update_base: u32,
    /// Base address of the golden fallback image
    pub golden_base: u32,
    /// Maximum image size in bytes
    pub max_image: u32,
}

/// Image slot within a dual-image flash layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The field-updatable image
    Update,
    /// The golden fallback image
    Golden,
}

impl NorLayout {
    /// Layout used by the Xilinx FPGA flashes: golden image in the low
    /// half, update image in the high half
    pub const XILINX: NorLayout = NorLayout {
        update_base: 0x40_0000,
        golden_base: 0x0,
        max_image: 0x40_0000,
    };

    /// Layout used by the Anlogic FPGA flashes: update image in the low
    /// half, golden image in the high half
    pub const ANLOGIC: NorLayout = NorLayout {
        update_base: 0x0,
        golden_base: 0x80_0000,
        max_image: 0x40_0000,
    };

    /// Base address of the given slot
    pub fn base(&self, slot: Slot) -> u32 {
        match slot {
            Slot::Update => self.update_base,
            Slot::Golden => self.golden_base,
        }
    }
}

fn cmd_addr(op: u8, addr: u32) -> [u8; 4] {
    [op, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

/// Read the 3-byte JEDEC ID
pub fn read_id<T: Transport + ?Sized>(bus: &mut T) -> Result<[u8; 3]> {
    let mut rx = [0u8; 3];
    bus.send_receive(&[opcodes::RDID], &mut rx)?;
    Ok(rx)
}

/// Read status register 1
pub fn read_status<T: Transport + ?Sized>(bus: &mut T) -> Result<u8> {
    let mut rx = [0u8; 1];
    bus.send_receive(&[opcodes::RDSR], &mut rx)?;
    Ok(rx[0])
}

/// Set the write-enable latch
pub fn write_enable<T: Transport + ?Sized>(bus: &mut T) -> Result<()> {
    send(bus, &[opcodes::WREN])?;
    Ok(())
}

/// Poll the WIP bit until it clears or the budget runs out
pub fn wait_ready<T: Transport + ?Sized>(
    bus: &mut T,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let mut waited = 0u32;
    loop {
        let sr = read_status(bus)?;
        if sr & opcodes::SR_WIP == 0 {
            return Ok(());
        }
        if waited >= timeout_us {
            return Err(Error::BusyTimeout);
        }
        bus.delay_us(poll_delay_us);
        waited = waited.saturating_add(poll_delay_us);
    }
}

/// Read `buf.len()` bytes starting at `addr`
pub fn read<T: Transport + ?Sized>(bus: &mut T, addr: u32, buf: &mut [u8]) -> Result<()> {
    bus.send_receive(&cmd_addr(opcodes::READ, addr), buf)?;
    Ok(())
}

/// Erase the 64 KiB sector containing `addr`
pub fn sector_erase<T: Transport + ?Sized>(bus: &mut T, addr: u32) -> Result<()> {
    write_enable(bus)?;
    send(bus, &cmd_addr(opcodes::SECTOR_ERASE, addr))?;
    wait_ready(bus, ERASE_POLL_US, ERASE_TIMEOUT_US).map_err(|e| match e {
        Error::BusyTimeout => Error::EraseTimeout,
        other => other,
    })
}

/// Program up to one page at `addr`
///
/// `data` must not cross a page boundary; the flash would wrap within the
/// page and corrupt the start of it.
pub fn page_program<T: Transport + ?Sized>(bus: &mut T, addr: u32, data: &[u8]) -> Result<()> {
    debug_assert!(data.len() <= PAGE_SIZE);
    debug_assert_eq!(
        (addr as usize) / PAGE_SIZE,
        (addr as usize + data.len() - 1) / PAGE_SIZE
    );
    write_enable(bus)?;
    let header = cmd_addr(opcodes::PAGE_PROGRAM, addr);
    let mut tx = [0u8; 4 + PAGE_SIZE];
    tx[..4].copy_from_slice(&header);
    tx[4..4 + data.len()].copy_from_slice(data);
    send(bus, &tx[..4 + data.len()])?;
    wait_ready(bus, PROGRAM_POLL_US, PROGRAM_TIMEOUT_US)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::testutil::{MockNor, NorOp};

    #[test]
    fn page_program_sets_write_enable_first() {
        let mut mock = MockNor::new(0x2_0000);
        page_program(&mut mock, 0x100, &[0xAB; 16]).unwrap();
        assert_eq!(mock.ops[0], NorOp::WriteEnable);
        assert_eq!(
            mock.ops[1],
            NorOp::PageProgram {
                addr: 0x100,
                len: 16
            }
        );
        assert_eq!(&mock.mem[0x100..0x110], &[0xAB; 16]);
    }

    #[test]
    fn sector_erase_restores_erased_value() {
        let mut mock = MockNor::new(0x2_0000);
        page_program(&mut mock, 0x0, &[0x00; 256]).unwrap();
        sector_erase(&mut mock, 0x0).unwrap();
        assert!(mock.mem[..SECTOR_SIZE].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn read_returns_programmed_bytes() {
        let mut mock = MockNor::new(0x2_0000);
        page_program(&mut mock, 0x40, &[0x5A; 8]).unwrap();
        let mut buf = [0u8; 8];
        read(&mut mock, 0x40, &mut buf).unwrap();
        assert_eq!(buf, [0x5A; 8]);
    }

    #[test]
    fn layouts_place_slots_at_opposite_ends() {
        assert_eq!(NorLayout::XILINX.base(Slot::Golden), 0x0);
        assert_eq!(NorLayout::XILINX.base(Slot::Update), 0x40_0000);
        assert_eq!(NorLayout::ANLOGIC.base(Slot::Update), 0x0);
        assert_eq!(NorLayout::ANLOGIC.base(Slot::Golden), 0x80_0000);
    }
}
