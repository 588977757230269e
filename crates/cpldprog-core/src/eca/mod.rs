//! Embedded configuration engine command codec
//!
//! Builds the bit-exact command frames for the MachXO2/XO3LF configuration
//! logic and tracks the one piece of protocol state that matters: whether
//! the configuration interface is currently open. Flash-mutating commands
//! are refused with [`Error::NotInConfigMode`] before anything reaches the
//! bus, so a sequencing bug shows up as a clean error instead of a device
//! left half-programmed.
//!
//! The codec is transport-agnostic: the same frames run over I2C and SPI.

pub mod opcodes;

use core::fmt;

use log::debug;

use crate::device::{DeviceInfo, FeatureRow, Sector, ECA_PAGE_SIZE};
use crate::error::{flash_check_name, Error, Result};
use crate::transport::{send, Transport};

/// How the configuration interface is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// User logic keeps running while flash is reprogrammed
    Transparent,
    /// Device is halted; required for touching the feature row
    Offline,
}

bitflags::bitflags! {
    /// Sector selection for the erase command
    ///
    /// The bit layout is the erase command's mode byte, sent on the wire
    /// as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EraseMask: u8 {
        /// SRAM configuration memory
        const SRAM = 0x01;
        /// Feature row
        const FEATURE_ROW = 0x02;
        /// Configuration flash
        const CFG = 0x04;
        /// User flash memory
        const UFM = 0x08;
    }
}

/// Decoded 32-bit status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister(pub u32);

impl StatusRegister {
    /// DONE bit: configuration flash holds a valid image
    pub fn done(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// Configuration interface enable bit
    pub fn isc_enabled(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    /// BUSY bit: an internal flash operation is in progress
    pub fn busy(self) -> bool {
        self.0 & (1 << 12) != 0
    }

    /// FAIL bit: the last operation failed
    pub fn fail(self) -> bool {
        self.0 & (1 << 13) != 0
    }

    /// Flash-check code (bits 19..=21)
    pub fn flash_check(self) -> u8 {
        ((self.0 >> 19) & 0x07) as u8
    }

    /// After a refresh, exactly DONE must be set in bits 8..=13
    pub fn refresh_ok(self) -> bool {
        (self.0 >> 8) & 0x3F == 0x01
    }
}

impl fmt::Display for StatusRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X} (done={} busy={} fail={} cfg-if={} check={})",
            self.0,
            self.done() as u8,
            self.busy() as u8,
            self.fail() as u8,
            self.isc_enabled() as u8,
            flash_check_name(self.flash_check())
        )
    }
}

/// Maximum number of status polls in one busy wait
pub const STATUS_POLL_LIMIT: u32 = 128;

/// Delay between status polls, in microseconds
pub const STATUS_POLL_DELAY_US: u32 = 1000;

/// Settle time after a page or feature-row program command
const PAGE_PROG_SETTLE_US: u32 = 200;

/// Command codec for one ECA-programmed device
///
/// Owns the transport for the duration of a session and refuses
/// flash-mutating commands while the configuration interface is closed.
pub struct Eca<T: Transport> {
    bus: T,
    device: &'static DeviceInfo,
    cfg_open: bool,
}

impl<T: Transport> Eca<T> {
    /// Bind a codec to a transport and a known part
    pub fn new(bus: T, device: &'static DeviceInfo) -> Self {
        Self {
            bus,
            device,
            cfg_open: false,
        }
    }

    /// The part this codec is bound to
    pub fn device(&self) -> &'static DeviceInfo {
        self.device
    }

    /// Whether the configuration interface is currently open
    pub fn is_config_open(&self) -> bool {
        self.cfg_open
    }

    fn guard(&self) -> Result<()> {
        if self.cfg_open {
            Ok(())
        } else {
            Err(Error::NotInConfigMode)
        }
    }

    // ============================================================
    // Identification
    // ============================================================

    /// Read the 32-bit device IDCODE
    pub fn read_device_id(&mut self) -> Result<u32> {
        let mut rx = [0u8; 4];
        self.bus
            .send_receive(&[opcodes::READ_DEVICE_ID, 0, 0, 0], &mut rx)?;
        Ok(u32::from_be_bytes(rx))
    }

    /// Read the 32-bit USERCODE
    pub fn read_user_code(&mut self) -> Result<u32> {
        let mut rx = [0u8; 4];
        self.bus
            .send_receive(&[opcodes::READ_USERCODE, 0, 0, 0], &mut rx)?;
        Ok(u32::from_be_bytes(rx))
    }

    /// Read the 64-bit factory trace ID
    pub fn read_trace_id(&mut self) -> Result<[u8; 8]> {
        let mut rx = [0u8; 8];
        self.bus
            .send_receive(&[opcodes::READ_TRACE_ID, 0, 0, 0], &mut rx)?;
        Ok(rx)
    }

    // ============================================================
    // Configuration interface control
    // ============================================================

    /// Open the configuration interface and wait for the device to settle
    pub fn open_config(&mut self, mode: ConfigMode) -> Result<()> {
        let op = match mode {
            ConfigMode::Transparent => opcodes::ENABLE_CONFIG_TRANSPARENT,
            ConfigMode::Offline => opcodes::ENABLE_CONFIG_OFFLINE,
        };
        send(&mut self.bus, &[op, 0x08, 0x00])?;
        self.wait_not_busy()?;
        self.cfg_open = true;
        debug!("configuration interface open ({:?} mode)", mode);
        Ok(())
    }

    /// Close the configuration interface
    ///
    /// The open flag is dropped even if the bus transfer fails, so a
    /// cleanup path never loops on a dead bus.
    pub fn close_config(&mut self) -> Result<()> {
        self.cfg_open = false;
        send(&mut self.bus, &[opcodes::DISABLE_CONFIG, 0, 0])?;
        debug!("configuration interface closed");
        Ok(())
    }

    /// Issue the single-byte bypass that terminates a session
    pub fn bypass(&mut self) -> Result<()> {
        send(&mut self.bus, &[opcodes::BYPASS])?;
        Ok(())
    }

    /// Reload the device from configuration flash and wait out the
    /// device's reconfiguration time
    ///
    /// Leaves the configuration interface closed.
    pub fn refresh(&mut self) -> Result<()> {
        self.cfg_open = false;
        send(&mut self.bus, &[opcodes::REFRESH, 0, 0])?;
        self.bus.delay_us(self.device.refresh_ms * 1000);
        debug!("refresh issued, waited {} ms", self.device.refresh_ms);
        Ok(())
    }

    // ============================================================
    // Erase
    // ============================================================

    /// Erase the selected sectors and wait for completion
    ///
    /// Waits the worst-case erase time for the slowest selected sector
    /// before polling, then polls until the busy bit clears.
    pub fn erase(&mut self, sectors: EraseMask) -> Result<()> {
        self.guard()?;
        debug!("erasing sectors 0x{:02X}", sectors.bits());
        send(&mut self.bus, &[opcodes::ERASE, sectors.bits(), 0, 0])?;
        self.bus.delay_us(self.erase_budget_ms(sectors) * 1000);
        match self.wait_not_busy() {
            Err(Error::BusyTimeout) => Err(Error::EraseTimeout),
            other => other,
        }
    }

    fn erase_budget_ms(&self, sectors: EraseMask) -> u32 {
        // Budget for the slowest sector selected: Cfg, then UFM, then
        // feature row / SRAM
        if sectors.contains(EraseMask::CFG) {
            self.device.cfg_erase_ms
        } else if sectors.contains(EraseMask::UFM) {
            self.device.ufm_erase_ms
        } else {
            self.device.feature_erase_ms
        }
    }

    // ============================================================
    // Flash addressing and page access
    // ============================================================

    /// Reset the page address of the given sector to 0
    pub fn reset_address(&mut self, sector: Sector) -> Result<()> {
        self.guard()?;
        let op = match sector {
            Sector::Cfg => opcodes::RESET_CFG_ADDRESS,
            Sector::Ufm => opcodes::RESET_UFM_ADDRESS,
        };
        send(&mut self.bus, &[op, 0, 0, 0])?;
        Ok(())
    }

    /// Set the page address to an absolute page index
    ///
    /// Bounds are checked against the device's page table before anything
    /// is sent; an out-of-range index never reaches the bus.
    pub fn set_page(&mut self, sector: Sector, page: u32) -> Result<()> {
        self.guard()?;
        let limit = self.device.page_count(sector);
        if page >= limit {
            return Err(Error::PageRangeExceeded {
                sector,
                page,
                limit,
            });
        }
        let space = match sector {
            Sector::Cfg => 0x00,
            Sector::Ufm => 0x40,
        };
        let [ph, pl] = (page as u16).to_be_bytes();
        send(
            &mut self.bus,
            &[opcodes::SET_PAGE_ADDRESS, 0, 0, 0, space, 0, ph, pl],
        )?;
        Ok(())
    }

    /// Program one 16-byte page at the current address and advance it
    pub fn write_page(&mut self, sector: Sector, data: &[u8; ECA_PAGE_SIZE]) -> Result<()> {
        self.guard()?;
        let op = match sector {
            Sector::Cfg => opcodes::PROGRAM_CFG_PAGE,
            Sector::Ufm => opcodes::PROGRAM_UFM_PAGE,
        };
        let mut tx = [0u8; 4 + ECA_PAGE_SIZE];
        tx[0] = op;
        tx[3] = 0x01;
        tx[4..].copy_from_slice(data);
        send(&mut self.bus, &tx)?;
        self.bus.delay_us(PAGE_PROG_SETTLE_US);
        self.wait_not_busy()
    }

    /// Read one 16-byte page at the current address and advance it
    pub fn read_page(&mut self, sector: Sector) -> Result<[u8; ECA_PAGE_SIZE]> {
        self.guard()?;
        let op = match sector {
            Sector::Cfg => opcodes::READ_CFG_PAGE,
            Sector::Ufm => opcodes::READ_UFM_PAGE,
        };
        let mut rx = [0u8; ECA_PAGE_SIZE];
        self.bus.send_receive(&[op, 0, 0, 0x01], &mut rx)?;
        Ok(rx)
    }

    // ============================================================
    // Feature row
    // ============================================================

    /// Program both feature-row fields
    pub fn write_feature_row(&mut self, row: &FeatureRow) -> Result<()> {
        self.guard()?;
        let mut tx = [0u8; 4 + 8];
        tx[0] = opcodes::PROGRAM_FEATURE;
        tx[4..].copy_from_slice(&row.feature);
        send(&mut self.bus, &tx)?;
        self.bus.delay_us(PAGE_PROG_SETTLE_US);
        self.wait_not_busy()?;

        let mut tx = [0u8; 4 + 2];
        tx[0] = opcodes::PROGRAM_FEABITS;
        tx[4..].copy_from_slice(&row.feabits);
        send(&mut self.bus, &tx)?;
        self.bus.delay_us(PAGE_PROG_SETTLE_US);
        self.wait_not_busy()
    }

    /// Read both feature-row fields
    pub fn read_feature_row(&mut self) -> Result<FeatureRow> {
        self.guard()?;
        let mut feature = [0u8; 8];
        self.bus
            .send_receive(&[opcodes::READ_FEATURE, 0, 0, 0], &mut feature)?;
        let mut feabits = [0u8; 2];
        self.bus
            .send_receive(&[opcodes::READ_FEABITS, 0, 0, 0], &mut feabits)?;
        Ok(FeatureRow { feature, feabits })
    }

    // ============================================================
    // Finalize
    // ============================================================

    /// Program the 32-bit USERCODE
    pub fn set_user_code(&mut self, code: u32) -> Result<()> {
        self.guard()?;
        let mut tx = [0u8; 4 + 4];
        tx[0] = opcodes::PROGRAM_USERCODE;
        tx[4..].copy_from_slice(&code.to_be_bytes());
        send(&mut self.bus, &tx)?;
        self.bus.delay_us(PAGE_PROG_SETTLE_US);
        self.wait_not_busy()
    }

    /// Set the DONE bit, marking configuration flash valid
    pub fn set_done(&mut self) -> Result<()> {
        self.guard()?;
        send(&mut self.bus, &[opcodes::PROGRAM_DONE, 0, 0, 0])?;
        self.bus.delay_us(PAGE_PROG_SETTLE_US);
        self.wait_not_busy()?;
        debug!("DONE bit set");
        Ok(())
    }

    // ============================================================
    // Status
    // ============================================================

    /// Read and decode the 32-bit status register
    pub fn read_status(&mut self) -> Result<StatusRegister> {
        let mut rx = [0u8; 4];
        self.bus
            .send_receive(&[opcodes::READ_STATUS, 0, 0, 0], &mut rx)?;
        Ok(StatusRegister(u32::from_be_bytes(rx)))
    }

    /// Read the 1-byte busy flag
    pub fn read_busy(&mut self) -> Result<bool> {
        let mut rx = [0u8; 1];
        self.bus
            .send_receive(&[opcodes::CHECK_BUSY, 0, 0, 0], &mut rx)?;
        Ok(rx[0] & 0x80 != 0)
    }

    /// Poll the status register until the busy bit clears
    ///
    /// Bounded at [`STATUS_POLL_LIMIT`] polls with [`STATUS_POLL_DELAY_US`]
    /// between them. A set FAIL bit aborts the wait immediately.
    pub fn wait_not_busy(&mut self) -> Result<()> {
        for _ in 0..STATUS_POLL_LIMIT {
            let sr = self.read_status()?;
            if sr.fail() {
                return Err(Error::FailBitSet {
                    code: sr.flash_check(),
                });
            }
            if !sr.busy() {
                return Ok(());
            }
            self.bus.delay_us(STATUS_POLL_DELAY_US);
        }
        Err(Error::BusyTimeout)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::device::DeviceKind;
    use crate::testutil::{MockEca, MockOp};

    fn codec(mock: &mut MockEca) -> Eca<&mut MockEca> {
        let device = mock.device;
        Eca::new(mock, device)
    }

    #[test]
    fn mutating_commands_require_open_config() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut eca = codec(&mut mock);
        assert_eq!(eca.erase(EraseMask::CFG), Err(Error::NotInConfigMode));
        assert_eq!(
            eca.write_page(Sector::Cfg, &[0u8; ECA_PAGE_SIZE]),
            Err(Error::NotInConfigMode)
        );
        assert_eq!(eca.set_done(), Err(Error::NotInConfigMode));
        drop(eca);
        assert!(mock.ops.is_empty());
    }

    #[test]
    fn page_write_read_roundtrip() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut eca = codec(&mut mock);
        eca.open_config(ConfigMode::Transparent).unwrap();
        eca.erase(EraseMask::CFG).unwrap();
        eca.reset_address(Sector::Cfg).unwrap();
        let pages = [[0xA5u8; ECA_PAGE_SIZE], [0x5Au8; ECA_PAGE_SIZE]];
        for page in &pages {
            eca.write_page(Sector::Cfg, page).unwrap();
        }
        eca.reset_address(Sector::Cfg).unwrap();
        for page in &pages {
            assert_eq!(eca.read_page(Sector::Cfg).unwrap(), *page);
        }
    }

    #[test]
    fn erase_of_erased_sector_is_idempotent() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_640);
        let mut eca = codec(&mut mock);
        eca.open_config(ConfigMode::Offline).unwrap();
        eca.erase(EraseMask::CFG | EraseMask::UFM).unwrap();
        eca.erase(EraseMask::CFG | EraseMask::UFM).unwrap();
        eca.reset_address(Sector::Cfg).unwrap();
        assert_eq!(eca.read_page(Sector::Cfg).unwrap(), [0u8; ECA_PAGE_SIZE]);
        eca.reset_address(Sector::Ufm).unwrap();
        assert_eq!(eca.read_page(Sector::Ufm).unwrap(), [0u8; ECA_PAGE_SIZE]);
    }

    #[test]
    fn set_page_past_end_sends_nothing() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut eca = codec(&mut mock);
        eca.open_config(ConfigMode::Transparent).unwrap();
        let limit = eca.device().ufm_pages;

        assert_eq!(
            eca.set_page(Sector::Ufm, limit),
            Err(Error::PageRangeExceeded {
                sector: Sector::Ufm,
                page: limit,
                limit,
            })
        );
        drop(eca);
        // Only the open sequence is on the bus; the bad set_page never was
        assert!(mock
            .ops
            .iter()
            .all(|op| !matches!(op, MockOp::SetPage { .. })));
    }

    #[test]
    fn ufm_less_part_rejects_any_ufm_page() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_256);
        let mut eca = codec(&mut mock);
        eca.open_config(ConfigMode::Transparent).unwrap();
        assert_eq!(
            eca.set_page(Sector::Ufm, 0),
            Err(Error::PageRangeExceeded {
                sector: Sector::Ufm,
                page: 0,
                limit: 0,
            })
        );
    }

    #[test]
    fn status_register_decodes_bits() {
        let sr = StatusRegister((1 << 8) | (1 << 12));
        assert!(sr.done());
        assert!(sr.busy());
        assert!(!sr.fail());
        assert!(!sr.refresh_ok());

        let ok = StatusRegister(1 << 8);
        assert!(ok.refresh_ok());

        let fail = StatusRegister((1 << 13) | (3 << 19));
        assert!(fail.fail());
        assert_eq!(fail.flash_check(), 3);
    }

    #[test]
    fn fail_bit_aborts_busy_wait() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        mock.status_fail = true;
        let mut eca = codec(&mut mock);
        assert_eq!(
            eca.wait_not_busy(),
            Err(Error::FailBitSet { code: 0 })
        );
    }

    #[test]
    fn device_id_read_is_big_endian() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_4000);
        let mut eca = codec(&mut mock);
        assert_eq!(eca.read_device_id().unwrap(), 0x012B_C043);
    }
}
