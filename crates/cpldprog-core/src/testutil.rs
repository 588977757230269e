//! Bus mocks for protocol and session tests
//!
//! `MockEca` emulates enough of a MachXO2-class configuration engine to
//! exercise the codec and session layers: page memories, address counters,
//! the status register, and knobs for injecting bus and verify faults.
//! `MockNor` does the same for a generic SPI NOR flash, including the
//! write-enable latch rules.

use alloc::vec;
use alloc::vec::Vec;

use crate::device::{DeviceInfo, DeviceKind, FeatureRow, Sector, ECA_PAGE_SIZE};
use crate::eca::opcodes;
use crate::error::TransportError;
use crate::nor;
use crate::transport::Transport;

/// One decoded command seen by the mock device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockOp {
    OpenTransparent,
    OpenOffline,
    CloseConfig,
    Bypass,
    Refresh,
    Erase(u8),
    ResetAddr(Sector),
    SetPage { ufm: bool, page: u16 },
    WritePage(Sector),
    ReadPage(Sector),
    WriteFeature,
    WriteFeabits,
    ReadFeature,
    ReadFeabits,
    SetUserCode(u32),
    SetDone,
    ReadId,
    ReadUserCode,
    ReadTraceId,
    ReadStatus,
    ReadBusy,
}

pub(crate) struct MockEca {
    pub device: &'static DeviceInfo,
    pub cfg: Vec<u8>,
    pub ufm: Vec<u8>,
    pub feature: FeatureRow,
    pub user_code: u32,
    pub trace_id: [u8; 8],
    pub done: bool,
    pub ops: Vec<MockOp>,
    pub delays_us: u64,
    /// Report FAIL in every status read
    pub status_fail: bool,
    /// Report BUSY in every status read issued after a refresh
    pub busy_after_refresh: bool,
    /// NACK the nth (0-based) Cfg page write
    pub fail_cfg_write_at: Option<u32>,
    /// Serve these bytes for the nth (0-based) Cfg page read
    pub cfg_read_override: Option<(u32, [u8; ECA_PAGE_SIZE])>,
    cfg_if_open: bool,
    stuck_busy: bool,
    cfg_addr: usize,
    ufm_addr: usize,
    cfg_writes_seen: u32,
    cfg_reads_seen: u32,
}

impl MockEca {
    pub fn new(kind: DeviceKind) -> Self {
        let device = kind.info();
        Self {
            device,
            cfg: vec![0u8; device.sector_bytes(Sector::Cfg)],
            ufm: vec![0u8; device.sector_bytes(Sector::Ufm)],
            feature: FeatureRow::default(),
            user_code: 0,
            trace_id: [0x4C, 0x54, 0x58, 0x00, 0x12, 0x34, 0x56, 0x78],
            done: false,
            ops: Vec::new(),
            delays_us: 0,
            status_fail: false,
            busy_after_refresh: false,
            fail_cfg_write_at: None,
            cfg_read_override: None,
            cfg_if_open: false,
            stuck_busy: false,
            cfg_addr: 0,
            ufm_addr: 0,
            cfg_writes_seen: 0,
            cfg_reads_seen: 0,
        }
    }

    /// Pages currently in Cfg flash, for post-run assertions
    pub fn cfg_page(&self, index: usize) -> &[u8] {
        &self.cfg[index * ECA_PAGE_SIZE..(index + 1) * ECA_PAGE_SIZE]
    }

    pub fn ufm_page(&self, index: usize) -> &[u8] {
        &self.ufm[index * ECA_PAGE_SIZE..(index + 1) * ECA_PAGE_SIZE]
    }

    /// Ops filtered down to the ones that change device state, which is
    /// what the end-to-end sequence assertions care about
    pub fn command_trace(&self) -> Vec<MockOp> {
        self.ops
            .iter()
            .copied()
            .filter(|op| !matches!(op, MockOp::ReadStatus | MockOp::ReadBusy))
            .collect()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.ops.iter().filter(|&&o| o == op).count()
    }

    fn status(&self) -> u32 {
        let mut sr = 0u32;
        if self.done {
            sr |= 1 << 8;
        }
        if self.cfg_if_open {
            sr |= 1 << 9;
        }
        if self.stuck_busy {
            sr |= 1 << 12;
        }
        if self.status_fail {
            sr |= 1 << 13;
        }
        sr
    }
}

impl Transport for MockEca {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        match tx[0] {
            opcodes::READ_DEVICE_ID => {
                self.ops.push(MockOp::ReadId);
                rx.copy_from_slice(&self.device.idcode.to_be_bytes());
            }
            opcodes::READ_USERCODE => {
                self.ops.push(MockOp::ReadUserCode);
                rx.copy_from_slice(&self.user_code.to_be_bytes());
            }
            opcodes::READ_TRACE_ID => {
                self.ops.push(MockOp::ReadTraceId);
                rx.copy_from_slice(&self.trace_id);
            }
            opcodes::ENABLE_CONFIG_TRANSPARENT => {
                self.ops.push(MockOp::OpenTransparent);
                self.cfg_if_open = true;
            }
            opcodes::ENABLE_CONFIG_OFFLINE => {
                self.ops.push(MockOp::OpenOffline);
                self.cfg_if_open = true;
            }
            opcodes::DISABLE_CONFIG => {
                self.ops.push(MockOp::CloseConfig);
                self.cfg_if_open = false;
            }
            opcodes::BYPASS => {
                self.ops.push(MockOp::Bypass);
            }
            opcodes::REFRESH => {
                self.ops.push(MockOp::Refresh);
                self.cfg_if_open = false;
                self.done = true;
                if self.busy_after_refresh {
                    self.stuck_busy = true;
                }
            }
            opcodes::ERASE => {
                let mask = tx[1];
                self.ops.push(MockOp::Erase(mask));
                if mask & 0x04 != 0 {
                    self.cfg.iter_mut().for_each(|b| *b = 0);
                    self.done = false;
                }
                if mask & 0x08 != 0 {
                    self.ufm.iter_mut().for_each(|b| *b = 0);
                }
                if mask & 0x02 != 0 {
                    self.feature = FeatureRow::default();
                }
            }
            opcodes::RESET_CFG_ADDRESS => {
                self.ops.push(MockOp::ResetAddr(Sector::Cfg));
                self.cfg_addr = 0;
            }
            opcodes::RESET_UFM_ADDRESS => {
                self.ops.push(MockOp::ResetAddr(Sector::Ufm));
                self.ufm_addr = 0;
            }
            opcodes::SET_PAGE_ADDRESS => {
                let ufm = tx[4] & 0x40 != 0;
                let page = u16::from_be_bytes([tx[6], tx[7]]);
                self.ops.push(MockOp::SetPage { ufm, page });
                if ufm {
                    self.ufm_addr = page as usize;
                } else {
                    self.cfg_addr = page as usize;
                }
            }
            opcodes::PROGRAM_CFG_PAGE => {
                self.ops.push(MockOp::WritePage(Sector::Cfg));
                let nth = self.cfg_writes_seen;
                self.cfg_writes_seen += 1;
                if self.fail_cfg_write_at == Some(nth) {
                    return Err(TransportError::NoAck);
                }
                let start = self.cfg_addr * ECA_PAGE_SIZE;
                self.cfg[start..start + ECA_PAGE_SIZE].copy_from_slice(&tx[4..]);
                self.cfg_addr += 1;
            }
            opcodes::READ_CFG_PAGE => {
                self.ops.push(MockOp::ReadPage(Sector::Cfg));
                let nth = self.cfg_reads_seen;
                self.cfg_reads_seen += 1;
                match self.cfg_read_override {
                    Some((at, bytes)) if at == nth => rx.copy_from_slice(&bytes),
                    _ => {
                        let start = self.cfg_addr * ECA_PAGE_SIZE;
                        rx.copy_from_slice(&self.cfg[start..start + ECA_PAGE_SIZE]);
                    }
                }
                self.cfg_addr += 1;
            }
            opcodes::PROGRAM_UFM_PAGE => {
                self.ops.push(MockOp::WritePage(Sector::Ufm));
                let start = self.ufm_addr * ECA_PAGE_SIZE;
                self.ufm[start..start + ECA_PAGE_SIZE].copy_from_slice(&tx[4..]);
                self.ufm_addr += 1;
            }
            opcodes::READ_UFM_PAGE => {
                self.ops.push(MockOp::ReadPage(Sector::Ufm));
                let start = self.ufm_addr * ECA_PAGE_SIZE;
                rx.copy_from_slice(&self.ufm[start..start + ECA_PAGE_SIZE]);
                self.ufm_addr += 1;
            }
            opcodes::PROGRAM_FEATURE => {
                self.ops.push(MockOp::WriteFeature);
                self.feature.feature.copy_from_slice(&tx[4..12]);
            }
            opcodes::PROGRAM_FEABITS => {
                self.ops.push(MockOp::WriteFeabits);
                self.feature.feabits.copy_from_slice(&tx[4..6]);
            }
            opcodes::READ_FEATURE => {
                self.ops.push(MockOp::ReadFeature);
                rx.copy_from_slice(&self.feature.feature);
            }
            opcodes::READ_FEABITS => {
                self.ops.push(MockOp::ReadFeabits);
                rx.copy_from_slice(&self.feature.feabits);
            }
            opcodes::PROGRAM_USERCODE => {
                let code = u32::from_be_bytes([tx[4], tx[5], tx[6], tx[7]]);
                self.ops.push(MockOp::SetUserCode(code));
                self.user_code = code;
            }
            opcodes::PROGRAM_DONE => {
                self.ops.push(MockOp::SetDone);
                self.done = true;
            }
            opcodes::READ_STATUS => {
                self.ops.push(MockOp::ReadStatus);
                rx.copy_from_slice(&self.status().to_be_bytes());
            }
            opcodes::CHECK_BUSY => {
                self.ops.push(MockOp::ReadBusy);
                rx[0] = if self.stuck_busy { 0x80 } else { 0x00 };
            }
            other => panic!("MockEca: unexpected opcode 0x{:02X}", other),
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delays_us += us as u64;
    }
}

/// One decoded command seen by the NOR mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NorOp {
    ReadId,
    WriteEnable,
    ReadStatus,
    SectorErase(u32),
    BulkErase,
    PageProgram { addr: u32, len: usize },
    Read { addr: u32, len: usize },
}

pub(crate) struct MockNor {
    pub mem: Vec<u8>,
    pub jedec_id: [u8; 3],
    pub ops: Vec<NorOp>,
    pub delays_us: u64,
    wel: bool,
}

impl MockNor {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0xFF; size],
            jedec_id: [0xC2, 0x20, 0x18],
            ops: Vec::new(),
            delays_us: 0,
            wel: false,
        }
    }
}

fn addr24(tx: &[u8]) -> u32 {
    ((tx[1] as u32) << 16) | ((tx[2] as u32) << 8) | tx[3] as u32
}

impl Transport for MockNor {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        match tx[0] {
            nor::opcodes::RDID => {
                self.ops.push(NorOp::ReadId);
                rx.copy_from_slice(&self.jedec_id);
            }
            nor::opcodes::WREN => {
                self.ops.push(NorOp::WriteEnable);
                self.wel = true;
            }
            nor::opcodes::RDSR => {
                self.ops.push(NorOp::ReadStatus);
                rx[0] = if self.wel { 0x02 } else { 0x00 };
            }
            nor::opcodes::SECTOR_ERASE => {
                let addr = addr24(tx);
                self.ops.push(NorOp::SectorErase(addr));
                assert!(self.wel, "sector erase without write enable");
                self.wel = false;
                let start = (addr as usize) & !(nor::SECTOR_SIZE - 1);
                let end = (start + nor::SECTOR_SIZE).min(self.mem.len());
                self.mem[start..end].iter_mut().for_each(|b| *b = 0xFF);
            }
            nor::opcodes::BULK_ERASE => {
                self.ops.push(NorOp::BulkErase);
                assert!(self.wel, "bulk erase without write enable");
                self.wel = false;
                self.mem.iter_mut().for_each(|b| *b = 0xFF);
            }
            nor::opcodes::PAGE_PROGRAM => {
                let addr = addr24(tx);
                let data = &tx[4..];
                self.ops.push(NorOp::PageProgram {
                    addr,
                    len: data.len(),
                });
                assert!(self.wel, "page program without write enable");
                self.wel = false;
                // NOR programming can only clear bits
                for (i, b) in data.iter().enumerate() {
                    self.mem[addr as usize + i] &= b;
                }
            }
            nor::opcodes::READ => {
                let addr = addr24(tx);
                self.ops.push(NorOp::Read {
                    addr,
                    len: rx.len(),
                });
                rx.copy_from_slice(&self.mem[addr as usize..addr as usize + rx.len()]);
            }
            other => panic!("MockNor: unexpected opcode 0x{:02X}", other),
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delays_us += us as u64;
    }
}
