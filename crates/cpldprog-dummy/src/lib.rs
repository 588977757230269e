//! cpldprog-dummy - In-memory device emulators for testing
//!
//! Two emulators, one per protocol family: [`DummyEca`] behaves like a
//! blank MachXO2/XO3LF part on the far end of the bus, [`DummyNor`] like
//! an SPI NOR flash. Both implement [`Transport`], so every layer above
//! the bus - codec, session, registry, CLI - runs unmodified against
//! them. Useful for development without hardware and for end-to-end
//! tests.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use cpldprog_core::device::{DeviceInfo, DeviceKind, ECA_PAGE_SIZE};
use cpldprog_core::eca::opcodes as eca_op;
use cpldprog_core::error::TransportError;
use cpldprog_core::nor::opcodes as nor_op;
use cpldprog_core::transport::Transport;

/// Trace ID reported by every emulated CPLD
pub const DUMMY_TRACE_ID: [u8; 8] = [0x5A, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD];

// Flash-check codes the emulator raises
const CHECK_CMD_ERR: u32 = 2;
const CHECK_OVERFLOW: u32 = 6;

/// Payload after the 4-byte command header, checked for length
fn frame_body(tx: &[u8], len: usize) -> Result<&[u8], TransportError> {
    tx.get(4..4 + len).ok_or(TransportError::ShortTransfer {
        expected: 4 + len,
        got: tx.len(),
    })
}

/// Emulated MachXO2/XO3LF part
///
/// Starts blank (flash all zeros, DONE clear) and models the behavior
/// the programming sequence depends on: the configuration-open gate,
/// self-incrementing page addresses, erase-to-zero, and the status
/// register after a refresh.
#[cfg(feature = "alloc")]
pub struct DummyEca {
    device: &'static DeviceInfo,
    cfg: Vec<u8>,
    ufm: Vec<u8>,
    feature: [u8; 8],
    feabits: [u8; 2],
    user_code: u32,
    cfg_open: bool,
    done: bool,
    fail: bool,
    check: u32,
    cfg_page: usize,
    ufm_page: usize,
}

#[cfg(feature = "alloc")]
impl DummyEca {
    /// Create a blank emulated part
    pub fn new(kind: DeviceKind) -> Self {
        let device = kind.info();
        Self {
            device,
            cfg: vec![0u8; device.cfg_pages as usize * ECA_PAGE_SIZE],
            ufm: vec![0u8; device.ufm_pages as usize * ECA_PAGE_SIZE],
            feature: [0; 8],
            feabits: [0; 2],
            user_code: 0,
            cfg_open: false,
            done: false,
            fail: false,
            check: 0,
            cfg_page: 0,
            ufm_page: 0,
        }
    }

    /// Configuration flash contents
    pub fn cfg_data(&self) -> &[u8] {
        &self.cfg
    }

    /// UFM contents
    pub fn ufm_data(&self) -> &[u8] {
        &self.ufm
    }

    /// Programmed USERCODE
    pub fn user_code(&self) -> u32 {
        self.user_code
    }

    /// DONE bit state
    pub fn done(&self) -> bool {
        self.done
    }

    fn status(&self) -> u32 {
        let mut sr = 0u32;
        if self.done {
            sr |= 1 << 8;
        }
        if self.cfg_open {
            sr |= 1 << 9;
        }
        if self.fail {
            sr |= 1 << 13;
        }
        sr | (self.check << 19)
    }

    /// A flash-mutating command arrived while the interface was closed
    fn reject_closed(&mut self) {
        log::warn!("dummy-eca: flash command while configuration interface closed");
        self.fail = true;
        self.check = CHECK_CMD_ERR;
    }

    fn erase(&mut self, mask: u8) {
        if mask & 0x04 != 0 {
            self.cfg.fill(0);
            self.done = false;
        }
        if mask & 0x08 != 0 {
            self.ufm.fill(0);
        }
        if mask & 0x02 != 0 {
            self.feature = [0; 8];
            self.feabits = [0; 2];
        }
        self.fail = false;
        self.check = 0;
    }

    fn program_page(&mut self, ufm: bool, data: &[u8]) {
        let (mem, page) = if ufm {
            (&mut self.ufm, &mut self.ufm_page)
        } else {
            (&mut self.cfg, &mut self.cfg_page)
        };
        let offset = *page * ECA_PAGE_SIZE;
        if offset + ECA_PAGE_SIZE > mem.len() {
            self.fail = true;
            self.check = CHECK_OVERFLOW;
            return;
        }
        mem[offset..offset + ECA_PAGE_SIZE].copy_from_slice(data);
        *page += 1;
    }

    fn read_page(&mut self, ufm: bool, rx: &mut [u8]) {
        let (mem, page) = if ufm {
            (&self.ufm, &mut self.ufm_page)
        } else {
            (&self.cfg, &mut self.cfg_page)
        };
        let offset = *page * ECA_PAGE_SIZE;
        if offset + ECA_PAGE_SIZE > mem.len() {
            self.fail = true;
            self.check = CHECK_OVERFLOW;
            rx.fill(0);
            return;
        }
        let n = rx.len().min(ECA_PAGE_SIZE);
        rx[..n].copy_from_slice(&mem[offset..offset + n]);
        *page += 1;
    }
}

#[cfg(feature = "alloc")]
impl Transport for DummyEca {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        if tx.is_empty() {
            return Err(TransportError::NoAck);
        }

        match tx[0] {
            eca_op::READ_DEVICE_ID => {
                let id = self.device.idcode.to_be_bytes();
                let n = rx.len().min(4);
                rx[..n].copy_from_slice(&id[..n]);
            }
            eca_op::READ_USERCODE => {
                let code = self.user_code.to_be_bytes();
                let n = rx.len().min(4);
                rx[..n].copy_from_slice(&code[..n]);
            }
            eca_op::READ_TRACE_ID => {
                let n = rx.len().min(8);
                rx[..n].copy_from_slice(&DUMMY_TRACE_ID[..n]);
            }

            eca_op::ENABLE_CONFIG_TRANSPARENT | eca_op::ENABLE_CONFIG_OFFLINE => {
                self.cfg_open = true;
                self.fail = false;
                self.check = 0;
            }
            eca_op::DISABLE_CONFIG => self.cfg_open = false,
            eca_op::BYPASS => {}
            eca_op::REFRESH => {
                // Reload from flash: interface drops, DONE comes up
                self.cfg_open = false;
                self.done = true;
                self.fail = false;
                self.check = 0;
            }

            eca_op::ERASE if self.cfg_open => self.erase(tx.get(1).copied().unwrap_or(0)),
            eca_op::RESET_CFG_ADDRESS if self.cfg_open => self.cfg_page = 0,
            eca_op::RESET_UFM_ADDRESS if self.cfg_open => self.ufm_page = 0,
            eca_op::SET_PAGE_ADDRESS if self.cfg_open => {
                if tx.len() < 8 {
                    return Err(TransportError::ShortTransfer {
                        expected: 8,
                        got: tx.len(),
                    });
                }
                let page = u16::from_be_bytes([tx[6], tx[7]]) as usize;
                if tx[4] & 0x40 != 0 {
                    self.ufm_page = page;
                } else {
                    self.cfg_page = page;
                }
            }

            eca_op::PROGRAM_CFG_PAGE if self.cfg_open => {
                let data = frame_body(tx, ECA_PAGE_SIZE)?;
                self.program_page(false, data);
            }
            eca_op::PROGRAM_UFM_PAGE if self.cfg_open => {
                let data = frame_body(tx, ECA_PAGE_SIZE)?;
                self.program_page(true, data);
            }
            eca_op::READ_CFG_PAGE if self.cfg_open => self.read_page(false, rx),
            eca_op::READ_UFM_PAGE if self.cfg_open => self.read_page(true, rx),

            eca_op::PROGRAM_FEATURE if self.cfg_open => {
                self.feature.copy_from_slice(frame_body(tx, 8)?);
            }
            eca_op::PROGRAM_FEABITS if self.cfg_open => {
                self.feabits.copy_from_slice(frame_body(tx, 2)?);
            }
            eca_op::READ_FEATURE if self.cfg_open => {
                let n = rx.len().min(8);
                rx[..n].copy_from_slice(&self.feature[..n]);
            }
            eca_op::READ_FEABITS if self.cfg_open => {
                let n = rx.len().min(2);
                rx[..n].copy_from_slice(&self.feabits[..n]);
            }

            eca_op::PROGRAM_USERCODE if self.cfg_open => {
                let body = frame_body(tx, 4)?;
                self.user_code = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            }
            eca_op::PROGRAM_DONE if self.cfg_open => self.done = true,

            eca_op::READ_STATUS => {
                let sr = self.status().to_be_bytes();
                let n = rx.len().min(4);
                rx[..n].copy_from_slice(&sr[..n]);
            }
            eca_op::CHECK_BUSY => {
                // Emulated operations complete instantly
                if let Some(b) = rx.first_mut() {
                    *b = 0x00;
                }
            }

            eca_op::ERASE
            | eca_op::RESET_CFG_ADDRESS
            | eca_op::RESET_UFM_ADDRESS
            | eca_op::SET_PAGE_ADDRESS
            | eca_op::PROGRAM_CFG_PAGE
            | eca_op::PROGRAM_UFM_PAGE
            | eca_op::READ_CFG_PAGE
            | eca_op::READ_UFM_PAGE
            | eca_op::PROGRAM_FEATURE
            | eca_op::PROGRAM_FEABITS
            | eca_op::READ_FEATURE
            | eca_op::READ_FEABITS
            | eca_op::PROGRAM_USERCODE
            | eca_op::PROGRAM_DONE => self.reject_closed(),

            _ => return Err(TransportError::NoAck),
        }

        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {
        // Nothing to wait for in memory
    }
}

/// Configuration for the emulated NOR flash
#[derive(Debug, Clone)]
pub struct DummyNorConfig {
    /// 3-byte JEDEC ID returned by RDID
    pub jedec_id: [u8; 3],
    /// Flash size in bytes
    pub size: usize,
}

impl Default for DummyNorConfig {
    fn default() -> Self {
        Self {
            jedec_id: [0xC2, 0x20, 0x18], // MX25L128
            size: 16 * 1024 * 1024,
        }
    }
}

/// Emulated SPI NOR flash
///
/// Starts erased (all `0xFF`) and models write-enable latching,
/// AND-programming and sector-aligned erase. Operations complete
/// instantly, so the WIP bit never reads set.
#[cfg(feature = "alloc")]
pub struct DummyNor {
    config: DummyNorConfig,
    data: Vec<u8>,
    write_enabled: bool,
}

#[cfg(feature = "alloc")]
impl DummyNor {
    /// Create a blank emulated flash with the given configuration
    pub fn new(config: DummyNorConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            write_enabled: false,
        }
    }

    /// Create a blank emulated flash with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyNorConfig::default())
    }

    /// Create an emulated flash with pre-filled data
    pub fn with_data(config: DummyNorConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn addr(tx: &[u8]) -> usize {
        ((tx[1] as usize) << 16) | ((tx[2] as usize) << 8) | tx[3] as usize
    }
}

#[cfg(feature = "alloc")]
impl Transport for DummyNor {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        if tx.is_empty() {
            return Err(TransportError::NoAck);
        }

        match tx[0] {
            nor_op::RDID => {
                let n = rx.len().min(3);
                rx[..n].copy_from_slice(&self.config.jedec_id[..n]);
            }

            nor_op::RDSR => {
                let mut sr = 0u8;
                if self.write_enabled {
                    sr |= nor_op::SR_WEL;
                }
                if let Some(b) = rx.first_mut() {
                    *b = sr;
                }
            }

            nor_op::WREN => self.write_enabled = true,

            nor_op::READ => {
                if tx.len() < 4 {
                    return Err(TransportError::ShortTransfer {
                        expected: 4,
                        got: tx.len(),
                    });
                }
                let addr = Self::addr(tx);
                // Reads wrap around the end of the array like hardware
                for (i, b) in rx.iter_mut().enumerate() {
                    *b = self.data[(addr + i) % self.data.len()];
                }
            }

            nor_op::PAGE_PROGRAM => {
                if tx.len() < 4 {
                    return Err(TransportError::ShortTransfer {
                        expected: 4,
                        got: tx.len(),
                    });
                }
                if !self.write_enabled {
                    log::warn!("dummy-nor: page program without write enable, ignored");
                    return Ok(());
                }
                let addr = Self::addr(tx);
                let len = self.data.len();
                // Programming only clears bits
                for (i, &b) in tx[4..].iter().enumerate() {
                    self.data[(addr + i) % len] &= b;
                }
                self.write_enabled = false;
            }

            nor_op::SECTOR_ERASE => {
                if tx.len() < 4 {
                    return Err(TransportError::ShortTransfer {
                        expected: 4,
                        got: tx.len(),
                    });
                }
                if !self.write_enabled {
                    log::warn!("dummy-nor: sector erase without write enable, ignored");
                    return Ok(());
                }
                let sector = cpldprog_core::nor::SECTOR_SIZE;
                let base = Self::addr(tx) & !(sector - 1);
                let end = (base + sector).min(self.data.len());
                self.data[base..end].fill(0xFF);
                self.write_enabled = false;
            }

            nor_op::BULK_ERASE => {
                if !self.write_enabled {
                    log::warn!("dummy-nor: bulk erase without write enable, ignored");
                    return Ok(());
                }
                self.data.fill(0xFF);
                self.write_enabled = false;
            }

            _ => return Err(TransportError::NoAck),
        }

        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {
        // Nothing to wait for in memory
    }
}
