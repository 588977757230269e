//! Programming session for NOR-backed FPGAs
//!
//! The Xilinx and Anlogic parts load themselves from flash at power-up, so
//! "programming the FPGA" is erase/program/verify of the image slot inside
//! that flash. There is no configuration interface to open and no feature
//! row; the mode bitmap only contributes its verify bit here.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use log::{debug, error, info};

use crate::device::Sector;
use crate::error::{Error, Result};
use crate::image::ImageData;
use crate::nor::{self, NorLayout, Slot, PAGE_SIZE, SECTOR_SIZE};
use crate::progress::ProgressSink;
use crate::session::ProgramOptions;
use crate::target::{IspTarget, ProbeReport, StatusReport, TargetFamily, TargetInfo};
use crate::transport::Transport;

/// A programming session bound to one image slot of one flash
pub struct NorSession<T: Transport> {
    bus: T,
    name: &'static str,
    layout: NorLayout,
    slot: Slot,
}

impl<T: Transport> NorSession<T> {
    /// Bind a session to a transport, board layout and image slot
    pub fn new(bus: T, name: &'static str, layout: NorLayout, slot: Slot) -> Self {
        Self {
            bus,
            name,
            layout,
            slot,
        }
    }

    /// Base flash address of the bound slot
    pub fn base(&self) -> u32 {
        self.layout.base(self.slot)
    }

    fn erase_span(&mut self, len: usize, progress: &mut dyn ProgressSink) -> Result<()> {
        let sectors = len.div_ceil(SECTOR_SIZE);
        info!(
            "erasing {} sectors at 0x{:06X} ({})",
            sectors,
            self.base(),
            self.name
        );
        progress.begin("erase", sectors as u64);
        for i in 0..sectors {
            let addr = self.base() + (i * SECTOR_SIZE) as u32;
            nor::sector_erase(&mut self.bus, addr).map_err(|e| {
                error!("sector erase at 0x{:06X} failed: {}", addr, e);
                e
            })?;
            progress.advance(i as u64 + 1);
        }
        progress.finish();
        Ok(())
    }

    fn program_span(&mut self, data: &[u8], progress: &mut dyn ProgressSink) -> Result<()> {
        info!("programming {} bytes at 0x{:06X}", data.len(), self.base());
        progress.begin("program", data.len() as u64);
        for (i, page) in data.chunks(PAGE_SIZE).enumerate() {
            let addr = self.base() + (i * PAGE_SIZE) as u32;
            nor::page_program(&mut self.bus, addr, page).map_err(|e| {
                error!("page program at 0x{:06X} failed: {}", addr, e);
                e
            })?;
            progress.advance((i * PAGE_SIZE + page.len()) as u64);
        }
        progress.finish();
        Ok(())
    }

    fn verify_span(&mut self, data: &[u8], progress: &mut dyn ProgressSink) -> Result<()> {
        info!("verifying {} bytes at 0x{:06X}", data.len(), self.base());
        progress.begin("verify", data.len() as u64);
        let mut buf = [0u8; PAGE_SIZE];
        for (i, chunk) in data.chunks(PAGE_SIZE).enumerate() {
            let addr = self.base() + (i * PAGE_SIZE) as u32;
            let got = &mut buf[..chunk.len()];
            nor::read(&mut self.bus, addr, got)?;
            if let Some(off) = got.iter().zip(chunk.iter()).position(|(a, b)| a != b) {
                let fail_addr = addr + off as u32;
                error!(
                    "verify mismatch at 0x{:08X}: expected 0x{:02X}, got 0x{:02X}",
                    fail_addr, chunk[off], got[off]
                );
                return Err(Error::NorVerifyMismatch {
                    addr: fail_addr,
                    expected: chunk[off],
                    actual: got[off],
                });
            }
            progress.advance((i * PAGE_SIZE + chunk.len()) as u64);
        }
        progress.finish();
        Ok(())
    }

    fn check_range(&self, sector: Sector, start: u32, count: u32) -> Result<()> {
        let limit = match sector {
            Sector::Cfg => self.layout.max_image / PAGE_SIZE as u32,
            // A flash slot has no UFM region
            Sector::Ufm => 0,
        };
        let end = start.saturating_add(count);
        if end > limit {
            return Err(Error::PageRangeExceeded {
                sector,
                page: end.saturating_sub(1),
                limit,
            });
        }
        Ok(())
    }

    fn image_bytes<'a>(&self, image: &'a ImageData) -> Result<&'a [u8]> {
        match image {
            ImageData::Raw(raw) => Ok(raw.data()),
            ImageData::Jedec(_) => Err(Error::ImageKindMismatch),
        }
    }
}

impl<T: Transport> IspTarget for NorSession<T> {
    fn info(&self) -> TargetInfo {
        TargetInfo {
            family: TargetFamily::Nor,
            device: format!(
                "{} {:?} slot @ 0x{:06X}",
                self.name,
                self.slot,
                self.base()
            ),
            page_size: PAGE_SIZE,
            cfg_pages: self.layout.max_image / PAGE_SIZE as u32,
            ufm_pages: 0,
            max_image: self.layout.max_image as usize,
        }
    }

    fn program(
        &mut self,
        image: &ImageData,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let data = self.image_bytes(image)?;
        if options.intersects(ProgramOptions::UFM | ProgramOptions::FEATURE_ROW) {
            debug!("flash slots have no UFM or feature row, ignoring those bits");
        }
        self.erase_span(data.len(), progress)?;
        self.program_span(data, progress)?;
        if options.contains(ProgramOptions::VERIFY) {
            self.verify_span(data, progress)?;
        }
        Ok(())
    }

    fn verify(&mut self, image: &ImageData, progress: &mut dyn ProgressSink) -> Result<()> {
        let data = self.image_bytes(image)?;
        self.verify_span(data, progress)
    }

    fn clear(&mut self) -> Result<()> {
        let len = self.layout.max_image as usize;
        self.erase_span(len, &mut crate::progress::NoProgress)
    }

    fn read_back(&mut self, sector: Sector, start_page: u32, count: u32) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.check_range(sector, start_page, count)?;
        let mut out = vec![0u8; count as usize * PAGE_SIZE];
        let start = self.base() + start_page * PAGE_SIZE as u32;
        for (i, chunk) in out.chunks_mut(PAGE_SIZE).enumerate() {
            nor::read(&mut self.bus, start + (i * PAGE_SIZE) as u32, chunk)?;
        }
        Ok(out)
    }

    fn write_raw(&mut self, sector: Sector, start_page: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let count = data.len().div_ceil(PAGE_SIZE) as u32;
        self.check_range(sector, start_page, count)?;
        let start = self.base() + start_page * PAGE_SIZE as u32;
        for (i, chunk) in data.chunks(PAGE_SIZE).enumerate() {
            // Pad a partial final page with the erased value
            let mut page = [0xFFu8; PAGE_SIZE];
            page[..chunk.len()].copy_from_slice(chunk);
            nor::page_program(&mut self.bus, start + (i * PAGE_SIZE) as u32, &page)?;
        }
        Ok(())
    }

    fn status(&mut self) -> Result<StatusReport> {
        let sr = nor::read_status(&mut self.bus)?;
        let busy = sr & nor::opcodes::SR_WIP != 0;
        Ok(StatusReport {
            raw: sr as u32,
            busy,
            done: !busy,
            fail: false,
            detail: format!(
                "SR1=0x{:02X} (wip={} wel={})",
                sr,
                busy as u8,
                (sr & nor::opcodes::SR_WEL != 0) as u8
            ),
        })
    }

    fn probe(&mut self) -> Result<ProbeReport> {
        let id = nor::read_id(&mut self.bus)?;
        Ok(ProbeReport {
            idcode: ((id[0] as u32) << 16) | ((id[1] as u32) << 8) | id[2] as u32,
            device: None,
            user_code: None,
            trace_id: None,
        })
    }
}
