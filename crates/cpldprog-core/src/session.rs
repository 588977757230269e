//! Device session state machine for ECA-programmed parts
//!
//! Drives a full reprogramming run: open the configuration interface,
//! erase the requested sectors, program and verify them page by page,
//! program the feature row when allowed, then finalize with USERCODE and
//! DONE. Once an erase has started the sequence always runs to a terminal
//! state; on any mid-sequence failure the session closes the configuration
//! interface and issues a bypass before handing the original error back,
//! so the device is never left with the interface open.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error, info, warn};

use crate::device::{DeviceInfo, DeviceKind, Sector, ECA_PAGE_SIZE};
use crate::eca::{ConfigMode, Eca, EraseMask};
use crate::error::{Error, Result};
use crate::image::{Image, ImageData};
use crate::progress::ProgressSink;
use crate::target::{IspTarget, ProbeReport, StatusReport, TargetFamily, TargetInfo};
use crate::transport::Transport;

bitflags::bitflags! {
    /// What a program run touches and how the device is held while it runs
    ///
    /// The bit layout matches the caller-facing mode bitmap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProgramOptions: u8 {
        /// Erase and program the feature row
        const FEATURE_ROW = 0x02;
        /// Erase and program configuration flash
        const CFG = 0x04;
        /// Erase and program the UFM
        const UFM = 0x08;
        /// Keep user logic running during the run (offline otherwise)
        const TRANSPARENT = 0x10;
        /// Read back and compare after each programmed region
        const VERIFY = 0x20;
    }
}

/// Where a session currently stands in the program sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No operation in progress
    Idle,
    /// Configuration interface being opened
    ConfigOpen,
    /// Erase in progress
    Erasing,
    /// Writing configuration flash pages
    ProgrammingCfg,
    /// Comparing configuration flash pages
    VerifyingCfg,
    /// Writing UFM pages
    ProgrammingUfm,
    /// Comparing UFM pages
    VerifyingUfm,
    /// Writing the feature row
    ProgrammingFeatureRow,
    /// Comparing the feature row
    VerifyingFeatureRow,
    /// USERCODE/DONE programming
    Finalizing,
    /// Cleaning up after a failure
    Aborting,
}

/// A programming session bound to one ECA device
pub struct EcaSession<T: Transport> {
    eca: Eca<T>,
    phase: Phase,
}

impl<T: Transport> EcaSession<T> {
    /// Bind a session to a transport and a known part
    pub fn new(bus: T, device: &'static DeviceInfo) -> Self {
        Self {
            eca: Eca::new(bus, device),
            phase: Phase::Idle,
        }
    }

    /// The part this session is bound to
    pub fn device(&self) -> &'static DeviceInfo {
        self.eca.device()
    }

    /// Current position in the program sequence
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!("phase: {:?}", phase);
        self.phase = phase;
    }

    /// Erase, program and verify the sectors selected in `options`
    ///
    /// Transparent mode never touches the feature row: a run requesting
    /// both drops the feature row step with a warning and proceeds.
    pub fn program(
        &mut self,
        image: &Image,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        if image.device != self.device().kind {
            error!(
                "image targets {} but session is bound to {}",
                image.device,
                self.device().kind
            );
            return Err(Error::DeviceIdMismatch);
        }

        let mut options = options;
        if options.contains(ProgramOptions::TRANSPARENT)
            && options.contains(ProgramOptions::FEATURE_ROW)
        {
            warn!("transparent mode cannot touch the feature row, skipping it for this run");
            options.remove(ProgramOptions::FEATURE_ROW);
        }
        let mode = if options.contains(ProgramOptions::TRANSPARENT) {
            ConfigMode::Transparent
        } else {
            ConfigMode::Offline
        };

        info!(
            "programming {} (mode {:?}, sectors 0x{:02X})",
            self.device().name,
            mode,
            options.bits()
        );
        self.open(mode)?;
        match self.program_sequence(image, options, progress) {
            Ok(()) => self.finish(),
            Err(e) => {
                self.abort_cleanup();
                Err(e)
            }
        }
    }

    /// Compare device contents against `image` without writing anything
    ///
    /// Always checks configuration flash; UFM and the feature row are
    /// checked only when the image actually carries data for them.
    pub fn verify(&mut self, image: &Image, progress: &mut dyn ProgressSink) -> Result<()> {
        if image.device != self.device().kind {
            return Err(Error::DeviceIdMismatch);
        }
        self.open(ConfigMode::Transparent)?;
        match self.verify_sequence(image, progress) {
            Ok(()) => self.finish(),
            Err(e) => {
                self.abort_cleanup();
                Err(e)
            }
        }
    }

    /// Erase everything and reload, leaving a blank, consistent device
    ///
    /// Used to recover a part left half-programmed by a failed run. After
    /// the refresh the status register must report exactly DONE.
    pub fn clear(&mut self) -> Result<()> {
        info!("clearing {}", self.device().name);
        self.open(ConfigMode::Offline)?;
        match self.clear_sequence() {
            Ok(()) => {
                self.set_phase(Phase::Idle);
                Ok(())
            }
            Err(e) => {
                self.abort_cleanup();
                Err(e)
            }
        }
    }

    /// Read `count` pages starting at `start_page`
    pub fn read_back(&mut self, sector: Sector, start_page: u32, count: u32) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.check_range(sector, start_page, count)?;
        self.open(ConfigMode::Transparent)?;
        match self.read_back_sequence(sector, start_page, count) {
            Ok(data) => {
                self.finish()?;
                Ok(data)
            }
            Err(e) => {
                self.abort_cleanup();
                Err(e)
            }
        }
    }

    /// Write raw bytes starting at `start_page`; a partial final page is
    /// zero-padded (the erased state)
    ///
    /// The pages must already be erased. Page-write failures carry the
    /// absolute page index.
    pub fn write_raw(&mut self, sector: Sector, start_page: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let count = (data.len().div_ceil(ECA_PAGE_SIZE)) as u32;
        self.check_range(sector, start_page, count)?;
        self.open(ConfigMode::Transparent)?;
        match self.write_raw_sequence(sector, start_page, data) {
            Ok(()) => self.finish(),
            Err(e) => {
                self.abort_cleanup();
                Err(e)
            }
        }
    }

    /// Read and decode the status register and the busy flag
    pub fn status(&mut self) -> Result<StatusReport> {
        let sr = self.eca.read_status()?;
        let busy_flag = self.eca.read_busy()?;
        Ok(StatusReport {
            raw: sr.0,
            busy: sr.busy() || busy_flag,
            done: sr.done(),
            fail: sr.fail(),
            detail: format!("{}", sr),
        })
    }

    /// Read the device's identity registers
    pub fn probe(&mut self) -> Result<ProbeReport> {
        let idcode = self.eca.read_device_id()?;
        let device = DeviceKind::from_idcode(idcode).map(|k| String::from(k.info().name));
        let user_code = self.eca.read_user_code()?;
        let trace_id = self.eca.read_trace_id()?;
        Ok(ProbeReport {
            idcode,
            device,
            user_code: Some(user_code),
            trace_id: Some(trace_id),
        })
    }

    /// Read the IDCODE and fail unless it matches the bound part
    ///
    /// Run once at session construction by the backend registry, so a
    /// mis-wired bus address fails before anything is erased.
    pub fn check_device_id(&mut self) -> Result<()> {
        let idcode = self.eca.read_device_id()?;
        let expected = self.device().idcode;
        if idcode != expected {
            error!(
                "expected {} (IDCODE 0x{:08X}) but device reports 0x{:08X}",
                self.device().name,
                expected,
                idcode
            );
            return match DeviceKind::from_idcode(idcode) {
                Some(_) => Err(Error::DeviceIdMismatch),
                None => Err(Error::UnsupportedDevice { idcode }),
            };
        }
        debug!("device ID check passed (0x{:08X})", idcode);
        Ok(())
    }

    fn open(&mut self, mode: ConfigMode) -> Result<()> {
        self.set_phase(Phase::ConfigOpen);
        if let Err(e) = self.eca.open_config(mode) {
            error!("failed to open configuration interface: {}", e);
            self.set_phase(Phase::Idle);
            return Err(Error::ConfigOpenFailed);
        }
        Ok(())
    }

    fn program_sequence(
        &mut self,
        image: &Image,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.set_phase(Phase::Erasing);
        let mask = erase_mask(options);
        progress.begin("erase", 0);
        self.eca.erase(mask)?;
        progress.finish();

        if options.contains(ProgramOptions::CFG) {
            self.program_sector(Sector::Cfg, &image.cfg_data, progress)?;
            if options.contains(ProgramOptions::VERIFY) {
                self.verify_sector(Sector::Cfg, &image.cfg_data, progress)?;
            }
        }
        if options.contains(ProgramOptions::UFM) {
            self.program_sector(Sector::Ufm, &image.ufm_data, progress)?;
            if options.contains(ProgramOptions::VERIFY) {
                self.verify_sector(Sector::Ufm, &image.ufm_data, progress)?;
            }
        }
        if options.contains(ProgramOptions::FEATURE_ROW) {
            self.program_feature_row(image, options.contains(ProgramOptions::VERIFY))?;
        }

        self.set_phase(Phase::Finalizing);
        if image.user_code != 0 {
            self.eca.set_user_code(image.user_code).map_err(|e| {
                error!("USERCODE programming failed: {}", e);
                Error::FinalizeFailed
            })?;
        }
        self.eca.set_done().map_err(|e| {
            error!("DONE programming failed: {}", e);
            Error::FinalizeFailed
        })
    }

    fn verify_sequence(&mut self, image: &Image, progress: &mut dyn ProgressSink) -> Result<()> {
        self.verify_sector(Sector::Cfg, &image.cfg_data, progress)?;
        if !image.ufm_data.is_empty() {
            self.verify_sector(Sector::Ufm, &image.ufm_data, progress)?;
        }
        if !image.feature_row.is_blank() {
            self.set_phase(Phase::VerifyingFeatureRow);
            let actual = self.eca.read_feature_row()?;
            if actual != image.feature_row {
                return Err(Error::FeatureRowVerifyMismatch {
                    expected: image.feature_row,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn clear_sequence(&mut self) -> Result<()> {
        self.set_phase(Phase::Erasing);
        self.eca
            .erase(EraseMask::SRAM | EraseMask::FEATURE_ROW | EraseMask::CFG | EraseMask::UFM)?;
        self.set_phase(Phase::Finalizing);
        self.eca.refresh()?;
        let sr = self.eca.read_status()?;
        if sr.busy() {
            error!("device still busy after refresh: {}", sr);
            return Err(Error::EraseTimeout);
        }
        if !sr.refresh_ok() {
            error!("unexpected status after refresh: {}", sr);
            return Err(Error::FailBitSet {
                code: sr.flash_check(),
            });
        }
        info!("device cleared, status {}", sr);
        Ok(())
    }

    fn read_back_sequence(&mut self, sector: Sector, start: u32, count: u32) -> Result<Vec<u8>> {
        self.eca.set_page(sector, start)?;
        let mut out = Vec::with_capacity(count as usize * ECA_PAGE_SIZE);
        for _ in 0..count {
            out.extend_from_slice(&self.eca.read_page(sector)?);
        }
        Ok(out)
    }

    fn write_raw_sequence(&mut self, sector: Sector, start: u32, data: &[u8]) -> Result<()> {
        self.eca.set_page(sector, start)?;
        for (i, chunk) in data.chunks(ECA_PAGE_SIZE).enumerate() {
            let mut page = [0u8; ECA_PAGE_SIZE];
            page[..chunk.len()].copy_from_slice(chunk);
            self.eca.write_page(sector, &page).map_err(|e| {
                let index = start + i as u32;
                error!("{} page {} write failed: {}", sector, index, e);
                write_failed(sector, index)
            })?;
        }
        Ok(())
    }

    fn program_sector(
        &mut self,
        sector: Sector,
        data: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.set_phase(match sector {
            Sector::Cfg => Phase::ProgrammingCfg,
            Sector::Ufm => Phase::ProgrammingUfm,
        });
        let total = data.len() / ECA_PAGE_SIZE;
        info!("programming {} {} pages", total, sector);
        progress.begin(
            match sector {
                Sector::Cfg => "program cfg",
                Sector::Ufm => "program ufm",
            },
            total as u64,
        );
        self.eca
            .reset_address(sector)
            .map_err(|_| write_failed(sector, 0))?;
        for (i, chunk) in data.chunks_exact(ECA_PAGE_SIZE).enumerate() {
            let mut page = [0u8; ECA_PAGE_SIZE];
            page.copy_from_slice(chunk);
            self.eca.write_page(sector, &page).map_err(|e| {
                error!("{} page {} write failed: {}", sector, i, e);
                write_failed(sector, i as u32)
            })?;
            progress.advance(i as u64 + 1);
        }
        progress.finish();
        Ok(())
    }

    fn verify_sector(
        &mut self,
        sector: Sector,
        data: &[u8],
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.set_phase(match sector {
            Sector::Cfg => Phase::VerifyingCfg,
            Sector::Ufm => Phase::VerifyingUfm,
        });
        let total = data.len() / ECA_PAGE_SIZE;
        info!("verifying {} {} pages", total, sector);
        progress.begin(
            match sector {
                Sector::Cfg => "verify cfg",
                Sector::Ufm => "verify ufm",
            },
            total as u64,
        );
        self.eca.reset_address(sector)?;
        for (i, chunk) in data.chunks_exact(ECA_PAGE_SIZE).enumerate() {
            let actual = self.eca.read_page(sector)?;
            if actual != chunk {
                let mut expected = [0u8; ECA_PAGE_SIZE];
                expected.copy_from_slice(chunk);
                let offset = expected
                    .iter()
                    .zip(actual.iter())
                    .position(|(a, b)| a != b)
                    .unwrap_or(0) as u8;
                error!(
                    "{} verify mismatch at page {} offset {}: expected 0x{:02X}, got 0x{:02X}",
                    sector, i, offset, expected[offset as usize], actual[offset as usize]
                );
                return Err(match sector {
                    Sector::Cfg => Error::CfgVerifyMismatch {
                        page: i as u32,
                        offset,
                        expected,
                        actual,
                    },
                    Sector::Ufm => Error::UfmVerifyMismatch {
                        page: i as u32,
                        offset,
                        expected,
                        actual,
                    },
                });
            }
            progress.advance(i as u64 + 1);
        }
        progress.finish();
        Ok(())
    }

    fn program_feature_row(&mut self, image: &Image, verify: bool) -> Result<()> {
        self.set_phase(Phase::ProgrammingFeatureRow);
        info!("programming feature row");
        self.eca.write_feature_row(&image.feature_row).map_err(|e| {
            error!("feature row write failed: {}", e);
            Error::FeatureRowWriteFailed
        })?;
        if verify {
            self.set_phase(Phase::VerifyingFeatureRow);
            let actual = self.eca.read_feature_row()?;
            if actual != image.feature_row {
                error!("feature row verify mismatch");
                return Err(Error::FeatureRowVerifyMismatch {
                    expected: image.feature_row,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn check_range(&self, sector: Sector, start: u32, count: u32) -> Result<()> {
        let limit = self.device().page_count(sector);
        let end = start.saturating_add(count);
        if end > limit {
            return Err(Error::PageRangeExceeded {
                sector,
                page: end - 1,
                limit,
            });
        }
        Ok(())
    }

    /// Success-path teardown: close the interface, then bypass
    fn finish(&mut self) -> Result<()> {
        let closed = self.eca.close_config();
        if let Err(e) = self.eca.bypass() {
            warn!("bypass failed: {}", e);
        }
        self.set_phase(Phase::Idle);
        closed.map_err(|e| {
            error!("failed to close configuration interface: {}", e);
            e
        })
    }

    /// Failure-path teardown: best effort, never masks the original error
    fn abort_cleanup(&mut self) {
        self.set_phase(Phase::Aborting);
        if let Err(e) = self.eca.close_config() {
            warn!("cleanup: close_config failed: {}", e);
        }
        if let Err(e) = self.eca.bypass() {
            warn!("cleanup: bypass failed: {}", e);
        }
        self.set_phase(Phase::Idle);
    }
}

fn erase_mask(options: ProgramOptions) -> EraseMask {
    let mut mask = EraseMask::empty();
    if options.contains(ProgramOptions::CFG) {
        mask |= EraseMask::CFG;
    }
    if options.contains(ProgramOptions::UFM) {
        mask |= EraseMask::UFM;
    }
    if options.contains(ProgramOptions::FEATURE_ROW) {
        mask |= EraseMask::FEATURE_ROW;
    }
    mask
}

fn write_failed(sector: Sector, page: u32) -> Error {
    match sector {
        Sector::Cfg => Error::CfgWriteFailed { page },
        Sector::Ufm => Error::UfmWriteFailed { page },
    }
}

impl<T: Transport> IspTarget for EcaSession<T> {
    fn info(&self) -> TargetInfo {
        let dev = self.device();
        TargetInfo {
            family: TargetFamily::Eca,
            device: String::from(dev.name),
            page_size: ECA_PAGE_SIZE,
            cfg_pages: dev.cfg_pages,
            ufm_pages: dev.ufm_pages,
            max_image: dev.sector_bytes(Sector::Cfg) + dev.sector_bytes(Sector::Ufm),
        }
    }

    fn program(
        &mut self,
        image: &ImageData,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        match image {
            ImageData::Jedec(image) => self.program(image, options, progress),
            ImageData::Raw(_) => Err(Error::ImageKindMismatch),
        }
    }

    fn verify(&mut self, image: &ImageData, progress: &mut dyn ProgressSink) -> Result<()> {
        match image {
            ImageData::Jedec(image) => self.verify(image, progress),
            ImageData::Raw(_) => Err(Error::ImageKindMismatch),
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.clear()
    }

    fn read_back(&mut self, sector: Sector, start_page: u32, count: u32) -> Result<Vec<u8>> {
        self.read_back(sector, start_page, count)
    }

    fn write_raw(&mut self, sector: Sector, start_page: u32, data: &[u8]) -> Result<()> {
        self.write_raw(sector, start_page, data)
    }

    fn status(&mut self) -> Result<StatusReport> {
        self.status()
    }

    fn probe(&mut self) -> Result<ProbeReport> {
        self.probe()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::device::FeatureRow;
    use crate::progress::NoProgress;
    use crate::testutil::{MockEca, MockOp};
    use alloc::vec;

    fn cfg_image(kind: DeviceKind, pages: &[[u8; ECA_PAGE_SIZE]]) -> Image {
        let mut cfg_data = Vec::new();
        for p in pages {
            cfg_data.extend_from_slice(p);
        }
        Image {
            device: kind,
            cfg_data,
            ufm_data: Vec::new(),
            feature_row: FeatureRow::default(),
            user_code: 0,
            security_fuses: 0,
            page_count: pages.len() as u32,
        }
    }

    fn session(mock: &mut MockEca) -> EcaSession<&mut MockEca> {
        let device = mock.device;
        EcaSession::new(mock, device)
    }

    #[test]
    fn program_and_verify_two_cfg_pages() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let image = cfg_image(
            DeviceKind::MachXo2_1200,
            &[[0x11; ECA_PAGE_SIZE], [0x22; ECA_PAGE_SIZE]],
        );
        let mut s = session(&mut mock);
        s.program(
            &image,
            ProgramOptions::CFG | ProgramOptions::VERIFY,
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(s.phase(), Phase::Idle);
        drop(s);

        assert_eq!(
            mock.command_trace(),
            vec![
                MockOp::OpenOffline,
                MockOp::Erase(0x04),
                MockOp::ResetAddr(Sector::Cfg),
                MockOp::WritePage(Sector::Cfg),
                MockOp::WritePage(Sector::Cfg),
                MockOp::ResetAddr(Sector::Cfg),
                MockOp::ReadPage(Sector::Cfg),
                MockOp::ReadPage(Sector::Cfg),
                MockOp::SetDone,
                MockOp::CloseConfig,
                MockOp::Bypass,
            ]
        );
        assert_eq!(mock.cfg_page(0), &[0x11; ECA_PAGE_SIZE]);
        assert_eq!(mock.cfg_page(1), &[0x22; ECA_PAGE_SIZE]);
        assert!(mock.done);
        // The device identity is taken from the session binding; no ID
        // read may appear on the bus during a program run
        assert_eq!(mock.count(MockOp::ReadId), 0);
    }

    #[test]
    fn verify_mismatch_reports_page_and_contents() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        mock.cfg_read_override = Some((1, [0x99; ECA_PAGE_SIZE]));
        let image = cfg_image(
            DeviceKind::MachXo2_1200,
            &[[0x11; ECA_PAGE_SIZE], [0x22; ECA_PAGE_SIZE]],
        );
        let mut s = session(&mut mock);
        let err = s
            .program(
                &image,
                ProgramOptions::CFG | ProgramOptions::VERIFY,
                &mut NoProgress,
            )
            .unwrap_err();
        drop(s);

        assert_eq!(
            err,
            Error::CfgVerifyMismatch {
                page: 1,
                offset: 0,
                expected: [0x22; ECA_PAGE_SIZE],
                actual: [0x99; ECA_PAGE_SIZE],
            }
        );
        assert_eq!(mock.count(MockOp::CloseConfig), 1);
        assert_eq!(mock.count(MockOp::Bypass), 1);
        assert_eq!(mock.count(MockOp::SetDone), 0);
    }

    #[test]
    fn nack_mid_program_aborts_with_cleanup() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        mock.fail_cfg_write_at = Some(2);
        let pages = [[0xABu8; ECA_PAGE_SIZE]; 10];
        let image = cfg_image(DeviceKind::MachXo2_1200, &pages);
        let mut s = session(&mut mock);
        let err = s
            .program(&image, ProgramOptions::CFG, &mut NoProgress)
            .unwrap_err();
        assert_eq!(s.phase(), Phase::Idle);
        drop(s);

        assert_eq!(err, Error::CfgWriteFailed { page: 2 });
        assert_eq!(mock.count(MockOp::CloseConfig), 1);
        assert_eq!(mock.count(MockOp::Bypass), 1);
        // The failed write was the last thing sent to flash
        assert_eq!(mock.count(MockOp::WritePage(Sector::Cfg)), 3);
    }

    #[test]
    fn clear_erases_everything_and_refreshes() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_640);
        mock.cfg[0] = 0xFF;
        mock.ufm[0] = 0xFF;
        let mut s = session(&mut mock);
        s.clear().unwrap();
        drop(s);

        assert_eq!(mock.count(MockOp::OpenOffline), 1);
        assert_eq!(mock.count(MockOp::Erase(0x0F)), 1);
        assert_eq!(mock.count(MockOp::Refresh), 1);
        assert!(mock.cfg.iter().all(|&b| b == 0));
        assert!(mock.ufm.iter().all(|&b| b == 0));
        assert!(mock.done);
    }

    #[test]
    fn clear_fails_when_device_stays_busy_after_refresh() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        mock.busy_after_refresh = true;
        let mut s = session(&mut mock);
        assert_eq!(s.clear(), Err(Error::EraseTimeout));
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn transparent_mode_skips_feature_row_and_still_succeeds() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut image = cfg_image(DeviceKind::MachXo2_1200, &[[0x42; ECA_PAGE_SIZE]]);
        image.feature_row = FeatureRow {
            feature: [0xAA; 8],
            feabits: [0x01, 0x20],
        };
        let mut s = session(&mut mock);
        s.program(
            &image,
            ProgramOptions::TRANSPARENT
                | ProgramOptions::CFG
                | ProgramOptions::FEATURE_ROW
                | ProgramOptions::VERIFY,
            &mut NoProgress,
        )
        .unwrap();
        drop(s);

        assert_eq!(mock.command_trace()[0], MockOp::OpenTransparent);
        // The erase mask on the wire never carries the feature row bit
        assert_eq!(mock.count(MockOp::Erase(0x04)), 1);
        assert_eq!(mock.count(MockOp::WriteFeature), 0);
        assert_eq!(mock.count(MockOp::WriteFeabits), 0);
        assert!(mock.feature.is_blank());
    }

    #[test]
    fn offline_mode_programs_and_verifies_feature_row() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_2000);
        let mut image = cfg_image(DeviceKind::MachXo2_2000, &[[0x42; ECA_PAGE_SIZE]]);
        image.feature_row = FeatureRow {
            feature: [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0],
            feabits: [0x06, 0x20],
        };
        let mut s = session(&mut mock);
        s.program(
            &image,
            ProgramOptions::CFG | ProgramOptions::FEATURE_ROW | ProgramOptions::VERIFY,
            &mut NoProgress,
        )
        .unwrap();
        drop(s);

        assert_eq!(mock.count(MockOp::Erase(0x06)), 1);
        assert_eq!(mock.count(MockOp::WriteFeature), 1);
        assert_eq!(mock.count(MockOp::WriteFeabits), 1);
        assert_eq!(mock.feature, image.feature_row);
    }

    #[test]
    fn image_for_wrong_part_is_rejected_before_any_bus_traffic() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let image = cfg_image(DeviceKind::MachXo2_640, &[[0u8; ECA_PAGE_SIZE]]);
        let mut s = session(&mut mock);
        assert_eq!(
            s.program(&image, ProgramOptions::CFG, &mut NoProgress),
            Err(Error::DeviceIdMismatch)
        );
        drop(s);
        assert!(mock.ops.is_empty());
    }

    #[test]
    fn nonzero_user_code_is_programmed_during_finalize() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut image = cfg_image(DeviceKind::MachXo2_1200, &[[0x01; ECA_PAGE_SIZE]]);
        image.user_code = 0xCAFE_BABE;
        let mut s = session(&mut mock);
        s.program(&image, ProgramOptions::CFG, &mut NoProgress)
            .unwrap();
        drop(s);

        assert_eq!(mock.count(MockOp::SetUserCode(0xCAFE_BABE)), 1);
        assert_eq!(mock.user_code, 0xCAFE_BABE);
    }

    #[test]
    fn ufm_pages_program_and_verify() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut image = cfg_image(DeviceKind::MachXo2_1200, &[[0x10; ECA_PAGE_SIZE]]);
        image.ufm_data = vec![0x77; 2 * ECA_PAGE_SIZE];
        let mut s = session(&mut mock);
        s.program(
            &image,
            ProgramOptions::CFG | ProgramOptions::UFM | ProgramOptions::VERIFY,
            &mut NoProgress,
        )
        .unwrap();
        drop(s);

        assert_eq!(mock.count(MockOp::Erase(0x0C)), 1);
        assert_eq!(mock.ufm_page(0), &[0x77; ECA_PAGE_SIZE]);
        assert_eq!(mock.ufm_page(1), &[0x77; ECA_PAGE_SIZE]);
    }

    #[test]
    fn read_back_range_check_fails_before_opening_config() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let ufm_pages = mock.device.ufm_pages;
        let mut s = session(&mut mock);
        assert_eq!(
            s.read_back(Sector::Ufm, ufm_pages - 1, 2),
            Err(Error::PageRangeExceeded {
                sector: Sector::Ufm,
                page: ufm_pages,
                limit: ufm_pages,
            })
        );
        drop(s);
        assert!(mock.ops.is_empty());
    }

    #[test]
    fn write_raw_then_read_back_roundtrips_with_padding() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let mut s = session(&mut mock);
        let data: Vec<u8> = (0u8..20).collect();
        s.write_raw(Sector::Ufm, 3, &data).unwrap();
        let back = s.read_back(Sector::Ufm, 3, 2).unwrap();
        assert_eq!(&back[..20], &data[..]);
        assert!(back[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn standalone_verify_detects_corruption() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        let image = cfg_image(DeviceKind::MachXo2_1200, &[[0x5A; ECA_PAGE_SIZE]]);
        let mut s = session(&mut mock);
        s.program(&image, ProgramOptions::CFG, &mut NoProgress)
            .unwrap();
        s.verify(&image, &mut NoProgress).unwrap();
        drop(s);

        mock.cfg[7] = 0x00;
        let mut s = session(&mut mock);
        let err = s.verify(&image, &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            Error::CfgVerifyMismatch {
                page: 0,
                offset: 7,
                ..
            }
        ));
    }

    #[test]
    fn config_open_failure_reports_without_cleanup() {
        let mut mock = MockEca::new(DeviceKind::MachXo2_1200);
        mock.status_fail = true;
        let image = cfg_image(DeviceKind::MachXo2_1200, &[[0u8; ECA_PAGE_SIZE]]);
        let mut s = session(&mut mock);
        assert_eq!(
            s.program(&image, ProgramOptions::CFG, &mut NoProgress),
            Err(Error::ConfigOpenFailed)
        );
        drop(s);
        assert_eq!(mock.count(MockOp::CloseConfig), 0);
        assert_eq!(mock.count(MockOp::Bypass), 0);
    }
}
