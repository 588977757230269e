//! Caller-facing target abstraction
//!
//! Both device families end up behind this one trait: the ECA session for
//! Lattice parts and the NOR session for the SPI-attached FPGAs. The CLI
//! and the backend registry only ever see an [`IspTarget`].

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use core::fmt;

use crate::device::Sector;
use crate::error::Result;
use crate::image::ImageData;
use crate::progress::ProgressSink;
use crate::session::ProgramOptions;

/// Which protocol family a target speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFamily {
    /// Lattice embedded configuration engine (JEDEC images)
    Eca,
    /// SPI NOR flash behind an FPGA (raw binary images)
    Nor,
}

impl fmt::Display for TargetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eca => write!(f, "lattice-eca"),
            Self::Nor => write!(f, "spi-nor"),
        }
    }
}

/// Static description of a bound target
#[derive(Debug, Clone)]
pub struct TargetInfo {
    /// Protocol family
    pub family: TargetFamily,
    /// Human-readable device/region description
    pub device: String,
    /// Program page size in bytes
    pub page_size: usize,
    /// Pages in the main (configuration) region
    pub cfg_pages: u32,
    /// Pages in the UFM region (0 when absent)
    pub ufm_pages: u32,
    /// Largest image the target accepts, in bytes
    pub max_image: usize,
}

/// Decoded device status, normalized across families
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Raw register value as read
    pub raw: u32,
    /// An internal operation is in progress
    pub busy: bool,
    /// The device holds a valid image
    pub done: bool,
    /// The last operation failed
    pub fail: bool,
    /// Family-specific rendering of the full register
    pub detail: String,
}

/// Identity registers read by a probe
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// IDCODE / JEDEC ID as a 32-bit value
    pub idcode: u32,
    /// Resolved device name, when the ID is known
    pub device: Option<String>,
    /// USERCODE, on families that have one
    pub user_code: Option<u32>,
    /// Factory trace ID, on families that have one
    pub trace_id: Option<[u8; 8]>,
}

/// One programmable device, whatever its protocol family
pub trait IspTarget {
    /// Describe the bound device
    fn info(&self) -> TargetInfo;

    /// Erase, program and verify per `options`
    fn program(
        &mut self,
        image: &ImageData,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()>;

    /// Compare device contents against `image` without writing
    fn verify(&mut self, image: &ImageData, progress: &mut dyn ProgressSink) -> Result<()>;

    /// Erase the device back to a blank, consistent state
    fn clear(&mut self) -> Result<()>;

    /// Read `count` pages starting at `start_page`
    fn read_back(&mut self, sector: Sector, start_page: u32, count: u32) -> Result<Vec<u8>>;

    /// Write raw bytes starting at `start_page`
    fn write_raw(&mut self, sector: Sector, start_page: u32, data: &[u8]) -> Result<()>;

    /// Read the device's status register(s)
    fn status(&mut self) -> Result<StatusReport>;

    /// Read the device's identity registers
    fn probe(&mut self) -> Result<ProbeReport>;
}

impl<T: IspTarget + ?Sized> IspTarget for Box<T> {
    fn info(&self) -> TargetInfo {
        (**self).info()
    }

    fn program(
        &mut self,
        image: &ImageData,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        (**self).program(image, options, progress)
    }

    fn verify(&mut self, image: &ImageData, progress: &mut dyn ProgressSink) -> Result<()> {
        (**self).verify(image, progress)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn read_back(&mut self, sector: Sector, start_page: u32, count: u32) -> Result<Vec<u8>> {
        (**self).read_back(sector, start_page, count)
    }

    fn write_raw(&mut self, sector: Sector, start_page: u32, data: &[u8]) -> Result<()> {
        (**self).write_raw(sector, start_page, data)
    }

    fn status(&mut self) -> Result<StatusReport> {
        (**self).status()
    }

    fn probe(&mut self) -> Result<ProbeReport> {
        (**self).probe()
    }
}
