//! Configuration images
//!
//! Two input formats exist: JEDEC ASCII fuse-maps for the ECA-programmed
//! Lattice parts, and raw flash binaries for the NOR-backed FPGAs. Both
//! parse/validate fully before any hardware is touched; a session never
//! sees a partial image.

pub mod jedec;
pub mod raw;

use alloc::vec::Vec;

use crate::device::{DeviceKind, FeatureRow, ECA_PAGE_SIZE};

/// A parsed JEDEC fuse-map, split into the regions the device exposes
///
/// Immutable once parsed; sessions borrow it for the duration of a
/// program or verify run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Part the fuse file targets
    pub device: DeviceKind,
    /// Configuration flash contents, a multiple of the page size
    pub cfg_data: Vec<u8>,
    /// UFM contents, a multiple of the page size (may be empty)
    pub ufm_data: Vec<u8>,
    /// Feature row contents (all zero when the file carries no E field)
    pub feature_row: FeatureRow,
    /// USERCODE (0 when the file carries no U field)
    pub user_code: u32,
    /// Security fuse setting from the G field
    pub security_fuses: u32,
    /// Total number of 16-byte pages parsed from the file
    pub page_count: u32,
}

impl Image {
    /// Number of configuration flash pages in the image
    pub fn cfg_page_count(&self) -> u32 {
        (self.cfg_data.len() / ECA_PAGE_SIZE) as u32
    }

    /// Number of UFM pages in the image
    pub fn ufm_page_count(&self) -> u32 {
        (self.ufm_data.len() / ECA_PAGE_SIZE) as u32
    }
}

/// An image in whichever format the target consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// JEDEC fuse-map for ECA-programmed parts
    Jedec(Image),
    /// Raw binary for NOR-backed parts
    Raw(raw::RawImage),
}
