//! TargetHandle - unified abstraction over device session + transport
//!
//! A handle owns one bound target (ECA session or NOR session, with its
//! transport inside) behind the [`IspTarget`] trait, so the CLI never
//! needs to know which protocol family or bus it is talking to.

use cpldprog_core::device::Sector;
use cpldprog_core::image::ImageData;
use cpldprog_core::progress::ProgressSink;
use cpldprog_core::session::ProgramOptions;
use cpldprog_core::target::{IspTarget, ProbeReport, StatusReport, TargetInfo};
use cpldprog_core::Result;

/// Unified programming handle
///
/// The handle owns the target (which owns the transport); dropping it
/// releases the bus. Exactly one operation runs at a time - the
/// device's internal addressing state is not reentrant.
pub struct TargetHandle {
    /// The underlying target (type-erased, owned)
    target: Box<dyn IspTarget>,
    /// Where this handle came from, for log lines and error context
    description: String,
}

impl core::fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TargetHandle")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl TargetHandle {
    /// Create a new handle around a boxed target
    pub(crate) fn new(target: Box<dyn IspTarget>, description: String) -> Self {
        Self {
            target,
            description,
        }
    }

    /// Replace the description, for when a platform lookup resolved the
    /// spec and the platform/region wording reads better than the raw
    /// backend string
    pub(crate) fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    /// Human-readable origin of the handle, e.g.
    /// `"i2c /dev/i2c-2 @0x40 (LCMXO2-2000)"` or
    /// `"clx-48c8d region 1: fan CPLD"`
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Describe the bound device
    pub fn info(&self) -> TargetInfo {
        self.target.info()
    }

    /// Erase, program and verify per `options`
    pub fn program(
        &mut self,
        image: &ImageData,
        options: ProgramOptions,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        self.target.program(image, options, progress)
    }

    /// Compare device contents against `image` without writing
    pub fn verify(&mut self, image: &ImageData, progress: &mut dyn ProgressSink) -> Result<()> {
        self.target.verify(image, progress)
    }

    /// Erase the device back to a blank, consistent state
    pub fn clear(&mut self) -> Result<()> {
        self.target.clear()
    }

    /// Read `count` pages starting at `start_page`
    pub fn read_back(&mut self, sector: Sector, start_page: u32, count: u32) -> Result<Vec<u8>> {
        self.target.read_back(sector, start_page, count)
    }

    /// Write raw bytes starting at `start_page`
    pub fn write_raw(&mut self, sector: Sector, start_page: u32, data: &[u8]) -> Result<()> {
        self.target.write_raw(sector, start_page, data)
    }

    /// Read the device's status register(s)
    pub fn status(&mut self) -> Result<StatusReport> {
        self.target.status()
    }

    /// Read the device's identity registers
    pub fn probe(&mut self) -> Result<ProbeReport> {
        self.target.probe()
    }

    /// Get mutable access to the underlying target
    ///
    /// For callers that need the trait object itself, e.g. to pass into
    /// generic helpers taking `&mut dyn IspTarget`.
    pub fn as_target_mut(&mut self) -> &mut dyn IspTarget {
        self.target.as_mut()
    }
}
