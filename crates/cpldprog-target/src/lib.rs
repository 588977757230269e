//! cpldprog-target - High-level target management
//!
//! This crate ties together the protocol core and the transport
//! backends, giving the CLI one entry point that resolves a target spec
//! string (or a platform/region pair) into a live, bound target.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │                CLI                  │
//! └──────────────────┬──────────────────┘
//!                    │ open_target("i2c:..." | "<platform>:region=N")
//! ┌──────────────────▼──────────────────┐
//! │           cpldprog-target           │
//! │  PlatformDb ──> registry ──> handle │
//! └───────┬──────────────────────┬──────┘
//!         │                      │
//! ┌───────▼────────┐   ┌─────────▼────────┐
//! │ cpldprog-core  │   │  backend crates  │
//! │ sessions,      │   │  linux-i2c,      │
//! │ images, wire   │   │  linux-spi,      │
//! │ protocol       │   │  dummy           │
//! └────────────────┘   └──────────────────┘
//! ```
//!
//! The [`TargetHandle`] returned by [`open_target`] owns the transport
//! and the session; callers never see the `Transport` trait or the
//! concrete session types.
//!
//! # Example
//!
//! ```ignore
//! use cpldprog_target::{open_target, PlatformDb};
//!
//! let db = PlatformDb::builtin()?;
//! let mut handle = open_target("demo", &db)?;
//! println!("bound to {}", handle.description());
//! println!("status: {}", handle.status()?.detail);
//! ```

mod handle;
mod platform;
mod registry;

pub use handle::TargetHandle;
pub use platform::{Platform, PlatformDb, PlatformDbError, RegionEntry};
pub use registry::{
    available_backends, backend_names_short, open_target, parse_target_params, BackendError,
    BackendInfo, TargetParams,
};

// Re-export the core types callers need alongside a handle
pub use cpldprog_core::device::{DeviceInfo, Sector, DEVICES};
pub use cpldprog_core::image::{jedec, raw, Image, ImageData};
pub use cpldprog_core::progress::{NoProgress, ProgressSink};
pub use cpldprog_core::session::ProgramOptions;
pub use cpldprog_core::target::{ProbeReport, StatusReport, TargetFamily, TargetInfo};
pub use cpldprog_core::{Error, Result};
