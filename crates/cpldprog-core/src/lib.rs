//! cpldprog-core - Core library for CPLD/FPGA in-system programming
//!
//! This crate drives programmable logic devices through their documented
//! erase/program/verify/finalize protocols: Lattice MachXO2/XO3LF parts
//! via the embedded configuration engine (over I2C or SPI), and the
//! NOR-flash-backed FPGAs via standard SPI flash commands. It is designed
//! to be `no_std` compatible so the same protocol code can run in hosted
//! tools and embedded environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation for images, sessions and targets
//!
//! # Example
//!
//! ```ignore
//! use cpldprog_core::device::DeviceKind;
//! use cpldprog_core::image::jedec;
//! use cpldprog_core::progress::NoProgress;
//! use cpldprog_core::session::{EcaSession, ProgramOptions};
//!
//! fn reprogram<T: cpldprog_core::transport::Transport>(bus: T, fuse_file: &[u8]) {
//!     let image = jedec::parse(fuse_file).unwrap();
//!     let mut session = EcaSession::new(bus, image.device.info());
//!     match session.program(
//!         &image,
//!         ProgramOptions::CFG | ProgramOptions::VERIFY,
//!         &mut NoProgress,
//!     ) {
//!         Ok(()) => println!("programmed {}", image.device),
//!         Err(e) => println!("programming failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod device;
pub mod eca;
pub mod error;
#[cfg(feature = "alloc")]
pub mod image;
pub mod nor;
pub mod progress;
#[cfg(feature = "alloc")]
pub mod session;
#[cfg(feature = "alloc")]
pub mod target;
pub mod transport;

#[cfg(all(test, feature = "std"))]
pub(crate) mod testutil;

pub use error::{Error, Result};
