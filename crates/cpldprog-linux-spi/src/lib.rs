//! Linux spidev transport backend
//!
//! This crate provides SPI bus access through the Linux spidev
//! userspace interface (`/dev/spidevX.Y`). It serves two kinds of
//! target: Lattice parts whose configuration port is wired to SPI
//! instead of I2C, and the NOR flash that Xilinx and Anlogic FPGAs
//! load themselves from.
//!
//! # Overview
//!
//! Every command is a write phase followed by an optional read phase.
//! Both phases go out as one SPI_IOC_MESSAGE call with chip select
//! held across them; releasing CS between the command bytes and the
//! response would terminate the command on the device side.
//!
//! # Usage
//!
//! ```no_run
//! use cpldprog_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0").with_speed(1_000_000);
//! let bus = LinuxSpi::open(&config).unwrap();
//! ```
//!
//! # System Requirements
//!
//! - The `spidev` kernel driver must expose the bus (`/dev/spidevX.Y`)
//! - The user needs read/write permission on the device node
//! - The kernel spidev buffer must hold at least one 260-byte frame
//!   (the default 4096 is plenty)

pub mod device;
pub mod error;

pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::LinuxSpiError;
