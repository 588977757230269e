//! Linux i2c-dev transport backend
//!
//! This crate provides I2C bus access through the Linux i2c-dev
//! userspace interface (`/dev/i2c-N`), for CPLDs whose configuration
//! port sits directly on a management I2C bus.
//!
//! # Overview
//!
//! Every configuration command is a write followed by an optional read
//! from the same slave address. Both are queued in a single `I2C_RDWR`
//! ioctl so the kernel issues a repeated start between them; splitting
//! the pair into separate write() and read() calls would put a stop
//! condition on the bus and the device would abort the command.
//!
//! # Usage
//!
//! ```no_run
//! use cpldprog_linux_i2c::{LinuxI2c, LinuxI2cConfig};
//!
//! let config = LinuxI2cConfig::new("/dev/i2c-2", 0x40);
//! let bus = LinuxI2c::open(&config).unwrap();
//! ```
//!
//! # System Requirements
//!
//! - The `i2c-dev` kernel module must be loaded
//! - The user needs read/write permission on the bus device node
//! - The adapter must support plain I2C transfers (not SMBus-only)

pub mod device;
pub mod error;

pub use device::{parse_options, LinuxI2c, LinuxI2cConfig};
pub use error::LinuxI2cError;
