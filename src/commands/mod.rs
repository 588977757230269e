//! CLI command implementations
//!
//! Every command here takes an open [`TargetHandle`](cpldprog_target::TargetHandle)
//! and drives it through the family-independent target operations, so the
//! same code serves Lattice ECA parts and FPGA boot NOR flash.
//!
//! Long operations report progress through the `progress` module, which
//! bridges the core's callbacks onto indicatif bars.

pub mod erase;
mod list;
pub mod probe;
pub mod program;
mod progress;
pub mod read;
pub mod status;
pub mod verify;
pub mod write_raw;

pub use list::{list_devices, list_targets};
