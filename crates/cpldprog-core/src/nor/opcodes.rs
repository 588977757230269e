//! SPI NOR flash command opcodes
//!
//! The small command set shared by the flashes that back the SPI-attached
//! FPGAs: 3-byte addressing, 256-byte page program, 64 KiB sector erase.

// ============================================================
// Read
// ============================================================

/// Read data bytes
pub const READ: u8 = 0x03;

/// Read the JEDEC manufacturer/device ID
pub const RDID: u8 = 0x9F;

/// Read status register 1
pub const RDSR: u8 = 0x05;

// ============================================================
// Write
// ============================================================

/// Set the write-enable latch
pub const WREN: u8 = 0x06;

/// Program up to one 256-byte page
pub const PAGE_PROGRAM: u8 = 0x02;

// ============================================================
// Erase
// ============================================================

/// Erase one 64 KiB sector
pub const SECTOR_ERASE: u8 = 0xD8;

/// Erase the whole chip
pub const BULK_ERASE: u8 = 0xC7;

// ============================================================
// Status register bits
// ============================================================

/// Write in progress
pub const SR_WIP: u8 = 0x01;

/// Write-enable latch
pub const SR_WEL: u8 = 0x02;
