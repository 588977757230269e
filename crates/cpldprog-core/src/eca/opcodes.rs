//! Embedded configuration engine command opcodes
//!
//! These are the single-byte commands accepted by the MachXO2/XO3LF
//! configuration logic. The same opcodes are used regardless of which
//! port carries them (I2C, SPI or JTAG); only the framing differs.

// ============================================================
// Identification
// ============================================================

/// Read the 32-bit device IDCODE
pub const READ_DEVICE_ID: u8 = 0xE0;

/// Read the 32-bit USERCODE
pub const READ_USERCODE: u8 = 0xC0;

/// Read the 64-bit factory trace ID
pub const READ_TRACE_ID: u8 = 0x19;

// ============================================================
// Configuration interface control
// ============================================================

/// Open the configuration interface in transparent mode
/// (user logic keeps running)
pub const ENABLE_CONFIG_TRANSPARENT: u8 = 0x74;

/// Open the configuration interface in offline mode
/// (user I/O is tri-stated until the next refresh)
pub const ENABLE_CONFIG_OFFLINE: u8 = 0xC6;

/// Close the configuration interface
pub const DISABLE_CONFIG: u8 = 0x26;

/// No-op / bypass, used to terminate a configuration session
pub const BYPASS: u8 = 0xFF;

/// Reload the device from configuration flash
pub const REFRESH: u8 = 0x79;

// ============================================================
// Erase
// ============================================================

/// Erase the sectors selected by the mode byte
pub const ERASE: u8 = 0x0E;

// ============================================================
// Flash addressing and page access
// ============================================================

/// Reset the configuration flash page address to 0
pub const RESET_CFG_ADDRESS: u8 = 0x46;

/// Reset the UFM page address to 0
pub const RESET_UFM_ADDRESS: u8 = 0x47;

/// Set the page address to an absolute value
pub const SET_PAGE_ADDRESS: u8 = 0xB4;

/// Program one 16-byte configuration flash page and advance the address
pub const PROGRAM_CFG_PAGE: u8 = 0x70;

/// Read configuration flash pages starting at the current address
pub const READ_CFG_PAGE: u8 = 0x73;

/// Program one 16-byte UFM page and advance the address
pub const PROGRAM_UFM_PAGE: u8 = 0xC9;

/// Read UFM pages starting at the current address
pub const READ_UFM_PAGE: u8 = 0xCA;

// ============================================================
// Feature row
// ============================================================

/// Program the 8-byte feature field
pub const PROGRAM_FEATURE: u8 = 0xE4;

/// Read the 8-byte feature field
pub const READ_FEATURE: u8 = 0xE7;

/// Program the 2-byte FEABITS field
pub const PROGRAM_FEABITS: u8 = 0xF8;

/// Read the 2-byte FEABITS field
pub const READ_FEABITS: u8 = 0xFB;

// ============================================================
// Finalize
// ============================================================

/// Program the 32-bit USERCODE
pub const PROGRAM_USERCODE: u8 = 0xC2;

/// Set the DONE bit, marking configuration flash valid
pub const PROGRAM_DONE: u8 = 0x5E;

// ============================================================
// Status
// ============================================================

/// Read the 32-bit status register
pub const READ_STATUS: u8 = 0x3C;

/// Read the 1-byte busy flag
pub const CHECK_BUSY: u8 = 0xF0;
