//! Error types for cpldprog-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::device::{FeatureRow, Sector, ECA_PAGE_SIZE};

/// Bus-level transfer failures, as reported by a [`Transport`](crate::transport::Transport)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Device did not acknowledge the transaction (I2C NACK or CS fault)
    NoAck,
    /// Bus transaction did not complete in time
    BusTimeout,
    /// Fewer bytes were transferred than requested
    ShortTransfer {
        /// Bytes requested
        expected: usize,
        /// Bytes actually transferred
        got: usize,
    },
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// Bus transfer failed
    Transport(TransportError),

    // Protocol errors
    /// Command requires the configuration interface to be open
    NotInConfigMode,
    /// Busy bit did not clear within the polling budget
    BusyTimeout,
    /// Erase did not complete within the device's erase budget
    EraseTimeout,
    /// Status register FAIL bit set after an operation
    FailBitSet {
        /// Flash-check code from the status register (bits 21:19)
        code: u8,
    },
    /// Device ID readback does not match any supported part
    UnsupportedDevice {
        /// IDCODE read from the device
        idcode: u32,
    },
    /// Page index out of range for the sector
    PageRangeExceeded {
        /// Sector being addressed
        sector: Sector,
        /// First out-of-range page index
        page: u32,
        /// Number of pages the sector actually has
        limit: u32,
    },
    /// Image declares a different device than the session is bound to
    DeviceIdMismatch,

    // Verify errors
    /// Configuration page readback differs from the image
    CfgVerifyMismatch {
        /// Page index that failed
        page: u32,
        /// Offset of the first differing byte within the page
        offset: u8,
        /// Page contents the image expects
        expected: [u8; ECA_PAGE_SIZE],
        /// Page contents read from the device
        actual: [u8; ECA_PAGE_SIZE],
    },
    /// UFM page readback differs from the image
    UfmVerifyMismatch {
        /// Page index that failed
        page: u32,
        /// Offset of the first differing byte within the page
        offset: u8,
        /// Page contents the image expects
        expected: [u8; ECA_PAGE_SIZE],
        /// Page contents read from the device
        actual: [u8; ECA_PAGE_SIZE],
    },
    /// Feature-row readback differs from the image
    FeatureRowVerifyMismatch {
        /// Feature row the image expects
        expected: FeatureRow,
        /// Feature row read from the device
        actual: FeatureRow,
    },
    /// NOR flash readback differs from the image
    NorVerifyMismatch {
        /// Absolute flash address of the first differing byte
        addr: u32,
        /// Byte the image expects
        expected: u8,
        /// Byte read from the device
        actual: u8,
    },

    // Image errors
    /// Fuse file does not start with the STX framing byte, or a device
    /// name appears after fuse data has already been accumulated
    MalformedHeader,
    /// Feature-row field is truncated or malformed
    MalformedFeatureRow,
    /// Image exceeds the backend's maximum size
    ImageTooLarge {
        /// Image size in bytes
        size: usize,
        /// Backend maximum in bytes
        max: usize,
    },
    /// Image format does not match the target backend (e.g. a raw binary
    /// handed to a JEDEC-programmed part)
    ImageKindMismatch,

    // Session errors
    /// Opening the configuration interface failed
    ConfigOpenFailed,
    /// Programming a configuration page failed
    CfgWriteFailed {
        /// Page index that failed
        page: u32,
    },
    /// Programming a UFM page failed
    UfmWriteFailed {
        /// Page index that failed
        page: u32,
    },
    /// Programming the feature row failed
    FeatureRowWriteFailed,
    /// Final DONE/usercode programming failed
    FinalizeFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAck => write!(f, "device did not acknowledge"),
            Self::BusTimeout => write!(f, "bus transaction timed out"),
            Self::ShortTransfer { expected, got } => {
                write!(f, "short transfer: expected {} bytes, got {}", expected, got)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::NotInConfigMode => write!(f, "configuration interface is not open"),
            Self::BusyTimeout => write!(f, "device busy bit did not clear in time"),
            Self::EraseTimeout => write!(f, "erase did not complete in time"),
            Self::FailBitSet { code } => {
                write!(f, "status FAIL bit set (flash check: {})", flash_check_name(*code))
            }
            Self::UnsupportedDevice { idcode } => {
                write!(f, "unsupported device (IDCODE 0x{:08X})", idcode)
            }
            Self::PageRangeExceeded { sector, page, limit } => {
                write!(f, "page {} out of range for {} sector ({} pages)", page, sector, limit)
            }
            Self::DeviceIdMismatch => write!(f, "image device does not match the target device"),
            Self::CfgVerifyMismatch { page, offset, expected, actual } => {
                write!(
                    f,
                    "Cfg verify mismatch at page {} offset {}: expected 0x{:02X}, got 0x{:02X}",
                    page, offset, expected[*offset as usize], actual[*offset as usize]
                )
            }
            Self::UfmVerifyMismatch { page, offset, expected, actual } => {
                write!(
                    f,
                    "UFM verify mismatch at page {} offset {}: expected 0x{:02X}, got 0x{:02X}",
                    page, offset, expected[*offset as usize], actual[*offset as usize]
                )
            }
            Self::FeatureRowVerifyMismatch { .. } => write!(f, "feature row verify mismatch"),
            Self::NorVerifyMismatch { addr, expected, actual } => {
                write!(
                    f,
                    "verify mismatch at 0x{:08X}: expected 0x{:02X}, got 0x{:02X}",
                    addr, expected, actual
                )
            }
            Self::MalformedHeader => write!(f, "malformed fuse file header"),
            Self::MalformedFeatureRow => write!(f, "malformed or truncated feature row field"),
            Self::ImageTooLarge { size, max } => {
                write!(f, "image size {} exceeds backend maximum {}", size, max)
            }
            Self::ImageKindMismatch => {
                write!(f, "image format does not match the target backend")
            }
            Self::ConfigOpenFailed => write!(f, "failed to open the configuration interface"),
            Self::CfgWriteFailed { page } => write!(f, "Cfg page write failed at page {}", page),
            Self::UfmWriteFailed { page } => write!(f, "UFM page write failed at page {}", page),
            Self::FeatureRowWriteFailed => write!(f, "feature row write failed"),
            Self::FinalizeFailed => write!(f, "final DONE programming failed"),
        }
    }
}

/// Decode the flash-check code from status register bits 21:19
pub fn flash_check_name(code: u8) -> &'static str {
    match code {
        0 => "No Error",
        1 => "ID Error",
        2 => "CMD Error",
        3 => "CRC Error",
        4 => "Preamble Error",
        5 => "Abort Error",
        6 => "Overflow Error",
        7 => "SDM EOF",
        _ => "Unknown",
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
