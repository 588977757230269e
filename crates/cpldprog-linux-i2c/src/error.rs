//! Error types for Linux I2C operations

use thiserror::Error;

/// Linux I2C specific errors
#[derive(Debug, Error)]
pub enum LinuxI2cError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// I2C transfer failed
    #[error("I2C transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Fewer messages completed than were queued
    #[error("I2C transfer incomplete: {completed} of {queued} messages")]
    Incomplete { completed: usize, queued: usize },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Bus device not specified
    #[error("No bus specified. Use bus=/dev/i2c-N")]
    NoBus,

    /// Slave address not specified
    #[error("No slave address specified. Use addr=0xNN")]
    NoAddress,

    /// Slave address outside the 7-bit range
    #[error("Slave address 0x{addr:02X} outside the 7-bit range 0x08..=0x77")]
    AddressOutOfRange { addr: u16 },
}

/// Result type for Linux I2C operations
pub type Result<T> = std::result::Result<T, LinuxI2cError>;
