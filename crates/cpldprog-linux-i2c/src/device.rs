//! Linux I2C device implementation
//!
//! This module provides the `LinuxI2c` struct that implements the
//! `Transport` trait using Linux's i2c-dev interface. Command/response
//! pairs are issued as one `I2C_RDWR` multi-message transfer, so the
//! read phase follows the write phase under a repeated start with no
//! stop condition in between - the configuration engine drops its
//! response otherwise.

use crate::error::{LinuxI2cError, Result};

use cpldprog_core::error::TransportError;
use cpldprog_core::transport::Transport;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Read flag for an I2C message
const I2C_M_RD: u16 = 0x0001;

/// Plain I2C transfer capability bit from I2C_FUNCS
const I2C_FUNC_I2C: libc::c_ulong = 0x0000_0001;

/// Linux i2c-dev ioctl constants
mod ioctl {
    use nix::{ioctl_read_bad, ioctl_write_ptr_bad};

    /// Combined write/read transfer ioctl
    const I2C_RDWR: libc::c_ulong = 0x0707;

    /// Adapter functionality query ioctl
    const I2C_FUNCS: libc::c_ulong = 0x0705;

    ioctl_write_ptr_bad!(i2c_rdwr, I2C_RDWR, super::I2cRdwrIoctlData);
    ioctl_read_bad!(i2c_funcs, I2C_FUNCS, libc::c_ulong);
}

/// One message of an I2C_RDWR transfer
/// This must match the kernel's struct i2c_msg layout
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct I2cMsg {
    addr: u16,     // __u16 addr
    flags: u16,    // __u16 flags
    len: u16,      // __u16 len
    buf: *mut u8,  // __u8 *buf
}

/// Argument block for the I2C_RDWR ioctl
/// This must match the kernel's struct i2c_rdwr_ioctl_data layout
#[repr(C)]
#[derive(Debug)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg, // struct i2c_msg *msgs
    nmsgs: u32,        // __u32 nmsgs
}

/// Configuration for opening a Linux I2C device
#[derive(Debug, Clone)]
pub struct LinuxI2cConfig {
    /// Bus device path (e.g., "/dev/i2c-2")
    pub bus: String,
    /// 7-bit slave address
    pub address: u16,
}

impl LinuxI2cConfig {
    /// Create a new configuration with the given bus path and address
    pub fn new(bus: impl Into<String>, address: u16) -> Self {
        Self {
            bus: bus.into(),
            address,
        }
    }
}

/// Linux I2C transport using the i2c-dev interface
///
/// This struct implements the `Transport` trait for Linux systems using
/// the `/dev/i2c-N` device interface.
pub struct LinuxI2c {
    /// File handle for the bus device
    file: File,
    /// Bound 7-bit slave address
    address: u16,
}

impl LinuxI2c {
    /// Open a Linux I2C bus with the given configuration
    pub fn open(config: &LinuxI2cConfig) -> Result<Self> {
        if config.bus.is_empty() {
            return Err(LinuxI2cError::NoBus);
        }
        if !(0x08..=0x77).contains(&config.address) {
            return Err(LinuxI2cError::AddressOutOfRange {
                addr: config.address,
            });
        }

        log::debug!("linux_i2c: Opening bus {}", config.bus);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.bus)
            .map_err(|e| LinuxI2cError::OpenFailed {
                path: config.bus.clone(),
                source: e,
            })?;

        // SMBus-only adapters cannot issue the combined transfers the
        // configuration engine needs; refuse them up front.
        let mut funcs: libc::c_ulong = 0;
        match unsafe { ioctl::i2c_funcs(file.as_raw_fd(), &mut funcs) } {
            Ok(_) if funcs & I2C_FUNC_I2C == 0 => {
                return Err(LinuxI2cError::InvalidParameter(format!(
                    "{} does not support plain I2C transfers",
                    config.bus
                )));
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("linux_i2c: I2C_FUNCS query failed on {}: {}", config.bus, e);
            }
        }

        log::info!(
            "linux_i2c: Opened {} (slave 0x{:02X})",
            config.bus,
            config.address
        );

        Ok(Self {
            file,
            address: config.address,
        })
    }

    /// Open a bus with default settings
    pub fn open_device(bus: &str, address: u16) -> Result<Self> {
        Self::open(&LinuxI2cConfig::new(bus, address))
    }

    /// Bound slave address
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Perform one combined write/read transfer
    ///
    /// Queues a write message and, when `rx` is non-empty, a read
    /// message in the same I2C_RDWR call. The kernel issues a repeated
    /// start between them.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let fd = self.file.as_raw_fd();

        if tx.is_empty() {
            return Err(LinuxI2cError::InvalidParameter(
                "Command bytes cannot be empty".into(),
            ));
        }

        let mut msgs = [
            I2cMsg {
                addr: self.address,
                flags: 0,
                len: tx.len() as u16,
                buf: tx.as_ptr() as *mut u8,
            },
            I2cMsg {
                addr: self.address,
                flags: I2C_M_RD,
                len: rx.len() as u16,
                buf: rx.as_mut_ptr(),
            },
        ];
        let nmsgs: u32 = if rx.is_empty() { 1 } else { 2 };

        let data = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs,
        };

        let ret = unsafe { ioctl::i2c_rdwr(fd, &data) }
            .map_err(|e| LinuxI2cError::TransferFailed(std::io::Error::from_raw_os_error(e as i32)))?;

        if ret as u32 != nmsgs {
            return Err(LinuxI2cError::Incomplete {
                completed: ret as usize,
                queued: nmsgs as usize,
            });
        }

        Ok(())
    }
}

impl Transport for LinuxI2c {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> std::result::Result<(), TransportError> {
        self.transfer(tx, rx).map_err(|e| {
            log::error!("linux_i2c: {}", e);
            match &e {
                LinuxI2cError::TransferFailed(io) => match io.raw_os_error() {
                    Some(code) if code == libc::ETIMEDOUT || code == libc::EAGAIN => {
                        TransportError::BusTimeout
                    }
                    _ => TransportError::NoAck,
                },
                LinuxI2cError::Incomplete { completed, queued } => TransportError::ShortTransfer {
                    expected: *queued,
                    got: *completed,
                },
                _ => TransportError::NoAck,
            }
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Parse backend options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxI2cConfig, LinuxI2cError> {
    let mut bus = String::new();
    let mut address: Option<u16> = None;

    for (key, value) in options {
        match *key {
            "bus" | "dev" => {
                bus = value.to_string();
            }
            "addr" => {
                let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
                    u16::from_str_radix(hex, 16)
                } else {
                    value.parse()
                };
                address = Some(parsed.map_err(|_| {
                    LinuxI2cError::InvalidParameter(format!("Invalid addr value: {}", value))
                })?);
            }
            _ => {
                log::warn!("linux_i2c: Unknown option: {}={}", key, value);
            }
        }
    }

    if bus.is_empty() {
        return Err(LinuxI2cError::NoBus);
    }
    let address = address.ok_or(LinuxI2cError::NoAddress)?;
    if !(0x08..=0x77).contains(&address) {
        return Err(LinuxI2cError::AddressOutOfRange { addr: address });
    }

    Ok(LinuxI2cConfig { bus, address })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options_full() {
        let config = parse_options(&[("bus", "/dev/i2c-2"), ("addr", "0x40")]).unwrap();
        assert_eq!(config.bus, "/dev/i2c-2");
        assert_eq!(config.address, 0x40);
    }

    #[test]
    fn parse_options_decimal_addr() {
        let config = parse_options(&[("bus", "/dev/i2c-0"), ("addr", "64")]).unwrap();
        assert_eq!(config.address, 0x40);
    }

    #[test]
    fn parse_options_missing_bus() {
        assert!(matches!(
            parse_options(&[("addr", "0x40")]),
            Err(LinuxI2cError::NoBus)
        ));
    }

    #[test]
    fn parse_options_missing_addr() {
        assert!(matches!(
            parse_options(&[("bus", "/dev/i2c-2")]),
            Err(LinuxI2cError::NoAddress)
        ));
    }

    #[test]
    fn parse_options_addr_range() {
        assert!(matches!(
            parse_options(&[("bus", "/dev/i2c-2"), ("addr", "0x7F")]),
            Err(LinuxI2cError::AddressOutOfRange { addr: 0x7F })
        ));
    }
}
