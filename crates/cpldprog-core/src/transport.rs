//! Bus transport abstraction
//!
//! A [`Transport`] moves command frames between the host and the
//! configuration engine. The protocol layers above it never see bus
//! details: an I2C adapter issues a write followed by a repeated-start
//! read, an SPI adapter clocks the response out while chip select is
//! held, and both present the same `send_receive` shape here.

use crate::error::TransportError;

/// A synchronous, blocking command/response channel to one device
pub trait Transport {
    /// Send `tx`, then read `rx.len()` response bytes within the same
    /// bus transaction
    ///
    /// An empty `rx` makes this a plain write. Implementations must not
    /// release the device between the command and its response (I2C uses
    /// a repeated start, SPI keeps chip select asserted).
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError>;

    /// Block for at least `us` microseconds
    ///
    /// Flash state machines need settle time after certain commands; the
    /// bounded waits in the protocol layer are built on this.
    fn delay_us(&mut self, us: u32);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        (**self).send_receive(tx, rx)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(feature = "alloc")]
impl<T: Transport + ?Sized> Transport for alloc::boxed::Box<T> {
    fn send_receive(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), TransportError> {
        (**self).send_receive(tx, rx)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Convenience: send a command that has no response bytes
pub(crate) fn send<T: Transport + ?Sized>(t: &mut T, tx: &[u8]) -> Result<(), TransportError> {
    t.send_receive(tx, &mut [])
}
