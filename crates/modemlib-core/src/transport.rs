//! Transport trait for modem communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a modem. An
//! implementation exists for host serial ports (`modemlib-transport`), plus
//! mock transports for testing (`modemlib-test-harness`).
//!
//! The response reader in `modemlib-text-io` polls a `Transport` one byte
//! at a time rather than talking to a serial port directly, which enables
//! both real hardware control and deterministic unit testing.

use crate::error::Result;

/// Blocking byte-level transport to a modem.
///
/// The interface mirrors what a UART driver offers: write a buffer, ask how
/// many bytes are waiting, and pop one byte. None of the methods should
/// block for longer than it takes to move bytes already in flight; waiting
/// for the modem is the caller's job.
pub trait Transport: Send {
    /// Write raw bytes to the modem.
    ///
    /// Implementations should return once all bytes have been handed to the
    /// underlying link (serial TX buffer, mock log, ...).
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Pop one received byte, or `None` if nothing is waiting right now.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Number of received bytes that can be read without waiting.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Close the transport.
    ///
    /// After calling `close()`, subsequent calls should return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
