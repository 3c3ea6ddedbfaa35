//! Transport implementations for modemlib.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](modemlib_core::Transport) trait for the UART link to
//! a cellular modem.
//!
//! # Example
//!
//! ```no_run
//! use modemlib_transport::SerialTransport;
//! use modemlib_core::transport::Transport;
//!
//! # fn example() -> modemlib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600)?;
//! transport.write(b"AT+CSQ\r")?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
