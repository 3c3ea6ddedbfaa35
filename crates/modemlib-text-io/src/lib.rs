//! Line-oriented AT command IO for modemlib drivers.
//!
//! This crate holds the command/response machinery shared by every AT
//! modem driver. A single [`io::ModemIo`] owns the transport exclusively
//! and runs one blocking exchange at a time: frame and send a command,
//! collect reply chunks, and match them against expected tokens within a
//! bounded number of read cycles.
//!
//! # Architecture
//!
//! - [`protocol`] -- command framing, wire constants, error-line detection,
//!   and the bounded [`ResponseBuffer`](protocol::ResponseBuffer)
//! - [`io`] -- the polling reader and token matcher

pub mod io;
pub mod protocol;

pub use io::{IoConfig, Matched, ModemIo};
pub use protocol::{Command, ResponseBuffer};
