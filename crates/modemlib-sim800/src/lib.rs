//! SIM800 AT command driver for modemlib.
//!
//! This crate implements the text-mode AT command set used by SIM800-family
//! GSM modems. It provides:
//!
//! - **Command builders and parsers** ([`commands`]) -- construct framed AT
//!   commands, validate SMS arguments, and parse `+CSQ`, `+CCLK` and
//!   `+CMGR` replies into typed values.
//! - **Configuration** ([`config`]) -- board wiring, serial speed, and the
//!   timing budget of every wait.
//! - **Sequences** ([`sequence`]) -- multi-command operations as named
//!   steps with visible partial progress.
//! - **Driver** ([`modem`]) -- the blocking [`Sim800`] transaction facade.
//! - **Builder** ([`builder`]) -- fluent builder API for constructing
//!   [`Sim800`] instances.
//!
//! # Example
//!
//! ```
//! use modemlib_sim800::commands::{cmd_signal_quality, parse_signal_response};
//!
//! // Build a "read signal quality" command
//! assert_eq!(cmd_signal_quality().frame(), b"AT+CSQ\r");
//!
//! // Parse the modem's answer
//! let quality = parse_signal_response("\r\n+CSQ: 18,0\r\n\r\nOK\r\n").unwrap();
//! assert_eq!(quality.to_dbm(), Some(-77));
//! ```

pub mod builder;
pub mod commands;
pub mod config;
pub mod modem;
pub mod sequence;

// Re-export the primary types for ergonomic `use modemlib_sim800::*`.
pub use builder::Sim800Builder;
pub use config::ModemConfig;
pub use modem::Sim800;
