//! modemlib-core: Core traits, types, and error definitions for modemlib.
//!
//! This crate defines the modem-agnostic abstractions the rest of the
//! workspace builds on. Applications depend on these types without pulling
//! in a specific serial port implementation.
//!
//! # Key types
//!
//! - [`Transport`] -- blocking byte-level communication channel
//! - [`SmsRecord`], [`SmsLookup`], [`DateTime`], [`SignalQuality`] -- typed payloads
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod helpers;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use modemlib_core::*`.
pub use error::{Error, Result};
pub use helpers::{describe_signal, signal_bars};
pub use transport::Transport;
pub use types::*;
