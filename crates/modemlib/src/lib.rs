//! # modemlib -- Blocking AT Command Driver for Cellular Modems
//!
//! `modemlib` drives SIM800-class GSM modems over a serial line using the
//! text-mode AT command set. It is built for small gateways and data
//! loggers that need to send and read SMS, check signal strength, and read
//! the network clock without an async runtime.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! modemlib = "0.1"
//! ```
//!
//! Open the modem and send a message:
//!
//! ```no_run
//! use modemlib::sim800::Sim800Builder;
//!
//! fn main() -> modemlib::Result<()> {
//!     let mut modem = Sim800Builder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .baud_rate(9600)
//!         .build()?;
//!
//!     modem.ping()?;
//!     let quality = modem.wait_signal()?;
//!     println!("signal: {}", modemlib::describe_signal(quality));
//!     modem.send_sms("+15551234567", "hello from the field")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                  | Purpose                                          |
//! |------------------------|--------------------------------------------------|
//! | `modemlib-core`        | [`Transport`] trait, value types, errors         |
//! | `modemlib-transport`   | Serial port transport                            |
//! | `modemlib-text-io`     | Command framing, response buffer, token waits    |
//! | `modemlib-sim800`      | SIM800 command set and driver                    |
//! | **`modemlib`**         | This facade crate -- re-exports everything       |
//!
//! ## Feature Flags
//!
//! | Feature  | Enables                           | Default |
//! |----------|-----------------------------------|---------|
//! | `sim800` | [`sim800`] module (SIM800 driver) | yes     |

pub use modemlib_core::*;

/// Serial transport.
pub mod transport {
    pub use modemlib_transport::*;
}

/// Command framing and response waiting.
pub mod text_io {
    pub use modemlib_text_io::*;
}

/// SIM800 driver.
///
/// Provides [`Sim800`](sim800::Sim800) and
/// [`Sim800Builder`](sim800::Sim800Builder) for SMS, signal, clock and
/// power management over the SIM800 AT command set.
#[cfg(feature = "sim800")]
pub mod sim800 {
    pub use modemlib_sim800::*;
}
