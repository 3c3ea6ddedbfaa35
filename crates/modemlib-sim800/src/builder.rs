//! Sim800Builder -- fluent builder for constructing [`Sim800`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, board wiring, and timing budgets before the
//! transport is opened.
//!
//! # Example
//!
//! ```no_run
//! use modemlib_sim800::builder::Sim800Builder;
//! use std::time::Duration;
//!
//! # fn example() -> modemlib_core::Result<()> {
//! let mut modem = Sim800Builder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(9600)
//!     .response_timeout(Duration::from_millis(500))
//!     .build()?;
//! let quality = modem.wait_signal()?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use modemlib_core::error::{Error, Result};
use modemlib_core::transport::Transport;

use crate::config::ModemConfig;
use crate::modem::Sim800;

/// Fluent builder for [`Sim800`].
///
/// Every setting starts at its [`ModemConfig::default`] value, so the
/// simplest usage is:
///
/// ```ignore
/// let modem = Sim800Builder::new().serial_port("/dev/ttyS0").build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Sim800Builder {
    config: ModemConfig,
    serial_port: Option<String>,
}

impl Sim800Builder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ModemConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Set the serial speed (default: 9600).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.config.baud_rate = baud;
        self
    }

    /// Record the receive and transmit pins of the host board.
    pub fn pins(mut self, rx_pin: u8, tx_pin: u8) -> Self {
        self.config.rx_pin = rx_pin;
        self.config.tx_pin = tx_pin;
        self
    }

    /// Record the reset pin of the host board.
    pub fn reset_pin(mut self, pin: u8) -> Self {
        self.config.reset_pin = pin;
        self
    }

    /// Per-attempt timeout of ordinary waits (default: 1000ms).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Read cycles per ordinary wait (default: 2).
    pub fn response_attempts(mut self, attempts: u32) -> Self {
        self.config.response_attempts = attempts;
        self
    }

    /// Idle gap that ends a reply chunk (default: 20ms).
    pub fn quiescence(mut self, window: Duration) -> Self {
        self.config.quiescence = window;
        self
    }

    /// Sleep between empty polls (default: 1ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Response buffer capacity in bytes (default: 512).
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// How long to wait for the network to accept an SMS (default: 60s).
    pub fn sms_timeout(mut self, timeout: Duration) -> Self {
        self.config.sms_timeout = timeout;
        self
    }

    /// Lowest acceptable `+CSQ` value for `wait_signal` (default: 10).
    pub fn signal_threshold(mut self, threshold: u8) -> Self {
        self.config.signal_threshold = threshold;
        self
    }

    /// Polls `wait_signal` makes before giving up (default: 20).
    pub fn signal_attempts(mut self, attempts: u32) -> Self {
        self.config.signal_attempts = attempts;
        self
    }

    /// Pause between `wait_signal` polls (default: 1s).
    pub fn signal_poll_interval(mut self, interval: Duration) -> Self {
        self.config.signal_poll_interval = interval;
        self
    }

    /// Build a [`Sim800`] with a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a
    /// `MockTransport` or `SimulatedModem` from `modemlib-test-harness`)
    /// and for callers that manage the transport lifecycle directly.
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Sim800> {
        if self.config.buffer_capacity == 0 {
            return Err(Error::InvalidParameter(
                "buffer_capacity must be at least 1".into(),
            ));
        }
        if self.config.response_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "response_timeout must be non-zero".into(),
            ));
        }
        Ok(Sim800::new(transport, self.config))
    }

    /// Build a [`Sim800`] on a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub fn build(self) -> Result<Sim800> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = modemlib_transport::SerialTransport::open(port, self.config.baud_rate)?;
        self.build_with_transport(Box::new(transport))
    }
}
