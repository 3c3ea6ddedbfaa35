//! modemlib-test-harness: Mock transports and a simulated modem for
//! testing modemlib drivers.
//!
//! This crate provides [`MockTransport`] for deterministic, scripted unit
//! tests of the IO engine and drivers without real hardware, and
//! [`SimulatedModem`] for stateful end-to-end tests against something that
//! behaves like a SIM800.

pub mod mock_modem;
pub mod mock_serial;

pub use mock_modem::{OutgoingSms, SimulatedModem, SimulatedModemHandle};
pub use mock_serial::{MockHandle, MockTransport};
