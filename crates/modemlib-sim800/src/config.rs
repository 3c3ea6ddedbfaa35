//! SIM800 driver configuration.
//!
//! A [`ModemConfig`] captures everything the driver needs that is not the
//! transport itself: the board wiring (carried as data only, the driver
//! never touches GPIO), the serial speed, and the timing budgets for every
//! kind of wait.
//!
//! | Setting                | Default |
//! |------------------------|---------|
//! | receive pin            | 3       |
//! | transmit pin           | 4       |
//! | reset pin              | 5       |
//! | baud rate              | 9600    |
//! | response timeout       | 1000 ms |
//! | response attempts      | 2       |
//! | quiescence window      | 20 ms   |
//! | poll interval          | 1 ms    |
//! | buffer capacity        | 512     |
//! | SMS timeout            | 60 s    |
//! | signal threshold       | 10      |
//! | signal attempts        | 20      |
//! | signal poll interval   | 1 s     |

use std::time::Duration;

use modemlib_text_io::io::IoConfig;
use modemlib_text_io::protocol::DEFAULT_BUFFER_CAPACITY;

/// Default receive pin on the host board.
pub const DEFAULT_RX_PIN: u8 = 3;
/// Default transmit pin on the host board.
pub const DEFAULT_TX_PIN: u8 = 4;
/// Default reset pin on the host board.
pub const DEFAULT_RESET_PIN: u8 = 5;
/// Factory baud rate of the SIM800 UART.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Complete configuration for a [`Sim800`](crate::modem::Sim800).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemConfig {
    /// Host pin wired to the modem's TX line.
    pub rx_pin: u8,
    /// Host pin wired to the modem's RX line.
    pub tx_pin: u8,
    /// Host pin wired to the modem's reset line.
    pub reset_pin: u8,
    /// Serial speed.
    pub baud_rate: u32,
    /// Per-attempt timeout of ordinary waits.
    pub response_timeout: Duration,
    /// Read cycles per ordinary wait.
    pub response_attempts: u32,
    /// Idle gap that ends one reply chunk.
    pub quiescence: Duration,
    /// Sleep between empty polls.
    pub poll_interval: Duration,
    /// Capacity of the response ring buffer, in bytes.
    pub buffer_capacity: usize,
    /// How long to wait for the network to accept an SMS after Ctrl-Z.
    pub sms_timeout: Duration,
    /// Lowest `+CSQ` value [`wait_signal`](crate::modem::Sim800::wait_signal)
    /// accepts.
    pub signal_threshold: u8,
    /// Signal polls before `wait_signal` gives up.
    pub signal_attempts: u32,
    /// Pause between signal polls.
    pub signal_poll_interval: Duration,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            rx_pin: DEFAULT_RX_PIN,
            tx_pin: DEFAULT_TX_PIN,
            reset_pin: DEFAULT_RESET_PIN,
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout: Duration::from_millis(1000),
            response_attempts: 2,
            quiescence: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            sms_timeout: Duration::from_secs(60),
            signal_threshold: 10,
            signal_attempts: 20,
            signal_poll_interval: Duration::from_secs(1),
        }
    }
}

impl ModemConfig {
    /// Defaults with custom receive and transmit pins.
    pub fn with_pins(rx_pin: u8, tx_pin: u8) -> Self {
        ModemConfig {
            rx_pin,
            tx_pin,
            ..Default::default()
        }
    }

    /// Defaults with custom pins and baud rate.
    pub fn with_pins_and_baud(rx_pin: u8, tx_pin: u8, baud_rate: u32) -> Self {
        ModemConfig {
            baud_rate,
            ..Self::with_pins(rx_pin, tx_pin)
        }
    }

    /// The subset of settings the IO engine needs.
    pub fn io_config(&self) -> IoConfig {
        IoConfig {
            response_timeout: self.response_timeout,
            response_attempts: self.response_attempts,
            quiescence: self.quiescence,
            poll_interval: self.poll_interval,
            buffer_capacity: self.buffer_capacity,
        }
    }
}
