//! Serial port transport for modem communication.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for the UART link to a SIM800-class modem, either a
//! USB-to-serial adapter or a board's hardware UART.
//!
//! SIM800 modules ship auto-bauding and lock on to the first `AT` they see;
//! 9600 baud 8N1 without flow control is the conventional setting.
//!
//! # Example
//!
//! ```no_run
//! use modemlib_transport::SerialTransport;
//! use modemlib_core::transport::Transport;
//!
//! # fn example() -> modemlib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600)?;
//! transport.write(b"AT\r")?;
//! while let Some(byte) = transport.read_byte()? {
//!     print!("{}", byte as char);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use modemlib_core::error::{Error, Result};
use modemlib_core::transport::Transport;
use serialport::SerialPort;

/// Read timeout handed to the OS driver. Reads are only issued once
/// `bytes_to_read` reports data, so this only bounds a misbehaving driver.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Line settings for the modem UART.
///
/// The default is what a stock SIM800 expects: 9600 baud, 8N1, no flow
/// control, DTR low.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed. SIM800 auto-bauds between 1200 and 115200.
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Flow control (RTS/CTS only if the board wires it)
    pub flow_control: FlowControl,
    /// Drive DTR high after opening. With `AT+CSCLK=1` a high DTR lets the
    /// modem enter sleep.
    pub assert_dtr: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            assert_dtr: false,
        }
    }
}

/// Character size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Handshaking between host and modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// A modem reached through a host serial port.
pub struct SerialTransport {
    /// The underlying serial port, `None` once closed.
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    /// Bytes pulled from the driver but not yet handed out.
    rx: VecDeque<u8>,
}

fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

impl SerialTransport {
    /// Open `port` (e.g. `/dev/ttyUSB0` or `COM3`) at `baud_rate`, 8N1.
    pub fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config)
    }

    /// Open `port` with explicit line settings.
    ///
    /// ```no_run
    /// # use modemlib_transport::{SerialTransport, SerialConfig, FlowControl};
    /// # fn example() -> modemlib_core::Result<()> {
    /// let settings = SerialConfig {
    ///     baud_rate: 115_200,
    ///     flow_control: FlowControl::Hardware,
    ///     assert_dtr: true,
    ///     ..Default::default()
    /// };
    /// let transport = SerialTransport::open_with_config("/dev/ttyS1", settings)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(port, settings = ?config, "opening modem UART");

        let mut serial = serialport::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| {
                tracing::error!(port, error = %e, "cannot open modem UART");
                Error::Transport(format!("cannot open {port}: {e}"))
            })?;

        if let Err(e) = serial.write_data_terminal_ready(config.assert_dtr) {
            tracing::warn!(port, error = %e, "cannot drive DTR");
        }

        tracing::info!(port, baud_rate = config.baud_rate, "modem UART open");

        Ok(Self {
            port: Some(serial),
            port_name: port.to_string(),
            rx: VecDeque::new(),
        })
    }

    /// The path this transport was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Move whatever the driver has buffered into `rx`.
    fn fill(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        let pending = port
            .bytes_to_read()
            .map_err(|e| Error::Transport(format!("{}: {}", self.port_name, e)))?;
        if pending == 0 {
            return Ok(());
        }

        let mut buf = vec![0u8; pending as usize];
        match port.read(&mut buf) {
            Ok(n) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "rx"
                );
                self.rx.extend(&buf[..n]);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(()),
            Err(e) => {
                tracing::error!(port = %self.port_name, error = %e, "read failed");
                Err(map_io_error(e))
            }
        }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "tx"
        );

        port.write_all(data).map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "write failed");
            map_io_error(e)
        })?;

        port.flush().map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "flush failed");
            Error::Io(e)
        })
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.rx.is_empty() {
            self.fill()?;
        }
        Ok(self.rx.pop_front())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.fill()?;
        Ok(self.rx.len())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                tracing::warn!(port = %self.port_name, error = %e, "flush on close failed");
            }
            let unread = self.rx.len();
            self.rx.clear();
            tracing::info!(port = %self.port_name, unread, "modem UART closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
