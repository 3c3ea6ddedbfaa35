//! A simulated SIM800 modem for end-to-end driver tests.
//!
//! [`SimulatedModem`] implements [`Transport`] and answers AT commands the
//! way a SIM800 does in verbose mode (`\r\n`-wrapped lines, final `OK` or
//! `ERROR`). It holds a small SMS store, a clock string, and a signal
//! reading, so drivers can be exercised against stateful behaviour rather
//! than a fixed script.
//!
//! Unlike [`MockTransport`](crate::MockTransport), the simulated modem does
//! not care about the order of commands. A custom responder can override
//! any line; returning `None` from it falls through to the built-in table.
//!
//! # Example
//!
//! ```
//! use modemlib_core::Transport;
//! use modemlib_test_harness::SimulatedModem;
//!
//! let mut modem = SimulatedModem::new().with_signal(18);
//! modem.write(b"AT+CSQ\r").unwrap();
//! let mut reply = Vec::new();
//! while let Some(b) = modem.read_byte().unwrap() {
//!     reply.push(b);
//! }
//! assert_eq!(reply, b"\r\n+CSQ: 18,0\r\n\r\nOK\r\n");
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use modemlib_core::error::{Error, Result};
use modemlib_core::transport::Transport;
use modemlib_core::types::SmsRecord;

/// Number of SMS slots in the simulated SIM storage.
pub const SMS_SLOTS: u16 = 30;

const CTRL_Z: u8 = 0x1A;
const ESC: u8 = 0x1B;

type Responder = Box<dyn FnMut(&str) -> Option<Vec<u8>> + Send>;

/// An SMS the simulated modem was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSms {
    pub number: String,
    pub body: String,
    pub reference: u8,
}

struct SimState {
    connected: bool,
    powered_down: bool,
    echo: bool,
    reply_delay: Duration,
    signal: u8,
    clock: String,
    storage: BTreeMap<u16, SmsRecord>,
    next_reference: u8,
    responder: Option<Responder>,
    /// Partial command line being assembled.
    line: Vec<u8>,
    /// Destination number while an SMS body is being collected.
    composing: Option<String>,
    body: Vec<u8>,
    output: VecDeque<(Instant, VecDeque<u8>)>,
    received_lines: Vec<String>,
    outbox: Vec<OutgoingSms>,
}

impl fmt::Debug for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimState")
            .field("connected", &self.connected)
            .field("powered_down", &self.powered_down)
            .field("signal", &self.signal)
            .field("clock", &self.clock)
            .field("stored", &self.storage.len())
            .field("composing", &self.composing)
            .finish_non_exhaustive()
    }
}

/// A stateful stand-in for a SIM800 on the other end of the serial line.
#[derive(Debug, Clone)]
pub struct SimulatedModem {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedModem {
    /// A powered-up modem with signal 18, an empty SMS store, and echo off.
    pub fn new() -> Self {
        SimulatedModem {
            state: Arc::new(Mutex::new(SimState {
                connected: true,
                powered_down: false,
                echo: false,
                reply_delay: Duration::ZERO,
                signal: 18,
                clock: "24/01/05,10:30:00+00".to_string(),
                storage: BTreeMap::new(),
                next_reference: 1,
                responder: None,
                line: Vec::new(),
                composing: None,
                body: Vec::new(),
                output: VecDeque::new(),
                received_lines: Vec::new(),
                outbox: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the `+CSQ` value the modem reports.
    pub fn with_signal(self, signal: u8) -> Self {
        self.lock().signal = signal;
        self
    }

    /// Set the `+CCLK` string (`yy/MM/dd,hh:mm:ss±zz`).
    pub fn with_clock(self, clock: &str) -> Self {
        self.lock().clock = clock.to_string();
        self
    }

    /// Delay every reply by `delay` after the command that triggered it.
    pub fn with_reply_delay(self, delay: Duration) -> Self {
        self.lock().reply_delay = delay;
        self
    }

    /// Echo input back before replying, as after `ATE1`: each command line,
    /// and each SMS body byte up to (not including) the Ctrl-Z.
    pub fn with_echo(self, echo: bool) -> Self {
        self.lock().echo = echo;
        self
    }

    /// Place a message in storage slot `index`.
    pub fn with_stored_sms(self, index: u16, record: SmsRecord) -> Self {
        self.lock().storage.insert(index, record);
        self
    }

    /// Install a responder consulted before the built-in table.
    ///
    /// The responder gets each complete command line without its
    /// terminator. Returning `Some(bytes)` sends those bytes as the reply;
    /// `None` falls through to the default behaviour.
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&str) -> Option<Vec<u8>> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
        self
    }

    /// A handle for inspecting the modem after it has been moved away.
    pub fn handle(&self) -> SimulatedModemHandle {
        SimulatedModemHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for SimulatedModem {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Command handling
// ---------------------------------------------------------------------------

fn info(line: &str) -> Vec<u8> {
    format!("\r\n{line}\r\n\r\nOK\r\n").into_bytes()
}

fn final_code(code: &str) -> Vec<u8> {
    format!("\r\n{code}\r\n").into_bytes()
}

fn cms_error(code: u16) -> Vec<u8> {
    final_code(&format!("+CMS ERROR: {code}"))
}

impl SimState {
    fn queue(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        let ready_at = Instant::now() + self.reply_delay;
        self.output.push_back((ready_at, bytes.into_iter().collect()));
    }

    fn accept(&mut self, data: &[u8]) {
        for &byte in data {
            if self.composing.is_some() {
                self.accept_body_byte(byte);
                continue;
            }
            match byte {
                b'\r' => {
                    let line = String::from_utf8_lossy(&self.line).trim().to_string();
                    self.line.clear();
                    if !line.is_empty() {
                        self.handle_line(&line);
                    }
                }
                b'\n' => {}
                other => self.line.push(other),
            }
        }
    }

    fn accept_body_byte(&mut self, byte: u8) {
        match byte {
            CTRL_Z => {
                let number = self.composing.take().unwrap_or_default();
                let body = String::from_utf8_lossy(&self.body).into_owned();
                self.body.clear();
                let reference = self.next_reference;
                self.next_reference = self.next_reference.wrapping_add(1);
                trace!(%number, reference, "simulated modem sent sms");
                self.outbox.push(OutgoingSms {
                    number,
                    body,
                    reference,
                });
                self.queue(info(&format!("+CMGS: {reference}")));
            }
            ESC => {
                self.composing = None;
                self.body.clear();
                self.queue(final_code("OK"));
            }
            other => {
                self.body.push(other);
                if self.echo {
                    self.queue(vec![other]);
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        trace!(line, "simulated modem received");
        self.received_lines.push(line.to_string());

        if self.echo {
            self.queue(format!("{line}\r").into_bytes());
        }

        if let Some(responder) = self.responder.as_mut() {
            if let Some(reply) = responder(line) {
                self.queue(reply);
                return;
            }
        }

        let reply = self.default_reply(line);
        self.queue(reply);
    }

    fn default_reply(&mut self, line: &str) -> Vec<u8> {
        let upper = line.to_ascii_uppercase();
        let Some(cmd) = upper.strip_prefix("AT") else {
            return final_code("ERROR");
        };

        match cmd {
            "" | "+CMGF=1" | "+CSCLK=2" | "&W" => final_code("OK"),
            "+CSQ" => info(&format!("+CSQ: {},0", self.signal)),
            "+CCLK?" => info(&format!("+CCLK: \"{}\"", self.clock)),
            "+CPOWD=1" => {
                self.powered_down = true;
                final_code("NORMAL POWER DOWN")
            }
            "+CFUN=1,1" => {
                self.powered_down = false;
                final_code("OK")
            }
            "+CMGD=1,4" => {
                self.storage.clear();
                final_code("OK")
            }
            _ => self.parameterised_reply(cmd, line),
        }
    }

    fn parameterised_reply(&mut self, cmd: &str, line: &str) -> Vec<u8> {
        if let Some(arg) = cmd.strip_prefix("+CFUN=") {
            return match arg {
                "0" | "1" | "4" => final_code("OK"),
                _ => final_code("ERROR"),
            };
        }
        if let Some(arg) = cmd
            .strip_prefix("+CLTS=")
            .or_else(|| cmd.strip_prefix("+CTZR="))
            .or_else(|| cmd.strip_prefix("+CNETLIGHT="))
        {
            return match arg {
                "0" | "1" => final_code("OK"),
                _ => final_code("ERROR"),
            };
        }
        if let Some(arg) = cmd.strip_prefix("+CMGR=") {
            return match slot(arg) {
                Some(index) => match self.storage.get_mut(&index) {
                    Some(record) => {
                        let reply = format!(
                            "\r\n+CMGR: \"{}\",\"{}\",\"\",\"{}\"\r\n{}\r\n\r\nOK\r\n",
                            record.status, record.sender, record.timestamp, record.body
                        );
                        if record.status == "REC UNREAD" {
                            record.status = "REC READ".to_string();
                        }
                        reply.into_bytes()
                    }
                    None => final_code("OK"),
                },
                None => cms_error(321),
            };
        }
        if let Some(arg) = cmd.strip_prefix("+CMGD=") {
            return match slot(arg) {
                Some(index) => {
                    self.storage.remove(&index);
                    final_code("OK")
                }
                None => cms_error(321),
            };
        }
        if cmd.starts_with("+CMGS=") {
            // Keep the number's original case and punctuation.
            let number = line
                .split_once('=')
                .map(|(_, n)| n.trim_matches('"').to_string())
                .unwrap_or_default();
            self.composing = Some(number);
            return b"\r\n> ".to_vec();
        }
        final_code("ERROR")
    }
}

fn slot(arg: &str) -> Option<u16> {
    arg.parse::<u16>()
        .ok()
        .filter(|index| (1..=SMS_SLOTS).contains(index))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

impl Transport for SimulatedModem {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        state.accept(data);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut state = self.lock();
        let now = Instant::now();
        let byte = match state.output.front_mut() {
            Some((ready_at, bytes)) if *ready_at <= now => bytes.pop_front(),
            _ => None,
        };
        while state.output.front().is_some_and(|(_, b)| b.is_empty()) {
            state.output.pop_front();
        }
        Ok(byte)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.lock();
        let now = Instant::now();
        Ok(state
            .output
            .iter()
            .take_while(|(ready_at, _)| *ready_at <= now)
            .map(|(_, b)| b.len())
            .sum())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connected = false;
        state.output.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

/// Inspection handle for a [`SimulatedModem`].
#[derive(Debug, Clone)]
pub struct SimulatedModemHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedModemHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every complete command line received, in order.
    pub fn received_lines(&self) -> Vec<String> {
        self.lock().received_lines.clone()
    }

    /// Every SMS sent through the modem, in order.
    pub fn outbox(&self) -> Vec<OutgoingSms> {
        self.lock().outbox.clone()
    }

    /// The message in slot `index`, if any.
    pub fn stored(&self, index: u16) -> Option<SmsRecord> {
        self.lock().storage.get(&index).cloned()
    }

    /// Number of occupied storage slots.
    pub fn stored_count(&self) -> usize {
        self.lock().storage.len()
    }

    /// Whether the transport side is still open.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Whether `AT+CPOWD=1` has been received since the last reset.
    pub fn is_powered_down(&self) -> bool {
        self.lock().powered_down
    }

    /// Change the reported signal while a test runs.
    pub fn set_signal(&self, signal: u8) {
        self.lock().signal = signal;
    }
}
