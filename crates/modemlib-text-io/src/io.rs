//! Blocking response reader and matcher for AT command transactions.
//!
//! [`ModemIo`] owns the transport and the [`ResponseBuffer`] exclusively
//! and runs one command/response exchange at a time. Every method takes
//! `&mut self`, so two transactions can never interleave on the same link.
//!
//! The reader is a plain polling loop: it asks the transport for bytes,
//! sleeps for [`IoConfig::poll_interval`] when none are waiting, and checks
//! elapsed time against the caller's deadline. A reply chunk ends when the
//! line has been quiet for [`IoConfig::quiescence`].

use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use modemlib_core::error::{Error, Result};
use modemlib_core::transport::Transport;

use crate::protocol::{self, Command, FinalCode, ResponseBuffer};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Timing and buffering parameters for [`ModemIo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConfig {
    /// Longest single read cycle (the per-attempt timeout).
    pub response_timeout: Duration,
    /// How many read cycles [`ModemIo::wait_ok`] and friends make.
    pub response_attempts: u32,
    /// Idle gap that marks the end of one reply chunk.
    pub quiescence: Duration,
    /// Sleep between polls when no byte is waiting.
    pub poll_interval: Duration,
    /// Capacity of the per-cycle [`ResponseBuffer`].
    pub buffer_capacity: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            response_timeout: Duration::from_millis(1000),
            response_attempts: 2,
            quiescence: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
            buffer_capacity: protocol::DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Which of several expected tokens a wait matched, plus everything read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Index into the token list passed to [`ModemIo::wait_for_any`].
    pub index: usize,
    /// The matched token.
    pub token: String,
    /// All text read during the wait, in arrival order.
    pub transcript: String,
}

/// Exclusive owner of a modem link.
pub struct ModemIo {
    transport: Box<dyn Transport>,
    config: IoConfig,
    buffer: ResponseBuffer,
}

impl ModemIo {
    /// Take ownership of a transport.
    pub fn new(transport: Box<dyn Transport>, config: IoConfig) -> Self {
        let buffer = ResponseBuffer::with_capacity(config.buffer_capacity);
        ModemIo {
            transport,
            config,
            buffer,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Give the transport back, e.g. to close it or hand it to another driver.
    pub fn into_transport(self) -> Box<dyn Transport> {
        self.transport
    }

    /// Whether the underlying transport reports itself connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Frame a command and write it.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let bytes = command.frame();
        trace!(
            bytes = bytes.len(),
            data = %String::from_utf8_lossy(&bytes).escape_debug(),
            "sending command"
        );
        self.transport.write(&bytes)
    }

    /// Write bytes exactly as given.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(bytes = bytes.len(), "sending raw bytes");
        self.transport.write(bytes)
    }

    /// Throw away any bytes already waiting on the link.
    ///
    /// Called before each transaction so a late reply to an earlier,
    /// timed-out command cannot satisfy the next one.
    pub fn discard_input(&mut self) -> Result<usize> {
        let mut discarded = 0;
        while self.transport.bytes_available()? > 0 {
            match self.transport.read_byte()? {
                Some(_) => discarded += 1,
                None => break,
            }
        }
        if discarded > 0 {
            debug!(discarded, "discarded stale input");
        }
        Ok(discarded)
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Read one reply chunk.
    ///
    /// Waits up to `max_wait` for the first byte; returns the empty string
    /// if none arrives. Once bytes flow, keeps reading until the line has
    /// been quiet for the quiescence window or `max_wait` has elapsed since
    /// the call started, whichever comes first.
    pub fn read_chunk(&mut self, max_wait: Duration) -> Result<String> {
        self.fill_buffer(max_wait)?;
        let text = self.buffer.to_text();
        trace!(
            bytes = self.buffer.len(),
            data = %text.escape_debug(),
            "read chunk"
        );
        Ok(text)
    }

    /// Run one read cycle and append what arrived to `raw`.
    ///
    /// Raw bytes are kept across cycles so a multi-byte character split
    /// between two chunks still decodes. Returns whether anything arrived.
    fn read_into(&mut self, max_wait: Duration, raw: &mut BytesMut) -> Result<bool> {
        self.fill_buffer(max_wait)?;
        if self.buffer.is_empty() {
            return Ok(false);
        }
        trace!(
            bytes = self.buffer.len(),
            data = %self.buffer.to_text().escape_debug(),
            "read chunk"
        );
        self.buffer.append_to(raw);
        Ok(true)
    }

    /// Fill the response buffer with one reply chunk.
    fn fill_buffer(&mut self, max_wait: Duration) -> Result<()> {
        self.buffer.clear();
        let start = Instant::now();
        let mut last_byte_at: Option<Instant> = None;

        loop {
            let mut received = false;
            while self.transport.bytes_available()? > 0 {
                match self.transport.read_byte()? {
                    Some(byte) => {
                        self.buffer.push(byte);
                        received = true;
                    }
                    None => break,
                }
                if start.elapsed() >= max_wait {
                    break;
                }
            }

            let now = Instant::now();
            if received {
                last_byte_at = Some(now);
            }

            let elapsed = now.duration_since(start);
            if elapsed >= max_wait {
                break;
            }
            if let Some(last) = last_byte_at {
                if now.duration_since(last) >= self.config.quiescence {
                    break;
                }
            }

            thread::sleep(self.config.poll_interval.min(max_wait - elapsed));
        }

        if self.buffer.dropped() > 0 {
            warn!(
                dropped = self.buffer.dropped(),
                capacity = self.buffer.capacity(),
                "response buffer full, oldest bytes overwritten"
            );
        }
        Ok(())
    }

    /// Wait for one specific byte, discarding everything before it.
    ///
    /// Used for the SMS `>` prompt, which is not followed by a line
    /// terminator.
    pub fn wait_for_byte(&mut self, byte: u8, max_wait: Duration) -> Result<()> {
        let start = Instant::now();
        let mut skipped = 0usize;

        loop {
            while self.transport.bytes_available()? > 0 {
                match self.transport.read_byte()? {
                    Some(b) if b == byte => {
                        trace!(byte, skipped, "matched byte");
                        return Ok(());
                    }
                    Some(_) => skipped += 1,
                    None => break,
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                debug!(byte, skipped, "timed out waiting for byte");
                return Err(Error::Timeout);
            }
            thread::sleep(self.config.poll_interval.min(max_wait - elapsed));
        }
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    /// Wait until the reply contains `token`.
    ///
    /// Makes at most `attempts` read cycles of up to `per_attempt` each and
    /// returns the accumulated transcript on success. Fails early with
    /// [`Error::ModemError`] when the modem reports an error (unless the
    /// token itself names an error), with [`Error::Timeout`] when nothing at
    /// all was received, and with [`Error::UnexpectedResponse`] when text
    /// arrived but never contained the token.
    ///
    /// Result-code tokens (`OK`, `ERROR`, `+CME ERROR`, `+CMS ERROR`) only
    /// match a whole reply line, see [`protocol::find_final_code`]; any
    /// other token matches anywhere in the text.
    pub fn wait_for(&mut self, token: &str, attempts: u32, per_attempt: Duration) -> Result<String> {
        self.wait_for_any(&[token], attempts, per_attempt)
            .map(|matched| matched.transcript)
    }

    /// Wait until the reply contains any of `tokens`.
    ///
    /// When several tokens are present, the one that appears first in the
    /// transcript wins. An error line ahead of every match fails the wait
    /// unless one of the tokens names an error.
    pub fn wait_for_any(
        &mut self,
        tokens: &[&str],
        attempts: u32,
        per_attempt: Duration,
    ) -> Result<Matched> {
        let expects_error = tokens.iter().any(|t| protocol::is_error_token(t));
        let mut raw = BytesMut::new();

        for attempt in 1..=attempts {
            if !self.read_into(per_attempt, &mut raw)? {
                debug!(attempt, attempts, ?tokens, "no reply within attempt");
                continue;
            }
            let transcript = String::from_utf8_lossy(&raw);
            let found = earliest_token(&transcript, tokens);
            let error = if expects_error {
                None
            } else {
                modem_error(&transcript)
            };

            match (found, error) {
                (Some((pos, index)), error)
                    if error.as_ref().map_or(true, |(at, _)| pos < *at) =>
                {
                    debug!(attempt, token = tokens[index], "matched response");
                    return Ok(Matched {
                        index,
                        token: tokens[index].to_string(),
                        transcript: transcript.into_owned(),
                    });
                }
                (_, Some((_, line))) => {
                    warn!(line = %line, "modem reported an error");
                    return Err(Error::ModemError(line));
                }
                _ => debug!(attempt, attempts, ?tokens, "reply did not match yet"),
            }
        }

        if raw.is_empty() {
            return Err(Error::Timeout);
        }

        // Message text not followed by a blank line: once the reply is
        // quiet, its last line decides.
        let transcript = String::from_utf8_lossy(&raw).into_owned();
        let last = protocol::last_final_code(&transcript);
        let index = last.and_then(|code| tokens.iter().position(|t| code_matches(code, t)));
        let error = match last {
            Some(FinalCode::Error(line)) if !expects_error => Some(line.to_string()),
            _ => None,
        };
        if let Some(index) = index {
            debug!(token = tokens[index], "matched final line of quiet reply");
            return Ok(Matched {
                index,
                token: tokens[index].to_string(),
                transcript,
            });
        }
        if let Some(line) = error {
            warn!(line = %line, "modem reported an error");
            return Err(Error::ModemError(line));
        }
        Err(Error::UnexpectedResponse(transcript))
    }

    /// Wait for the final result code that follows an echoed payload.
    ///
    /// With echo on, the modem repeats `echo` (and possibly the Ctrl-Z
    /// after it) ahead of its reply. The echo is skipped before looking for
    /// the result, so payload text reading `OK` or `ERROR` cannot end the
    /// wait. Returns the reply without the echo on `OK`; an error result
    /// code is an [`Error::ModemError`].
    pub fn wait_final_code(
        &mut self,
        echo: &str,
        attempts: u32,
        per_attempt: Duration,
    ) -> Result<String> {
        let mut raw = BytesMut::new();

        for attempt in 1..=attempts {
            if !self.read_into(per_attempt, &mut raw)? {
                debug!(attempt, attempts, "no reply within attempt");
                continue;
            }
            let transcript = String::from_utf8_lossy(&raw);
            let Some(reply) = strip_echo(&transcript, echo) else {
                debug!(attempt, "echo still arriving");
                continue;
            };
            match protocol::find_final_code(reply) {
                Some((_, FinalCode::Ok)) => {
                    debug!(attempt, "final result OK");
                    return Ok(reply.to_string());
                }
                Some((_, FinalCode::Error(line))) => {
                    warn!(line, "modem reported an error");
                    return Err(Error::ModemError(line.to_string()));
                }
                None => debug!(attempt, attempts, "no final result yet"),
            }
        }

        if raw.is_empty() {
            Err(Error::Timeout)
        } else {
            Err(Error::UnexpectedResponse(
                String::from_utf8_lossy(&raw).into_owned(),
            ))
        }
    }

    /// Wait for `OK` using the configured attempts and timeout.
    pub fn wait_ok(&mut self) -> Result<String> {
        self.wait_response(protocol::OK)
    }

    /// Wait for `token` using the configured attempts and timeout.
    pub fn wait_response(&mut self, token: &str) -> Result<String> {
        let attempts = self.config.response_attempts;
        let timeout = self.config.response_timeout;
        self.wait_for(token, attempts, timeout)
    }

    /// One complete transaction: discard stale input, send, wait for `token`.
    pub fn transact(&mut self, command: &Command, token: &str) -> Result<String> {
        self.discard_input()?;
        self.send(command)?;
        self.wait_response(token)
    }
}

/// The token that occurs earliest in `text`, as (byte offset, index).
fn earliest_token(text: &str, tokens: &[&str]) -> Option<(usize, usize)> {
    let final_code = protocol::find_final_code(text);
    tokens
        .iter()
        .enumerate()
        .filter_map(|(index, token)| {
            let pos = if FinalCode::from_line(token).is_some() {
                final_code
                    .filter(|(_, code)| code_matches(*code, token))
                    .map(|(pos, _)| pos)
            } else {
                text.find(token)
            };
            pos.map(|pos| (pos, index))
        })
        .min_by_key(|(pos, _)| *pos)
}

/// Whether a result code satisfies a result-code token.
fn code_matches(code: FinalCode<'_>, token: &str) -> bool {
    match code {
        FinalCode::Ok => token == protocol::OK,
        FinalCode::Error(line) => protocol::is_error_token(token) && line.contains(token),
    }
}

/// The first error result line in `text` and its offset.
fn modem_error(text: &str) -> Option<(usize, String)> {
    match protocol::find_final_code(text)? {
        (pos, FinalCode::Error(line)) => Some((pos, line.to_string())),
        (_, FinalCode::Ok) => None,
    }
}

/// The reply after an echoed `echo`, or `None` while the echo is still
/// arriving. Text that does not start with the echo is returned whole.
fn strip_echo<'a>(text: &'a str, echo: &str) -> Option<&'a str> {
    match text.strip_prefix(echo) {
        Some(rest) => Some(
            rest.strip_prefix(char::from(protocol::END_OF_MESSAGE))
                .unwrap_or(rest),
        ),
        None if echo.starts_with(text) => None,
        None => Some(text),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
