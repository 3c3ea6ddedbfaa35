//! Scripted mock transport for deterministic testing of modem drivers.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/reply pairs. Each reply is made of one or more timed bursts:
//! the bytes of a burst become readable only once its delay, measured from
//! the matching write, has elapsed. That lets tests reproduce a modem that
//! answers late, answers in pieces, or never answers at all.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use modemlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the driver writes "AT+CSQ\r", answer 10 ms later.
//! mock.expect_delayed(b"AT+CSQ\r", b"\r\n+CSQ: 18,0\r\n\r\nOK\r\n", Duration::from_millis(10));
//! let handle = mock.handle();
//! assert_eq!(handle.remaining_expectations(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use modemlib_core::error::{Error, Result};
use modemlib_core::transport::Transport;

/// A pre-loaded request and the timed reply bursts it triggers.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be written.
    request: Vec<u8>,
    /// Reply bursts, each with its delay relative to the write.
    replies: Vec<(Duration, Vec<u8>)>,
}

/// Bytes that become readable at `ready_at`.
#[derive(Debug)]
struct Burst {
    ready_at: Instant,
    bytes: VecDeque<u8>,
}

#[derive(Debug)]
struct State {
    expectations: VecDeque<Expectation>,
    /// Scheduled bursts, ordered by `ready_at`.
    scheduled: VecDeque<Burst>,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
}

impl State {
    fn schedule(&mut self, ready_at: Instant, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let burst = Burst {
            ready_at,
            bytes: bytes.iter().copied().collect(),
        };
        let pos = self
            .scheduled
            .iter()
            .position(|b| b.ready_at > ready_at)
            .unwrap_or(self.scheduled.len());
        self.scheduled.insert(pos, burst);
    }

    fn drop_empty_front(&mut self) {
        while self.scheduled.front().is_some_and(|b| b.bytes.is_empty()) {
            self.scheduled.pop_front();
        }
    }
}

/// A mock [`Transport`] for testing drivers without hardware.
///
/// Expectations are consumed in order. Each write is recorded and compared
/// with the next expectation; a mismatch, or a write with no expectation
/// left, fails with [`Error::Transport`]. The reply bursts of a matched
/// expectation are scheduled relative to the moment of the write.
///
/// The state lives behind a shared handle so a test can keep inspecting the
/// mock after moving it into a driver (see [`MockTransport::handle`]).
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(State {
                expectations: VecDeque::new(),
                scheduled: VecDeque::new(),
                connected: true,
                sent_log: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Expect `request` and answer immediately with `reply`.
    ///
    /// An empty `reply` models a modem that stays silent.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.expect_delayed(request, reply, Duration::ZERO);
    }

    /// Expect `request` and answer with `reply` after `delay`.
    pub fn expect_delayed(&mut self, request: &[u8], reply: &[u8], delay: Duration) {
        self.expect_bursts(request, &[(delay, reply)]);
    }

    /// Expect `request` and answer with several bursts, each delayed
    /// relative to the write.
    pub fn expect_bursts(&mut self, request: &[u8], bursts: &[(Duration, &[u8])]) {
        self.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            replies: bursts
                .iter()
                .map(|(delay, bytes)| (*delay, bytes.to_vec()))
                .collect(),
        });
    }

    /// Make `bytes` readable right away, without any write.
    ///
    /// Models unsolicited output or a late reply left over from an earlier
    /// command.
    pub fn push_incoming(&mut self, bytes: &[u8]) {
        self.push_incoming_after(bytes, Duration::ZERO);
    }

    /// Make `bytes` readable `delay` from now, without any write.
    pub fn push_incoming_after(&mut self, bytes: &[u8], delay: Duration) {
        let ready_at = Instant::now() + delay;
        self.lock().schedule(ready_at, bytes);
    }

    /// Set the connected state.
    ///
    /// When `false`, every transport call fails with [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.lock().connected = connected;
    }

    /// A handle that can inspect this mock after it has been moved away.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// All writes so far, one element per `write()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent_log.clone()
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        state.sent_log.push(data.to_vec());

        let Some(expectation) = state.expectations.pop_front() else {
            return Err(Error::Transport(format!(
                "no more expectations in mock transport, got {:?}",
                String::from_utf8_lossy(data)
            )));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Transport(format!(
                "unexpected write: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }

        let now = Instant::now();
        for (delay, bytes) in &expectation.replies {
            state.schedule(now + *delay, bytes);
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut state = self.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        state.drop_empty_front();
        let now = Instant::now();
        let byte = match state.scheduled.front_mut() {
            Some(burst) if burst.ready_at <= now => burst.bytes.pop_front(),
            _ => None,
        };
        state.drop_empty_front();
        Ok(byte)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        let now = Instant::now();
        Ok(state
            .scheduled
            .iter()
            .take_while(|b| b.ready_at <= now)
            .map(|b| b.bytes.len())
            .sum())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connected = false;
        state.scheduled.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

/// Read-only view onto a [`MockTransport`] that has been handed to a driver.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<State>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All writes so far, one element per `write()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent_log.clone()
    }

    /// All writes so far, concatenated and decoded lossily.
    pub fn sent_text(&self) -> String {
        let state = self.lock();
        let bytes: Vec<u8> = state.sent_log.iter().flatten().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }

    /// Whether the transport has been closed or disconnected.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn drain(mock: &mut MockTransport) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = mock.read_byte().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn mock_transport_basic_write_read() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r", b"\r\nOK\r\n");

        mock.write(b"AT\r").unwrap();
        assert_eq!(mock.bytes_available().unwrap(), 6);
        assert_eq!(drain(&mut mock), b"\r\nOK\r\n");
        assert_eq!(mock.bytes_available().unwrap(), 0);
    }

    #[test]
    fn mock_transport_tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r", b"OK");
        mock.expect(b"ATE0\r", b"OK");
        let handle = mock.handle();

        mock.write(b"AT\r").unwrap();
        mock.write(b"ATE0\r").unwrap();

        assert_eq!(handle.sent_data(), vec![b"AT\r".to_vec(), b"ATE0\r".to_vec()]);
        assert_eq!(handle.sent_text(), "AT\rATE0\r");
    }

    #[test]
    fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r", b"OK");

        let result = mock.write(b"ATI\r");
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.write(b"AT\r");
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn mock_transport_read_without_write_is_empty() {
        let mut mock = MockTransport::new();
        assert_eq!(mock.read_byte().unwrap(), None);
        assert_eq!(mock.bytes_available().unwrap(), 0);
    }

    #[test]
    fn mock_transport_delayed_reply() {
        let mut mock = MockTransport::new();
        mock.expect_delayed(b"AT\r", b"OK", Duration::from_millis(30));

        mock.write(b"AT\r").unwrap();
        assert_eq!(mock.bytes_available().unwrap(), 0);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(drain(&mut mock), b"OK");
    }

    #[test]
    fn mock_transport_bursts_release_in_order() {
        let mut mock = MockTransport::new();
        mock.expect_bursts(
            b"AT\r",
            &[
                (Duration::from_millis(30), b"second".as_slice()),
                (Duration::ZERO, b"first".as_slice()),
            ],
        );

        mock.write(b"AT\r").unwrap();
        assert_eq!(drain(&mut mock), b"first");
        thread::sleep(Duration::from_millis(40));
        assert_eq!(drain(&mut mock), b"second");
    }

    #[test]
    fn mock_transport_push_incoming() {
        let mut mock = MockTransport::new();
        mock.push_incoming(b"RING\r\n");
        assert_eq!(drain(&mut mock), b"RING\r\n");
    }

    #[test]
    fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().unwrap();
        assert!(!mock.is_connected());

        assert!(matches!(mock.write(b"AT\r"), Err(Error::NotConnected)));
        assert!(matches!(mock.read_byte(), Err(Error::NotConnected)));
    }

    #[test]
    fn mock_transport_set_connected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());
        assert!(matches!(mock.bytes_available(), Err(Error::NotConnected)));
    }

    #[test]
    fn mock_transport_remaining_expectations() {
        let mut mock = MockTransport::new();
        mock.expect(b"A", b"");
        mock.expect(b"B", b"");
        let handle = mock.handle();
        assert_eq!(handle.remaining_expectations(), 2);

        mock.write(b"A").unwrap();
        assert_eq!(handle.remaining_expectations(), 1);

        mock.write(b"B").unwrap();
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[test]
    fn handle_survives_move_into_box() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r", b"OK");
        let handle = mock.handle();

        let mut boxed: Box<dyn Transport> = Box::new(mock);
        boxed.write(b"AT\r").unwrap();
        boxed.close().unwrap();

        assert_eq!(handle.sent_data().len(), 1);
        assert!(!handle.is_connected());
    }
}
