//! Sim800 -- the transaction facade for SIM800-class modems.
//!
//! This module ties the AT command builders and parsers ([`commands`]) to
//! the IO engine ([`ModemIo`]) to produce a working driver. Every public
//! operation is one blocking transaction (or a short [`sequence`] of them):
//! frame and send, wait for the expected reply within the configured
//! budget, then parse the payload into a typed result.
//!
//! All operations take `&mut self`; a `Sim800` runs exactly one
//! transaction at a time.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use modemlib_core::error::{Error, Result};
use modemlib_core::helpers::{describe_signal, signal_bars};
use modemlib_core::transport::Transport;
use modemlib_core::types::*;
use modemlib_text_io::io::ModemIo;
use modemlib_text_io::protocol::{self, at_command, at_plus_command, Command};

use crate::commands;
use crate::config::ModemConfig;
use crate::sequence::{self, CommandStep, Sequence};

/// A SIM800 modem on an exclusively owned transport.
///
/// Constructed via [`Sim800Builder`](crate::builder::Sim800Builder).
pub struct Sim800 {
    io: ModemIo,
    config: ModemConfig,
}

impl Sim800 {
    /// Create a driver from a transport and configuration.
    ///
    /// This is called by [`Sim800Builder`](crate::builder::Sim800Builder);
    /// callers should use the builder API instead.
    pub(crate) fn new(transport: Box<dyn Transport>, config: ModemConfig) -> Self {
        let io = ModemIo::new(transport, config.io_config());
        Sim800 { io, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Host pin wired to the modem's TX line.
    pub fn receive_pin(&self) -> u8 {
        self.config.rx_pin
    }

    /// Host pin wired to the modem's RX line.
    pub fn transmit_pin(&self) -> u8 {
        self.config.tx_pin
    }

    /// Host pin wired to the modem's reset line.
    pub fn reset_pin(&self) -> u8 {
        self.config.reset_pin
    }

    /// Whether the transport is still open.
    pub fn is_connected(&self) -> bool {
        self.io.is_connected()
    }

    /// Close the transport and drop the driver.
    pub fn close(self) -> Result<()> {
        let mut transport = self.io.into_transport();
        transport.close()?;
        info!("modem transport closed");
        Ok(())
    }

    /// Give the transport back without closing it.
    pub fn into_transport(self) -> Box<dyn Transport> {
        self.io.into_transport()
    }

    // -----------------------------------------------------------------
    // Raw command access
    // -----------------------------------------------------------------

    /// Frame and write an arbitrary command. Does not wait for a reply.
    pub fn send_command(&mut self, command: impl Into<Command>) -> Result<()> {
        self.io.send(&command.into())
    }

    /// Send `AT<body>`. Does not wait for a reply.
    pub fn send_at_command(&mut self, body: &str) -> Result<()> {
        self.io.send(&at_command(body))
    }

    /// Send `AT+<body>`. Does not wait for a reply.
    pub fn send_at_plus_command(&mut self, body: &str) -> Result<()> {
        self.io.send(&at_plus_command(body))
    }

    /// Wait for `OK` with the configured attempts and timeout.
    pub fn wait_ok(&mut self) -> Result<String> {
        self.io.wait_ok()
    }

    /// Wait for `token` with the configured attempts and timeout.
    pub fn wait_response(&mut self, token: &str) -> Result<String> {
        self.io.wait_response(token)
    }

    /// Wait for `token` with explicit attempts and per-attempt timeout.
    pub fn wait_response_with(
        &mut self,
        token: &str,
        attempts: u32,
        timeout: Duration,
    ) -> Result<String> {
        self.io.wait_for(token, attempts, timeout)
    }

    /// One command, one expected token.
    fn transact(&mut self, command: Command, expect: &str) -> Result<String> {
        debug!(
            command = %String::from_utf8_lossy(command.content()),
            expect,
            "transaction"
        );
        self.io.transact(&command, expect)
    }

    // -----------------------------------------------------------------
    // Power and radio
    // -----------------------------------------------------------------

    /// Check the modem answers at all (`AT` -> `OK`).
    pub fn ping(&mut self) -> Result<()> {
        self.transact(commands::cmd_attention(), protocol::OK)?;
        Ok(())
    }

    /// Software reset to full functionality (`AT+CFUN=1,1`).
    pub fn reset(&mut self) -> Result<()> {
        self.transact(commands::cmd_reset(), protocol::OK)?;
        Ok(())
    }

    /// Normal power-down (`AT+CPOWD=1`).
    ///
    /// Succeeds once the modem reports `NORMAL POWER DOWN`.
    pub fn power_down_mode(&mut self) -> Result<()> {
        self.transact(commands::cmd_power_down(), commands::POWER_DOWN_REPLY)?;
        Ok(())
    }

    /// Let the modem sleep whenever the serial line is idle (`AT+CSCLK=2`).
    pub fn sleep_mode(&mut self) -> Result<()> {
        self.transact(commands::cmd_sleep_mode(), protocol::OK)?;
        Ok(())
    }

    /// Set the phone functionality level (`AT+CFUN=<n>`).
    pub fn set_phone_functionality(&mut self, mode: PhoneFunctionality) -> Result<()> {
        self.transact(commands::cmd_set_phone_functionality(mode), protocol::OK)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Signal
    // -----------------------------------------------------------------

    /// Read the current signal quality (`AT+CSQ`).
    pub fn signal_quality(&mut self) -> Result<SignalQuality> {
        let reply = self.transact(commands::cmd_signal_quality(), protocol::OK)?;
        commands::parse_signal_response(&reply)
    }

    /// Poll signal quality until it reaches the configured threshold.
    ///
    /// Makes up to `signal_attempts` polls, `signal_poll_interval` apart.
    /// Returns the last observed reading whether or not it is usable; the
    /// caller checks [`SignalQuality::is_usable`]. Fails only if no poll
    /// produced a reading, or the transport went away.
    pub fn wait_signal(&mut self) -> Result<SignalQuality> {
        let attempts = self.config.signal_attempts;
        let threshold = self.config.signal_threshold;
        let mut last: Option<SignalQuality> = None;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=attempts {
            match self.signal_quality() {
                Ok(quality) => {
                    debug!(
                        attempt,
                        attempts,
                        %quality,
                        band = describe_signal(quality),
                        bars = signal_bars(quality),
                        "signal poll"
                    );
                    last = Some(quality);
                    if quality.is_usable(threshold) {
                        return Ok(quality);
                    }
                }
                Err(e @ (Error::NotConnected | Error::ConnectionLost)) => return Err(e),
                Err(e) => {
                    debug!(attempt, attempts, error = %e, "signal poll failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                thread::sleep(self.config.signal_poll_interval);
            }
        }

        match (last, last_error) {
            (Some(quality), _) => {
                warn!(%quality, threshold, "signal still below threshold");
                Ok(quality)
            }
            (None, Some(e)) => Err(e),
            (None, None) => Err(Error::Timeout),
        }
    }

    // -----------------------------------------------------------------
    // SMS
    // -----------------------------------------------------------------

    /// Send a text-mode SMS.
    ///
    /// Runs `AT+CMGF=1`, `AT+CMGS="<number>"`, waits for the `>` prompt,
    /// writes the body and Ctrl-Z, then waits up to `sms_timeout` for the
    /// network's verdict. Returns the message reference from `+CMGS:` when
    /// the modem reports one.
    ///
    /// Any failure after the body went out (including a `Timeout`) is
    /// ambiguous: the message may still have been sent, so retrying can
    /// deliver it twice.
    pub fn send_sms(&mut self, number: &str, text: &str) -> Result<Option<u8>> {
        commands::validate_number(number)?;
        commands::validate_body(text)?;

        let prompt_budget = self.config.response_timeout * self.config.response_attempts;
        let per_attempt = self.config.response_timeout.max(Duration::from_millis(1));
        let confirm_attempts = confirm_attempts(self.config.sms_timeout, per_attempt);
        let io = &mut self.io;
        let mut sequence = Sequence::new("send_sms");

        sequence.step("text mode", || io.transact(&commands::cmd_text_mode(), protocol::OK))?;

        let prompt = sequence.step("prompt", || {
            io.discard_input()?;
            io.send(&commands::cmd_send_sms(number))?;
            io.wait_for_byte(protocol::PROMPT, prompt_budget)?;
            // The prompt is followed by a space.
            io.discard_input().map(|_| ())
        });
        if prompt.is_err() {
            // Leave body-entry mode in case the prompt arrived late.
            if let Err(e) = io.send(&commands::sms_cancel()) {
                debug!(error = %e, "failed to send SMS cancel");
            }
        }
        prompt?;

        sequence.step("body", || io.send(&commands::sms_payload(text)))?;

        // With echo on, the body comes back first and may itself read OK or ERROR.
        let reply = sequence.step("confirm", || {
            io.wait_final_code(text, confirm_attempts, per_attempt)
        })?;

        sequence.finish();
        let reference = commands::parse_send_reference(&reply);
        info!(number, ?reference, "SMS sent");
        Ok(reference)
    }

    /// Read the message in storage slot `index` (1-based).
    ///
    /// Returns [`SmsLookup::NotFound`] when the slot is empty. A modem
    /// rejection (e.g. `+CMS ERROR: 321`, invalid index) is an
    /// [`Error::ModemError`].
    pub fn read_sms(&mut self, index: u16) -> Result<SmsLookup> {
        let index = commands::validate_index(index)?;
        self.transact(commands::cmd_text_mode(), protocol::OK)?;
        let reply = self.transact(commands::cmd_read_sms(index), protocol::OK)?;
        commands::parse_sms_response(&reply)
    }

    /// Delete the message in storage slot `index` (1-based).
    pub fn del_sms(&mut self, index: u16) -> Result<()> {
        let index = commands::validate_index(index)?;
        self.transact(commands::cmd_delete_sms(index), protocol::OK)?;
        Ok(())
    }

    /// Delete every stored message.
    pub fn del_all_sms(&mut self) -> Result<()> {
        self.transact(commands::cmd_delete_all_sms(), protocol::OK)?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Clock and settings
    // -----------------------------------------------------------------

    /// Read the modem's real-time clock.
    ///
    /// Use `unwrap_or_default()` to get the all-zero sentinel on failure.
    pub fn rtc_time(&mut self) -> Result<DateTime> {
        let reply = self.transact(commands::cmd_read_clock(), protocol::OK)?;
        commands::parse_clock_response(&reply)
    }

    /// Let the network set the clock and time zone, then save the profile.
    pub fn set_auto_cell_rtc(&mut self) -> Result<()> {
        self.auto_cell_rtc("set_auto_cell_rtc", true)
    }

    /// Stop network clock updates, then save the profile.
    pub fn reset_auto_cell_rtc(&mut self) -> Result<()> {
        self.auto_cell_rtc("reset_auto_cell_rtc", false)
    }

    fn auto_cell_rtc(&mut self, operation: &'static str, on: bool) -> Result<()> {
        let steps = [
            CommandStep::new(
                "network time sync",
                commands::cmd_network_time_sync(on),
                protocol::OK,
            ),
            CommandStep::new(
                "time zone reporting",
                commands::cmd_time_zone_reporting(on),
                protocol::OK,
            ),
            CommandStep::new("save settings", commands::cmd_save_settings(), protocol::OK),
        ];
        sequence::run(&mut self.io, operation, &steps)?;
        Ok(())
    }

    /// Save the current settings to the user profile (`AT&W`).
    pub fn save_all_settings(&mut self) -> Result<()> {
        self.transact(commands::cmd_save_settings(), protocol::OK)?;
        Ok(())
    }

    /// Turn the network status LED on.
    pub fn set_on_led_flash(&mut self) -> Result<()> {
        self.transact(commands::cmd_net_light(true), protocol::OK)?;
        Ok(())
    }

    /// Turn the network status LED off.
    pub fn set_off_led_flash(&mut self) -> Result<()> {
        self.transact(commands::cmd_net_light(false), protocol::OK)?;
        Ok(())
    }
}

/// Read cycles of `per_attempt` that fit in `budget`, at least one.
fn confirm_attempts(budget: Duration, per_attempt: Duration) -> u32 {
    let cycles = budget.as_nanos().div_ceil(per_attempt.as_nanos());
    u32::try_from(cycles).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use modemlib_test_harness::{MockTransport, SimulatedModem};

    use crate::builder::Sim800Builder;

    fn test_config() -> ModemConfig {
        ModemConfig {
            response_timeout: Duration::from_millis(100),
            response_attempts: 2,
            quiescence: Duration::from_millis(10),
            sms_timeout: Duration::from_millis(500),
            signal_attempts: 3,
            signal_poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn make_modem(transport: impl Transport + 'static) -> Sim800 {
        Sim800Builder::new()
            .config(test_config())
            .build_with_transport(Box::new(transport))
            .unwrap()
    }

    // -----------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------

    #[test]
    fn send_at_and_wait_ok() {
        let mut mock = MockTransport::new();
        mock.expect_delayed(b"AT\r", b"OK\r\n", Duration::from_millis(20));
        let mut modem = make_modem(mock);

        modem.send_at_command("").unwrap();
        assert!(modem.wait_ok().unwrap().contains("OK"));
    }

    #[test]
    fn wait_ok_silence_is_timeout() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r", b"");
        let mut modem = make_modem(mock);

        modem.send_command("AT").unwrap();
        assert!(matches!(modem.wait_ok(), Err(Error::Timeout)));
    }

    #[test]
    fn send_at_plus_and_custom_token() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+GSN\r", b"\r\n861234567890123\r\n\r\nOK\r\n");
        let mut modem = make_modem(mock);

        modem.send_at_plus_command("GSN").unwrap();
        let reply = modem
            .wait_response_with("OK", 1, Duration::from_millis(100))
            .unwrap();
        assert!(reply.contains("861234567890123"));
    }

    #[test]
    fn wait_response_custom_token() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CPIN?\r", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
        let mut modem = make_modem(mock);

        modem.send_at_plus_command("CPIN?").unwrap();
        assert!(modem.wait_response("READY").is_ok());
    }

    #[test]
    fn pins_are_configuration_data() {
        let modem = Sim800Builder::new()
            .pins(10, 11)
            .build_with_transport(Box::new(MockTransport::new()))
            .unwrap();
        assert_eq!(modem.receive_pin(), 10);
        assert_eq!(modem.transmit_pin(), 11);
        assert_eq!(modem.reset_pin(), 5);
    }

    // -----------------------------------------------------------------
    // Power
    // -----------------------------------------------------------------

    #[test]
    fn reset_sends_cfun() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CFUN=1,1\r", b"\r\nOK\r\n");
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        modem.reset().unwrap();
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[test]
    fn power_down_waits_for_notice() {
        let mut mock = MockTransport::new();
        mock.expect_delayed(
            b"AT+CPOWD=1\r",
            b"\r\nNORMAL POWER DOWN\r\n",
            Duration::from_millis(30),
        );
        let mut modem = make_modem(mock);
        modem.power_down_mode().unwrap();
    }

    #[test]
    fn power_down_without_notice_is_unexpected() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CPOWD=1\r", b"\r\nOK\r\n");
        let mut modem = make_modem(mock);
        assert!(matches!(
            modem.power_down_mode(),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn sleep_mode_and_functionality() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CSCLK=2\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CFUN=4\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CFUN=0\r", b"\r\nERROR\r\n");
        let mut modem = make_modem(mock);

        modem.sleep_mode().unwrap();
        modem
            .set_phone_functionality(PhoneFunctionality::DisableRf)
            .unwrap();
        assert!(matches!(
            modem.set_phone_functionality(PhoneFunctionality::Minimum),
            Err(Error::ModemError(_))
        ));
    }

    #[test]
    fn power_operations_are_idempotent() {
        let sim = SimulatedModem::new();
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        assert!(modem.reset().is_ok());
        assert!(modem.reset().is_ok());
        assert!(modem.sleep_mode().is_ok());
        assert!(modem.sleep_mode().is_ok());
        assert!(modem.power_down_mode().is_ok());
        assert!(modem.power_down_mode().is_ok());
        assert!(handle.is_powered_down());
    }

    // -----------------------------------------------------------------
    // Signal
    // -----------------------------------------------------------------

    #[test]
    fn signal_quality_18() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CSQ\r", b"+CSQ: 18,0\r\n\r\nOK\r\n");
        let mut modem = make_modem(mock);

        let q = modem.signal_quality().unwrap();
        assert_eq!(q.raw(), 18);
        assert_eq!(q.to_dbm(), Some(-77));
    }

    #[test]
    fn signal_quality_unknown_is_reported() {
        let sim = SimulatedModem::new().with_signal(99);
        let mut modem = make_modem(sim);
        assert_eq!(modem.signal_quality().unwrap(), SignalQuality::UNKNOWN);
    }

    #[test]
    fn wait_signal_returns_first_usable() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CSQ\r", b"\r\n+CSQ: 99,99\r\n\r\nOK\r\n");
        mock.expect(b"AT+CSQ\r", b"\r\n+CSQ: 4,0\r\n\r\nOK\r\n");
        mock.expect(b"AT+CSQ\r", b"\r\n+CSQ: 15,0\r\n\r\nOK\r\n");
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        assert_eq!(modem.wait_signal().unwrap().raw(), 15);
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[test]
    fn wait_signal_returns_last_when_never_usable() {
        let sim = SimulatedModem::new().with_signal(6);
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        let q = modem.wait_signal().unwrap();
        assert_eq!(q.raw(), 6);
        assert!(!q.is_usable(modem.config().signal_threshold));
        assert_eq!(handle.received_lines().len(), 3);
    }

    #[test]
    fn wait_signal_survives_one_bad_poll() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CSQ\r", b"\r\nERROR\r\n");
        mock.expect(b"AT+CSQ\r", b"\r\n+CSQ: 20,0\r\n\r\nOK\r\n");
        let mut modem = make_modem(mock);
        assert_eq!(modem.wait_signal().unwrap().raw(), 20);
    }

    #[test]
    fn wait_signal_all_polls_fail() {
        let mut mock = MockTransport::new();
        for _ in 0..3 {
            mock.expect(b"AT+CSQ\r", b"\r\n+CME ERROR: 10\r\n");
        }
        let mut modem = make_modem(mock);
        match modem.wait_signal() {
            Err(Error::ModemError(line)) => assert_eq!(line, "+CME ERROR: 10"),
            other => panic!("expected ModemError, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------
    // SMS send
    // -----------------------------------------------------------------

    #[test]
    fn send_sms_wire_sequence() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CMGS=\"+15551234567\"\r", b"\r\n> ");
        mock.expect_delayed(
            b"Hello world\x1a",
            b"\r\n+CMGS: 42\r\n\r\nOK\r\n",
            Duration::from_millis(150),
        );
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        let reference = modem.send_sms("+15551234567", "Hello world").unwrap();
        assert_eq!(reference, Some(42));
        assert_eq!(handle.remaining_expectations(), 0);
        let sent = handle.sent_data();
        assert!(!sent[2].contains(&b'\r'));
    }

    #[test]
    fn send_sms_through_simulated_modem() {
        let sim = SimulatedModem::new();
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        assert_eq!(modem.send_sms("5551234", "first").unwrap(), Some(1));
        assert_eq!(modem.send_sms("+4470000", "second").unwrap(), Some(2));
        let outbox = handle.outbox();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[1].number, "+4470000");
        assert_eq!(outbox[1].body, "second");
    }

    #[test]
    fn send_sms_network_rejection() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CMGS=\"123\"\r", b"\r\n> ");
        mock.expect(b"hi\x1a", b"\r\n+CMS ERROR: 500\r\n");
        let mut modem = make_modem(mock);

        let err = modem.send_sms("123", "hi").unwrap_err();
        match &err {
            Error::SequenceAborted {
                step, completed, ..
            } => {
                assert_eq!(*step, "confirm");
                assert_eq!(*completed, 3);
            }
            other => panic!("expected SequenceAborted, got {other:?}"),
        }
        assert!(matches!(err.root_cause(), Error::ModemError(line) if line == "+CMS ERROR: 500"));
    }

    #[test]
    fn send_sms_no_prompt_cancels() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CMGS=\"123\"\r", b"");
        mock.expect(b"\x1b", b"");
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        let err = modem.send_sms("123", "hi").unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceAborted { step: "prompt", completed: 1, .. }
        ));
        assert!(err.root_cause().is_timeout());
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[test]
    fn send_sms_confirm_timeout_is_bounded() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CMGS=\"123\"\r", b"\r\n> ");
        mock.expect(b"hi\x1a", b"");
        let mut modem = make_modem(mock);

        let start = Instant::now();
        let err = modem.send_sms("123", "hi").unwrap_err();
        assert!(err.root_cause().is_timeout());
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn send_sms_text_mode_failure() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nERROR\r\n");
        let mut modem = make_modem(mock);
        let err = modem.send_sms("123", "hi").unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceAborted { step: "text mode", completed: 0, .. }
        ));
    }

    #[test]
    fn send_sms_rejects_bad_arguments_before_writing() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        for (number, body) in [
            ("", "hi"),
            ("12-34", "hi"),
            ("123", ""),
            ("123", "end\x1a"),
        ] {
            assert!(matches!(
                modem.send_sms(number, body),
                Err(Error::InvalidParameter(_))
            ));
        }
        let long = "x".repeat(161);
        assert!(matches!(
            modem.send_sms("123", &long),
            Err(Error::InvalidParameter(_))
        ));
        assert!(handle.sent_data().is_empty());
    }

    #[test]
    fn send_sms_echoed_body_reading_error_is_not_a_verdict() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CMGS=\"123\"\r", b"\r\n> ");
        mock.expect_bursts(
            b"Server ERROR fixed\x1a",
            &[
                (Duration::ZERO, b"Server ERROR fixed".as_slice()),
                (Duration::from_millis(60), b"\r\n+CMGS: 7\r\n\r\nOK\r\n".as_slice()),
            ],
        );
        let mut modem = make_modem(mock);

        assert_eq!(modem.send_sms("123", "Server ERROR fixed").unwrap(), Some(7));
    }

    #[test]
    fn send_sms_echoed_body_reading_ok_does_not_hide_rejection() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CMGS=\"123\"\r", b"\r\n> ");
        mock.expect_bursts(
            b"OK see you\x1a",
            &[
                (Duration::ZERO, b"OK see you".as_slice()),
                (Duration::from_millis(60), b"\r\n+CMS ERROR: 500\r\n".as_slice()),
            ],
        );
        let mut modem = make_modem(mock);

        let err = modem.send_sms("123", "OK see you").unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceAborted { step: "confirm", completed: 3, .. }
        ));
        assert!(matches!(err.root_cause(), Error::ModemError(line) if line == "+CMS ERROR: 500"));
    }

    // -----------------------------------------------------------------
    // SMS read / delete
    // -----------------------------------------------------------------

    #[test]
    fn read_sms_typical() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect(
            b"AT+CMGR=1\r",
            b"+CMGR: \"REC UNREAD\",\"+15551234567\",\"\",\"24/01/05,10:30:00+00\"\r\nHello world\r\nOK\r\n",
        );
        let mut modem = make_modem(mock);

        let record = modem.read_sms(1).unwrap().into_record().unwrap();
        assert_eq!(record.sender, "+15551234567");
        assert_eq!(record.body, "Hello world");
        assert_eq!(record.timestamp, "24/01/05,10:30:00+00");
    }

    #[test]
    fn read_sms_empty_slot() {
        let sim = SimulatedModem::new();
        let mut modem = make_modem(sim);
        assert_eq!(modem.read_sms(4).unwrap(), SmsLookup::NotFound);
    }

    #[test]
    fn read_sms_invalid_index_reported_by_modem() {
        let sim = SimulatedModem::new();
        let mut modem = make_modem(sim);
        match modem.read_sms(31) {
            Err(Error::ModemError(line)) => assert_eq!(line, "+CMS ERROR: 321"),
            other => panic!("expected ModemError, got {other:?}"),
        }
    }

    #[test]
    fn index_zero_rejected_without_io() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        assert!(matches!(modem.read_sms(0), Err(Error::InvalidParameter(_))));
        assert!(matches!(modem.del_sms(0), Err(Error::InvalidParameter(_))));
        assert!(handle.sent_data().is_empty());
    }

    #[test]
    fn read_then_delete_against_simulated_modem() {
        let record = SmsRecord {
            status: "REC UNREAD".into(),
            sender: "+15551234567".into(),
            timestamp: "24/01/05,10:30:00+00".into(),
            body: "Meet at 6".into(),
        };
        let sim = SimulatedModem::new()
            .with_stored_sms(2, record)
            .with_stored_sms(3, SmsRecord::default());
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        let first = modem.read_sms(2).unwrap().into_record().unwrap();
        assert_eq!(first.status, "REC UNREAD");
        assert_eq!(first.body, "Meet at 6");
        let second = modem.read_sms(2).unwrap().into_record().unwrap();
        assert_eq!(second.status, "REC READ");

        modem.del_sms(2).unwrap();
        assert_eq!(modem.read_sms(2).unwrap(), SmsLookup::NotFound);
        assert_eq!(handle.stored_count(), 1);

        modem.del_all_sms().unwrap();
        assert_eq!(handle.stored_count(), 0);
    }

    #[test]
    fn read_sms_reply_in_two_bursts() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CMGF=1\r", b"\r\nOK\r\n");
        mock.expect_bursts(
            b"AT+CMGR=5\r",
            &[
                (
                    Duration::ZERO,
                    b"\r\n+CMGR: \"REC READ\",\"+1555\",\"\",\"24/01/05,10:30:00+00\"\r\nPart".as_slice(),
                ),
                (Duration::from_millis(40), b" two\r\n\r\nOK\r\n".as_slice()),
            ],
        );
        let mut modem = make_modem(mock);

        let record = modem.read_sms(5).unwrap().into_record().unwrap();
        assert_eq!(record.body, "Part two");
    }

    // -----------------------------------------------------------------
    // Clock and settings
    // -----------------------------------------------------------------

    #[test]
    fn rtc_time_parses_clock() {
        let sim = SimulatedModem::new().with_clock("23/07/14,08:09:10+08");
        let mut modem = make_modem(sim);

        let dt = modem.rtc_time().unwrap();
        assert_eq!(dt.to_string(), "14/07/23 08:09:10");
        assert_eq!(dt.to_naive().unwrap().to_string(), "2023-07-14 08:09:10");
    }

    #[test]
    fn rtc_time_malformed_gives_sentinel() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CCLK?\r", b"\r\n+CCLK: \"garbage\"\r\n\r\nOK\r\n");
        let mut modem = make_modem(mock);

        let result = modem.rtc_time();
        assert!(matches!(result, Err(Error::Parse(_))));
        assert!(result.unwrap_or_default().is_sentinel());
    }

    #[test]
    fn auto_cell_rtc_on_and_off() {
        let sim = SimulatedModem::new();
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        modem.set_auto_cell_rtc().unwrap();
        modem.reset_auto_cell_rtc().unwrap();
        assert_eq!(
            handle.received_lines(),
            vec![
                "AT+CLTS=1",
                "AT+CTZR=1",
                "AT&W",
                "AT+CLTS=0",
                "AT+CTZR=0",
                "AT&W"
            ]
        );
    }

    #[test]
    fn auto_cell_rtc_partial_failure() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CLTS=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CTZR=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT&W\r", b"");
        let mut modem = make_modem(mock);

        let err = modem.set_auto_cell_rtc().unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceAborted {
                operation: "set_auto_cell_rtc",
                step: "save settings",
                completed: 2,
                ..
            }
        ));
    }

    #[test]
    fn settings_and_led() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT&W\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CNETLIGHT=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CNETLIGHT=0\r", b"\r\nOK\r\n");
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        modem.save_all_settings().unwrap();
        modem.set_on_led_flash().unwrap();
        modem.set_off_led_flash().unwrap();
        assert_eq!(handle.sent_text(), "AT&W\rAT+CNETLIGHT=1\rAT+CNETLIGHT=0\r");
    }

    #[test]
    fn ping_and_close() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r", b"\r\nOK\r\n");
        let handle = mock.handle();
        let mut modem = make_modem(mock);

        modem.ping().unwrap();
        assert!(modem.is_connected());
        modem.close().unwrap();
        assert!(!handle.is_connected());
    }

    #[test]
    fn operations_fail_when_disconnected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        let mut modem = make_modem(mock);
        assert!(matches!(modem.signal_quality(), Err(Error::NotConnected)));
        assert!(matches!(modem.wait_signal(), Err(Error::NotConnected)));
    }

    #[test]
    fn stale_reply_does_not_satisfy_next_command() {
        let mut mock = MockTransport::new();
        // A late OK from an earlier, timed-out command.
        mock.push_incoming(b"\r\nOK\r\n");
        mock.expect(b"AT+CCLK?\r", b"\r\n+CCLK: \"24/01/05,10:30:00+00\"\r\n\r\nOK\r\n");
        let mut modem = make_modem(mock);
        assert_eq!(modem.rtc_time().unwrap().day, 5);
    }

    // -----------------------------------------------------------------
    // Echo on
    // -----------------------------------------------------------------

    #[test]
    fn echo_on_send_sms_bodies_that_read_as_result_codes() {
        let sim = SimulatedModem::new().with_echo(true);
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        assert_eq!(modem.send_sms("123", "OK see you").unwrap(), Some(1));
        assert_eq!(modem.send_sms("123", "Server ERROR fixed").unwrap(), Some(2));
        assert_eq!(modem.send_sms("123", "ERROR").unwrap(), Some(3));
        assert_eq!(modem.send_sms("123", "OK").unwrap(), Some(4));

        let bodies: Vec<String> = handle.outbox().into_iter().map(|sms| sms.body).collect();
        assert_eq!(bodies, ["OK see you", "Server ERROR fixed", "ERROR", "OK"]);
    }

    #[test]
    fn echo_on_read_sms_with_result_code_body() {
        let mut record = SmsRecord {
            status: "REC UNREAD".into(),
            sender: "+15551234567".into(),
            timestamp: "24/01/05,10:30:00+00".into(),
            body: "ERROR".into(),
        };
        let sim = SimulatedModem::new()
            .with_echo(true)
            .with_stored_sms(1, record.clone());
        let mut modem = make_modem(sim);

        let read = modem.read_sms(1).unwrap().into_record().unwrap();
        assert_eq!(read, record);

        record.body = "OK".into();
        let sim = SimulatedModem::new().with_echo(true).with_stored_sms(1, record);
        let mut modem = make_modem(sim);
        assert_eq!(modem.read_sms(1).unwrap().into_record().unwrap().body, "OK");
    }

    #[test]
    fn echo_on_clock_signal_and_power_down() {
        let sim = SimulatedModem::new()
            .with_echo(true)
            .with_clock("23/07/14,08:09:10+08");
        let handle = sim.handle();
        let mut modem = make_modem(sim);

        assert_eq!(modem.rtc_time().unwrap().to_string(), "14/07/23 08:09:10");
        assert_eq!(modem.signal_quality().unwrap().raw(), 18);
        modem.power_down_mode().unwrap();
        assert!(handle.is_powered_down());
    }

    #[test]
    fn confirm_attempts_cover_budget() {
        assert_eq!(
            confirm_attempts(Duration::from_secs(60), Duration::from_secs(1)),
            60
        );
        assert_eq!(
            confirm_attempts(Duration::from_millis(150), Duration::from_millis(100)),
            2
        );
        assert_eq!(confirm_attempts(Duration::ZERO, Duration::from_millis(100)), 1);
    }
}
