//! SIM800 AT command builders, argument validation, and reply parsers.
//!
//! This module provides functions to construct [`Command`]s for the
//! operations the driver supports (power, signal, SMS, clock, settings) and
//! to parse the corresponding replies from the modem.
//!
//! All functions are pure -- they produce commands or consume reply text
//! without performing any I/O. The caller is responsible for sending the
//! bytes over a transport and feeding the collected transcript back into
//! the parsers.
//!
//! # Reply shapes
//!
//! With verbose result codes every line is wrapped in `\r\n`:
//!
//! ```text
//! \r\n+CSQ: 18,0\r\n\r\nOK\r\n
//! \r\n+CCLK: "24/01/05,10:30:00+00"\r\n\r\nOK\r\n
//! \r\n+CMGR: "REC UNREAD","+15551234567","","24/01/05,10:30:00+00"\r\nHello\r\n\r\nOK\r\n
//! ```

use modemlib_core::{DateTime, Error, PhoneFunctionality, Result, SignalQuality, SmsLookup, SmsRecord};
use modemlib_text_io::protocol::{at_command, at_plus_command, Command, CANCEL, END_OF_MESSAGE};

/// Final reply to `AT+CPOWD=1`, sent in place of `OK`.
pub const POWER_DOWN_REPLY: &str = "NORMAL POWER DOWN";

/// Longest SMS body accepted in text mode (GSM 7-bit, single part).
pub const MAX_SMS_LEN: usize = 160;

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build the bare attention command (`AT`).
pub fn cmd_attention() -> Command {
    at_command("")
}

/// Build a full-functionality reset (`AT+CFUN=1,1`).
pub fn cmd_reset() -> Command {
    at_plus_command("CFUN=1,1")
}

/// Build a normal power-down (`AT+CPOWD=1`).
pub fn cmd_power_down() -> Command {
    at_plus_command("CPOWD=1")
}

/// Build "enter automatic slow clock" (`AT+CSCLK=2`).
///
/// The modem sleeps when the serial line has been idle and wakes on the
/// next incoming character.
pub fn cmd_sleep_mode() -> Command {
    at_plus_command("CSCLK=2")
}

/// Build a "set phone functionality" command (`AT+CFUN=<n>`).
pub fn cmd_set_phone_functionality(mode: PhoneFunctionality) -> Command {
    at_plus_command(&format!("CFUN={}", mode.code()))
}

/// Build a "read signal quality" command (`AT+CSQ`).
pub fn cmd_signal_quality() -> Command {
    at_plus_command("CSQ")
}

/// Build "select SMS text mode" (`AT+CMGF=1`).
pub fn cmd_text_mode() -> Command {
    at_plus_command("CMGF=1")
}

/// Build the first half of an SMS send (`AT+CMGS="<number>"`).
///
/// The modem answers with the `>` prompt; the body then goes out via
/// [`sms_payload`].
pub fn cmd_send_sms(number: &str) -> Command {
    at_plus_command(&format!("CMGS=\"{number}\""))
}

/// Build the SMS body frame: the text followed by Ctrl-Z, no carriage
/// return.
pub fn sms_payload(body: &str) -> Command {
    let mut bytes = Vec::with_capacity(body.len() + 1);
    bytes.extend_from_slice(body.as_bytes());
    bytes.push(END_OF_MESSAGE);
    Command::raw(bytes)
}

/// Build the byte that abandons an SMS body after the prompt (Esc).
pub fn sms_cancel() -> Command {
    Command::raw(vec![CANCEL])
}

/// Build a "read SMS" command (`AT+CMGR=<index>`).
pub fn cmd_read_sms(index: u16) -> Command {
    at_plus_command(&format!("CMGR={index}"))
}

/// Build a "delete SMS" command (`AT+CMGD=<index>`).
pub fn cmd_delete_sms(index: u16) -> Command {
    at_plus_command(&format!("CMGD={index}"))
}

/// Build "delete every stored SMS" (`AT+CMGD=1,4`).
///
/// Delete flag 4 ignores the index and clears all storage.
pub fn cmd_delete_all_sms() -> Command {
    at_plus_command("CMGD=1,4")
}

/// Build a "read real-time clock" command (`AT+CCLK?`).
pub fn cmd_read_clock() -> Command {
    at_plus_command("CCLK?")
}

/// Build "network time synchronisation on/off" (`AT+CLTS=1` / `AT+CLTS=0`).
pub fn cmd_network_time_sync(on: bool) -> Command {
    at_plus_command(if on { "CLTS=1" } else { "CLTS=0" })
}

/// Build "time zone reporting on/off" (`AT+CTZR=1` / `AT+CTZR=0`).
pub fn cmd_time_zone_reporting(on: bool) -> Command {
    at_plus_command(if on { "CTZR=1" } else { "CTZR=0" })
}

/// Build "save user profile" (`AT&W`).
pub fn cmd_save_settings() -> Command {
    at_command("&W")
}

/// Build "network status LED on/off" (`AT+CNETLIGHT=1` / `AT+CNETLIGHT=0`).
pub fn cmd_net_light(on: bool) -> Command {
    at_plus_command(if on { "CNETLIGHT=1" } else { "CNETLIGHT=0" })
}

// ---------------------------------------------------------------
// Argument validation
// ---------------------------------------------------------------

/// Check an SMS storage index. Indices are 1-based.
pub fn validate_index(index: u16) -> Result<u16> {
    if index == 0 {
        return Err(Error::InvalidParameter(
            "SMS index is 1-based, got 0".into(),
        ));
    }
    Ok(index)
}

/// Check a destination number: digits with an optional leading `+`.
pub fn validate_number(number: &str) -> Result<()> {
    let digits = number.strip_prefix('+').unwrap_or(number);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidParameter(format!(
            "phone number must be digits with an optional leading '+', got {number:?}"
        )));
    }
    Ok(())
}

/// Check an SMS body: 1 to 160 characters, no Ctrl-Z or Esc.
pub fn validate_body(body: &str) -> Result<()> {
    let len = body.chars().count();
    if len == 0 || len > MAX_SMS_LEN {
        return Err(Error::InvalidParameter(format!(
            "SMS body must be 1-{MAX_SMS_LEN} characters, got {len}"
        )));
    }
    if body.bytes().any(|b| b == END_OF_MESSAGE || b == CANCEL) {
        return Err(Error::InvalidParameter(
            "SMS body must not contain Ctrl-Z (0x1A) or Esc (0x1B)".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------
// Reply parsers
// ---------------------------------------------------------------

/// Parse an `AT+CSQ` reply into a [`SignalQuality`].
///
/// Takes the first numeric field after `+CSQ:` verbatim, so 99 ("unknown")
/// comes back as [`SignalQuality::UNKNOWN`].
///
/// ```
/// use modemlib_sim800::commands::parse_signal_response;
///
/// let q = parse_signal_response("\r\n+CSQ: 18,0\r\n\r\nOK\r\n").unwrap();
/// assert_eq!(q.raw(), 18);
/// ```
pub fn parse_signal_response(text: &str) -> Result<SignalQuality> {
    let rest = after_prefix(text, "+CSQ:")
        .ok_or_else(|| Error::Parse(format!("no +CSQ: line in {text:?}")))?;
    let digits = leading_digits(rest.trim_start());
    if digits.is_empty() {
        return Err(Error::Parse(format!("+CSQ: without a value in {text:?}")));
    }
    digits
        .parse::<u8>()
        .map(SignalQuality::from_raw)
        .map_err(|e| Error::Parse(format!("invalid +CSQ value {digits:?} ({e})")))
}

/// Parse the message reference out of an SMS send confirmation
/// (`+CMGS: <mr>`). Returns `None` when the line is absent.
pub fn parse_send_reference(text: &str) -> Option<u8> {
    let rest = after_prefix(text, "+CMGS:")?;
    leading_digits(rest.trim_start()).parse().ok()
}

/// Parse an `AT+CCLK?` reply into a [`DateTime`].
///
/// The clock field is fixed width, `yy/MM/dd,hh:mm:ss±zz`; the time zone
/// is checked for shape and then ignored. Anything malformed is an
/// [`Error::Parse`]. Callers that want the all-zero sentinel instead can
/// use `unwrap_or_default()`.
///
/// ```
/// use modemlib_sim800::commands::parse_clock_response;
///
/// let dt = parse_clock_response("+CCLK: \"24/01/05,10:30:00+00\"\r\n\r\nOK\r\n").unwrap();
/// assert_eq!(dt.to_string(), "05/01/24 10:30:00");
///
/// assert!(parse_clock_response("garbage").unwrap_or_default().is_sentinel());
/// ```
pub fn parse_clock_response(text: &str) -> Result<DateTime> {
    const PREFIX: &str = "+CCLK: \"";
    const WIDTH: usize = 20;

    let start = text
        .find(PREFIX)
        .map(|pos| pos + PREFIX.len())
        .ok_or_else(|| Error::Parse(format!("no +CCLK: line in {text:?}")))?;
    let field = text
        .as_bytes()
        .get(start..start + WIDTH)
        .ok_or_else(|| Error::Parse(format!("+CCLK: field truncated in {text:?}")))?;

    let separators = [(2, b'/'), (5, b'/'), (8, b','), (11, b':'), (14, b':')];
    if separators.iter().any(|&(i, sep)| field[i] != sep) || !matches!(field[17], b'+' | b'-') {
        return Err(Error::Parse(format!(
            "+CCLK: field has bad separators: {:?}",
            String::from_utf8_lossy(field)
        )));
    }

    let two_digits = |i: usize| -> Result<u8> {
        match (field[i], field[i + 1]) {
            (a @ b'0'..=b'9', b @ b'0'..=b'9') => Ok((a - b'0') * 10 + (b - b'0')),
            _ => Err(Error::Parse(format!(
                "+CCLK: non-digit at offset {i}: {:?}",
                String::from_utf8_lossy(field)
            ))),
        }
    };

    let dt = DateTime {
        year: two_digits(0)?,
        month: two_digits(3)?,
        day: two_digits(6)?,
        hour: two_digits(9)?,
        minute: two_digits(12)?,
        second: two_digits(15)?,
    };
    two_digits(18)?;

    if !(1..=12).contains(&dt.month)
        || !(1..=31).contains(&dt.day)
        || dt.hour > 23
        || dt.minute > 59
        || dt.second > 59
    {
        return Err(Error::Parse(format!("+CCLK: value out of range: {dt}")));
    }
    Ok(dt)
}

/// Parse an `AT+CMGR` reply into an [`SmsLookup`].
///
/// The header's comma-separated fields are status, sender, alpha, and
/// timestamp (quoted; an empty alpha may be unquoted). The body is every
/// line after the header up to the final `OK`, joined with `\n`.
///
/// A reply with no `+CMGR:` header but a final `OK` means the slot is
/// empty ([`SmsLookup::NotFound`]). A header that cannot be decoded is an
/// [`Error::Parse`].
///
/// ```
/// use modemlib_sim800::commands::parse_sms_response;
/// use modemlib_core::SmsLookup;
///
/// let reply = "+CMGR: \"REC UNREAD\",\"+15551234567\",\"\",\"24/01/05,10:30:00+00\"\r\nHello world\r\nOK\r\n";
/// let record = parse_sms_response(reply).unwrap().into_record().unwrap();
/// assert_eq!(record.sender, "+15551234567");
/// assert_eq!(record.body, "Hello world");
///
/// assert_eq!(parse_sms_response("\r\nOK\r\n").unwrap(), SmsLookup::NotFound);
/// ```
pub fn parse_sms_response(text: &str) -> Result<SmsLookup> {
    let Some(header_start) = text.find("+CMGR:") else {
        if text.lines().any(|line| line.trim() == "OK") {
            return Ok(SmsLookup::NotFound);
        }
        return Err(Error::Parse(format!("no +CMGR: header in {text:?}")));
    };

    let after_header = &text[header_start + "+CMGR:".len()..];
    let (header, rest) = match after_header.find("\r\n") {
        Some(end) => (&after_header[..end], &after_header[end + 2..]),
        None => (after_header, ""),
    };

    let fields = split_fields(header.trim())?;
    if fields.len() < 4 || fields[0].is_empty() {
        return Err(Error::Parse(format!(
            "+CMGR: header needs status, sender, alpha and timestamp: {header:?}"
        )));
    }

    let mut lines: Vec<&str> = rest.split("\r\n").collect();
    trim_trailing_empty(&mut lines);
    if lines.last() == Some(&"OK") {
        lines.pop();
    }
    trim_trailing_empty(&mut lines);

    let mut fields = fields.into_iter();
    let status = fields.next().unwrap_or_default();
    let sender = fields.next().unwrap_or_default();
    let _alpha = fields.next();
    let timestamp = fields.next().unwrap_or_default();

    Ok(SmsLookup::Found(SmsRecord {
        status,
        sender,
        timestamp,
        body: lines.join("\n"),
    }))
}

// ---------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------

fn after_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.find(prefix).map(|pos| &text[pos + prefix.len()..])
}

fn leading_digits(s: &str) -> &str {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    &s[..end]
}

fn trim_trailing_empty(lines: &mut Vec<&str>) {
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
}

/// Split a header into comma-separated fields, honouring double quotes.
///
/// A field that opens a quote must close it and be followed by a comma or
/// the end of the header.
fn split_fields(header: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = header.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => {
                        return Err(Error::Parse(format!(
                            "unterminated quoted field in {header:?}"
                        )))
                    }
                }
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(',') => {}
                Some(c) => {
                    return Err(Error::Parse(format!(
                        "unexpected {c:?} after quoted field in {header:?}"
                    )))
                }
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(',') => break,
                    Some(c) => field.push(c),
                }
            }
        }
        fields.push(field);
    }
}
