//! AT command framing and response-buffer primitives.
//!
//! SIM800-class modems speak a line-oriented ASCII protocol. Commands are
//! sent as text terminated with a carriage return; replies come back as one
//! or more `\r\n`-delimited lines ending in a final result code such as
//! `OK` or `ERROR`.
//!
//! # Command format
//!
//! ```text
//! AT<body>\r
//! ```
//!
//! The carriage return is omitted when the caller has to follow up with
//! binary payload, e.g. the SMS body that goes out after the `>` prompt and
//! is closed with [`END_OF_MESSAGE`] rather than a line terminator.

use std::collections::VecDeque;

use bytes::BytesMut;

/// The carriage return that terminates every framed command.
pub const TERMINATOR: u8 = b'\r';

/// The prompt the modem sends when it is ready for an SMS body.
pub const PROMPT: u8 = b'>';

/// Ctrl-Z: ends an SMS body and asks the modem to send it.
pub const END_OF_MESSAGE: u8 = 0x1A;

/// Esc: abandons an SMS body without sending it.
pub const CANCEL: u8 = 0x1B;

/// Final result code for a successful command.
pub const OK: &str = "OK";

/// Final result code for a failed command.
pub const ERROR: &str = "ERROR";

/// Default capacity of a [`ResponseBuffer`], in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// A command ready to be framed: raw content plus the terminator flag.
///
/// Build one from any of the text or byte forms a caller might hold:
///
/// ```
/// use modemlib_text_io::protocol::Command;
///
/// assert_eq!(Command::from("AT").frame(), b"AT\r");
/// assert_eq!(Command::from(String::from("ATE0")).frame(), b"ATE0\r");
/// assert_eq!(Command::from('y').frame(), b"y\r");
/// assert_eq!(Command::from(&b"ATI"[..]).frame(), b"ATI\r");
/// assert_eq!(Command::raw("hello").frame(), b"hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    bytes: Vec<u8>,
    append_terminator: bool,
}

impl Command {
    /// A command that will be terminated with a carriage return.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Command {
            bytes: content.into(),
            append_terminator: true,
        }
    }

    /// Content sent exactly as given, with no carriage return.
    pub fn raw(content: impl Into<Vec<u8>>) -> Self {
        Command {
            bytes: content.into(),
            append_terminator: false,
        }
    }

    /// Drop the carriage return from this command.
    pub fn without_terminator(mut self) -> Self {
        self.append_terminator = false;
        self
    }

    /// Choose whether the carriage return is appended.
    pub fn with_terminator(mut self, append: bool) -> Self {
        self.append_terminator = append;
        self
    }

    /// The command content, without any terminator.
    pub fn content(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether [`frame`](Self::frame) appends a carriage return.
    pub fn appends_terminator(&self) -> bool {
        self.append_terminator
    }

    /// Produce the bytes to put on the wire.
    pub fn frame(&self) -> Vec<u8> {
        frame(&self.bytes, self.append_terminator)
    }
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        Command::new(s.as_bytes())
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        Command::new(s.into_bytes())
    }
}

impl From<&String> for Command {
    fn from(s: &String) -> Self {
        Command::new(s.as_bytes())
    }
}

impl From<char> for Command {
    fn from(c: char) -> Self {
        let mut buf = [0u8; 4];
        Command::new(c.encode_utf8(&mut buf).as_bytes())
    }
}

impl From<&[u8]> for Command {
    fn from(bytes: &[u8]) -> Self {
        Command::new(bytes)
    }
}

impl From<Vec<u8>> for Command {
    fn from(bytes: Vec<u8>) -> Self {
        Command::new(bytes)
    }
}

/// Frame raw command content, optionally appending the carriage return.
///
/// # Example
///
/// ```
/// use modemlib_text_io::protocol::frame;
///
/// assert_eq!(frame(b"AT+CSQ", true), b"AT+CSQ\r");
/// assert_eq!(frame(b"Hello", false), b"Hello");
/// ```
pub fn frame(content: &[u8], append_terminator: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(content.len() + 1);
    buf.extend_from_slice(content);
    if append_terminator {
        buf.push(TERMINATOR);
    }
    buf
}

/// Build an `AT<body>` command.
///
/// ```
/// use modemlib_text_io::protocol::at_command;
///
/// assert_eq!(at_command("").frame(), b"AT\r");
/// assert_eq!(at_command("E0").frame(), b"ATE0\r");
/// assert_eq!(at_command("&W").frame(), b"AT&W\r");
/// ```
pub fn at_command(body: &str) -> Command {
    Command::from(format!("AT{body}"))
}

/// Build an `AT+<body>` extended command.
///
/// ```
/// use modemlib_text_io::protocol::at_plus_command;
///
/// assert_eq!(at_plus_command("CSQ").frame(), b"AT+CSQ\r");
/// assert_eq!(at_plus_command("CMGR=3").frame(), b"AT+CMGR=3\r");
/// ```
pub fn at_plus_command(body: &str) -> Command {
    Command::from(format!("AT+{body}"))
}

/// Headers after which the modem sends message text rather than status.
const PAYLOAD_HEADERS: [&str; 2] = ["+CMGR:", "+CMGL:"];

/// A final result code: the line that ends the modem's reply to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalCode<'a> {
    /// `OK`.
    Ok,
    /// `ERROR`, `+CME ERROR: <n>` or `+CMS ERROR: <n>`, as the whole line so
    /// the numeric cause is preserved.
    Error(&'a str),
}

impl<'a> FinalCode<'a> {
    /// Classify one trimmed line.
    ///
    /// ```
    /// use modemlib_text_io::protocol::FinalCode;
    ///
    /// assert_eq!(FinalCode::from_line("OK"), Some(FinalCode::Ok));
    /// assert_eq!(FinalCode::from_line("+CMS ERROR: 500"), Some(FinalCode::Error("+CMS ERROR: 500")));
    /// assert_eq!(FinalCode::from_line("OK see you"), None);
    /// ```
    pub fn from_line(line: &'a str) -> Option<Self> {
        if line == OK {
            Some(FinalCode::Ok)
        } else if line == ERROR || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR")
        {
            Some(FinalCode::Error(line))
        } else {
            None
        }
    }
}

/// Complete (`\n`-terminated) lines of `text`, trimmed, with their byte
/// offsets. A trailing partial line is not yielded.
fn complete_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').filter_map(move |segment| {
        let start = offset;
        offset += segment.len();
        segment.ends_with('\n').then(|| (start, segment.trim()))
    })
}

/// Find the final result code of a reply and the byte offset of its line.
///
/// Only a complete line that is exactly a result code counts, so `OK` or
/// `ERROR` inside other text (an echoed command, a message body) never
/// ends a reply. Lines following a `+CMGR:` or `+CMGL:` header are message
/// text; there a result code only counts after the blank line the modem
/// puts between the text and its result.
///
/// ```
/// use modemlib_text_io::protocol::{find_final_code, FinalCode};
///
/// let reply = "AT+CMGD=99\r\r\n+CMS ERROR: 321\r\n";
/// assert_eq!(find_final_code(reply), Some((13, FinalCode::Error("+CMS ERROR: 321"))));
///
/// let read = "\r\n+CMGR: \"REC READ\",\"+1555\",\"\",\"24/01/05,10:30:00+00\"\r\nERROR\r\n";
/// assert_eq!(find_final_code(read), None);
/// ```
pub fn find_final_code(text: &str) -> Option<(usize, FinalCode<'_>)> {
    let mut in_payload = false;
    let mut after_blank = false;
    for (offset, line) in complete_lines(text) {
        if let Some(code) = FinalCode::from_line(line) {
            if !in_payload || after_blank {
                return Some((offset, code));
            }
        }
        if PAYLOAD_HEADERS.iter().any(|header| line.starts_with(header)) {
            in_payload = true;
        }
        after_blank = line.is_empty();
    }
    None
}

/// The result code on the last non-empty complete line, if there is one.
///
/// Looser than [`find_final_code`]: used once a reply has gone quiet, for
/// message text that was not followed by a blank line.
pub fn last_final_code(text: &str) -> Option<FinalCode<'_>> {
    complete_lines(text)
        .map(|(_, line)| line)
        .filter(|line| !line.is_empty())
        .last()
        .and_then(FinalCode::from_line)
}

/// Whether a token names a modem error, i.e. the caller is explicitly
/// waiting for an error reply.
pub fn is_error_token(token: &str) -> bool {
    token.contains(ERROR)
}

/// Fixed-capacity byte accumulator for one read cycle.
///
/// When the buffer is full, pushing a byte discards the oldest byte, so the
/// most recent tail of the modem's output (where the final result code
/// lives) is always kept. The buffer never grows beyond its capacity.
///
/// ```
/// use modemlib_text_io::protocol::ResponseBuffer;
///
/// let mut buf = ResponseBuffer::with_capacity(4);
/// for b in b"ABCDEF" {
///     buf.push(*b);
/// }
/// assert_eq!(buf.to_text(), "CDEF");
/// assert_eq!(buf.dropped(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    bytes: VecDeque<u8>,
    capacity: usize,
    dropped: usize,
}

impl ResponseBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ResponseBuffer {
            bytes: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append one byte, discarding the oldest byte if the buffer is full.
    pub fn push(&mut self, byte: u8) {
        if self.bytes.len() == self.capacity {
            self.bytes.pop_front();
            self.dropped += 1;
        }
        self.bytes.push_back(byte);
    }

    /// Logically truncate to empty and reset the dropped-byte counter.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.dropped = 0;
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Maximum number of bytes held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes discarded since the last [`clear`](Self::clear).
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Append the held bytes to `out`, oldest first.
    pub fn append_to(&self, out: &mut BytesMut) {
        let (front, back) = self.bytes.as_slices();
        out.extend_from_slice(front);
        out.extend_from_slice(back);
    }

    /// Copy the held bytes out, oldest first.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.iter().copied().collect()
    }

    /// Decode the held bytes as text, replacing invalid UTF-8.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }
}
