//! Error types for modemlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, modem replies that
//! did not confirm a command, and payloads that could not be decoded are all
//! captured here so callers can tell them apart.

/// The error type for all modemlib operations.
///
/// Every variant answers the question "why did the modem not confirm this
/// action?" from the driver's side. A caller that only cares about success
/// can treat any `Err` as "not confirmed" and re-issue the transaction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port could not be opened, written or read).
    #[error("transport error: {0}")]
    Transport(String),

    /// Nothing matching was received within the allotted attempts.
    ///
    /// This typically indicates the modem is powered off, asleep, or the
    /// baud rate is wrong.
    #[error("timeout waiting for response")]
    Timeout,

    /// Text was received but never contained the expected token.
    ///
    /// Carries the text that was read so the caller can log or inspect it.
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(String),

    /// The modem answered with `ERROR`, `+CME ERROR: n` or `+CMS ERROR: n`.
    #[error("modem error: {0}")]
    ModemError(String),

    /// The reply matched but its payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// An invalid parameter was rejected before anything was sent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A multi-command operation stopped part-way.
    ///
    /// Steps before `step` were confirmed by the modem and are not rolled
    /// back; `completed` is how many of them there were.
    #[error("{operation} aborted at step `{step}` after {completed} completed step(s): {source}")]
    SequenceAborted {
        /// Name of the operation (e.g. `"send_sms"`).
        operation: &'static str,
        /// Name of the step that failed.
        step: &'static str,
        /// Number of steps that completed before the failure.
        completed: usize,
        /// The failure reported by the failing step.
        #[source]
        source: Box<Error>,
    },

    /// The transport has been closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the modem was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Return the innermost error, looking through [`Error::SequenceAborted`].
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::SequenceAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error (or its root cause) is a [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Error::Timeout)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
