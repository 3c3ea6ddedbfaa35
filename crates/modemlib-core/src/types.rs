//! Core types used throughout modemlib.
//!
//! These are the typed payloads produced by the transaction facade: SMS
//! records, RTC timestamps, signal quality readings, and the phone
//! functionality levels accepted by `AT+CFUN`.

use std::fmt;
use std::str::FromStr;

/// Received signal strength in the modem's `+CSQ` scale.
///
/// Values 0-31 map linearly onto -113..-51 dBm; 99 means "not known or not
/// detectable". The raw value is kept verbatim, callers decide what 99 means
/// for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalQuality(u8);

impl SignalQuality {
    /// The value the modem reports when it has no reading.
    pub const UNKNOWN: SignalQuality = SignalQuality(99);

    /// Highest value of the linear scale (-51 dBm or better).
    pub const MAX: u8 = 31;

    /// Wrap a raw `+CSQ` value.
    pub fn from_raw(raw: u8) -> Self {
        SignalQuality(raw)
    }

    /// Return the raw `+CSQ` value.
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Whether the modem reported "not known or not detectable".
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN.0
    }

    /// Convert to dBm, or `None` when the value is outside the 0-31 scale.
    ///
    /// ```
    /// use modemlib_core::SignalQuality;
    ///
    /// assert_eq!(SignalQuality::from_raw(0).to_dbm(), Some(-113));
    /// assert_eq!(SignalQuality::from_raw(18).to_dbm(), Some(-77));
    /// assert_eq!(SignalQuality::UNKNOWN.to_dbm(), None);
    /// ```
    pub fn to_dbm(&self) -> Option<i16> {
        if self.0 <= Self::MAX {
            Some(-113 + 2 * i16::from(self.0))
        } else {
            None
        }
    }

    /// Whether the reading is known and at least `threshold`.
    pub fn is_usable(&self, threshold: u8) -> bool {
        self.0 <= Self::MAX && self.0 >= threshold
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_dbm() {
            Some(dbm) => write!(f, "{} ({dbm} dBm)", self.0),
            None => write!(f, "{} (unknown)", self.0),
        }
    }
}

/// One SMS as read back from modem storage with `AT+CMGR`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmsRecord {
    /// Storage status reported by the modem (e.g. `"REC UNREAD"`).
    pub status: String,
    /// Originating address, usually in international format.
    pub sender: String,
    /// Service-centre timestamp as sent by the modem (`yy/MM/dd,hh:mm:ss±zz`).
    pub timestamp: String,
    /// Message text.
    pub body: String,
}

/// Outcome of looking up one SMS storage slot.
///
/// A reply that could not be decoded is an
/// [`Error::Parse`](crate::error::Error::Parse), never `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsLookup {
    /// The slot held a message.
    Found(SmsRecord),
    /// The modem confirmed the read but the slot is empty.
    NotFound,
}

impl SmsLookup {
    /// Return the record, if one was found.
    pub fn into_record(self) -> Option<SmsRecord> {
        match self {
            SmsLookup::Found(record) => Some(record),
            SmsLookup::NotFound => None,
        }
    }
}

/// Modem real-time clock reading.
///
/// The year has two digits and no century. The all-zero value returned by
/// [`Default`] is the sentinel for "no valid reading".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    pub day: u8,
    pub month: u8,
    pub year: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Whether this is the all-zero sentinel.
    pub fn is_sentinel(&self) -> bool {
        *self == DateTime::default()
    }

    /// Convert to a calendar date-time, assuming the 21st century.
    ///
    /// Returns `None` for impossible dates (e.g. the zero sentinel or
    /// 31 February).
    pub fn to_naive(&self) -> Option<chrono::NaiveDateTime> {
        let date = chrono::NaiveDate::from_ymd_opt(
            2000 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?;
        let time = chrono::NaiveTime::from_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )?;
        Some(chrono::NaiveDateTime::new(date, time))
    }
}

impl fmt::Display for DateTime {
    /// Renders as `dd/MM/yy hh:mm:ss`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:02} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        )
    }
}

/// Phone functionality level set with `AT+CFUN=<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhoneFunctionality {
    /// Minimum functionality (`0`).
    Minimum,
    /// Full functionality (`1`).
    Full,
    /// Transmit and receive RF circuits disabled (`4`).
    DisableRf,
}

impl PhoneFunctionality {
    /// The numeric `<fun>` parameter used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            PhoneFunctionality::Minimum => 0,
            PhoneFunctionality::Full => 1,
            PhoneFunctionality::DisableRf => 4,
        }
    }

    /// Map a wire code back to a functionality level.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PhoneFunctionality::Minimum),
            1 => Some(PhoneFunctionality::Full),
            4 => Some(PhoneFunctionality::DisableRf),
            _ => None,
        }
    }
}

impl fmt::Display for PhoneFunctionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhoneFunctionality::Minimum => "minimum",
            PhoneFunctionality::Full => "full",
            PhoneFunctionality::DisableRf => "disable-rf",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`PhoneFunctionality`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFunctionalityError(String);

impl fmt::Display for ParseFunctionalityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phone functionality: {}", self.0)
    }
}

impl std::error::Error for ParseFunctionalityError {}

impl FromStr for PhoneFunctionality {
    type Err = ParseFunctionalityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimum" | "min" | "0" => Ok(PhoneFunctionality::Minimum),
            "full" | "1" => Ok(PhoneFunctionality::Full),
            "disable-rf" | "flight" | "4" => Ok(PhoneFunctionality::DisableRf),
            _ => Err(ParseFunctionalityError(s.to_string())),
        }
    }
}
