//! Formatting helpers for signal readings.
//!
//! Small utility functions that status displays and log lines need when
//! presenting a [`SignalQuality`] to a person.

use crate::types::SignalQuality;

/// Describe a signal reading using the conventional GSM coverage bands.
///
/// | `+CSQ`  | Description   |
/// |---------|---------------|
/// | 0-9     | `"marginal"`  |
/// | 10-14   | `"ok"`        |
/// | 15-19   | `"good"`      |
/// | 20-31   | `"excellent"` |
/// | other   | `"unknown"`   |
///
/// # Example
///
/// ```
/// use modemlib_core::{describe_signal, SignalQuality};
///
/// assert_eq!(describe_signal(SignalQuality::from_raw(18)), "good");
/// assert_eq!(describe_signal(SignalQuality::UNKNOWN), "unknown");
/// ```
pub fn describe_signal(quality: SignalQuality) -> &'static str {
    match quality.raw() {
        0..=9 => "marginal",
        10..=14 => "ok",
        15..=19 => "good",
        20..=31 => "excellent",
        _ => "unknown",
    }
}

/// Convert a signal reading to a 0-5 bar count for status displays.
///
/// Unknown readings show no bars.
///
/// # Example
///
/// ```
/// use modemlib_core::{signal_bars, SignalQuality};
///
/// assert_eq!(signal_bars(SignalQuality::from_raw(31)), 5);
/// assert_eq!(signal_bars(SignalQuality::from_raw(0)), 0);
/// ```
pub fn signal_bars(quality: SignalQuality) -> u8 {
    match quality.raw() {
        0..=1 => 0,
        2..=9 => 1,
        10..=14 => 2,
        15..=19 => 3,
        20..=24 => 4,
        25..=31 => 5,
        _ => 0,
    }
}
