//! Switch the radio on or off.
//!
//! Sets the phone functionality level (`full`, `minimum` or `flight`),
//! then reports the signal the modem sees afterwards.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p modemlib --example radio_mode -- flight
//! cargo run -p modemlib --example radio_mode -- full
//! ```

use modemlib::sim800::Sim800Builder;
use modemlib::{signal_bars, Error, PhoneFunctionality};

fn main() -> modemlib::Result<()> {
    let mode = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "full".to_string())
        .parse::<PhoneFunctionality>()
        .map_err(|e| Error::InvalidParameter(format!("{e}")))?;

    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    let mut modem = Sim800Builder::new()
        .serial_port(serial_port)
        .baud_rate(9600)
        .build()?;

    println!("Setting functionality to {}...", mode);
    modem.set_phone_functionality(mode)?;

    let quality = modem.signal_quality()?;
    println!("Signal: {} ({}/5 bars)", quality, signal_bars(quality));

    modem.close()
}
