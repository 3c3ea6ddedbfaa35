//! Send a text message.
//!
//! Demonstrates opening a SIM800 on a serial port, waiting for usable
//! signal, and sending one SMS.
//!
//! # Requirements
//!
//! - A SIM800 board with an active SIM connected via a USB-serial adapter
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p modemlib --example send_sms -- +15551234567 "hello"
//! ```

use std::time::Duration;

use modemlib::sim800::Sim800Builder;
use modemlib::{describe_signal, signal_bars, Error};

fn main() -> modemlib::Result<()> {
    let mut args = std::env::args().skip(1);
    let number = args
        .next()
        .ok_or_else(|| Error::InvalidParameter("usage: send_sms <number> <text>".into()))?;
    let text = args.next().unwrap_or_else(|| "hello from modemlib".to_string());

    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    println!("Opening modem on {}...", serial_port);

    let mut modem = Sim800Builder::new()
        .serial_port(serial_port)
        .baud_rate(9600)
        .sms_timeout(Duration::from_secs(30))
        .build()?;

    modem.ping()?;

    let quality = modem.wait_signal()?;
    println!(
        "Signal: {} ({:?} dBm, {}, {}/5 bars)",
        quality,
        quality.to_dbm(),
        describe_signal(quality),
        signal_bars(quality)
    );
    if !quality.is_usable(modem.config().signal_threshold) {
        println!("Signal is weak; sending anyway.");
    }

    println!("Sending to {}...", number);
    match modem.send_sms(&number, &text)? {
        Some(reference) => println!("Sent, message reference {}", reference),
        None => println!("Sent"),
    }

    modem.close()
}
