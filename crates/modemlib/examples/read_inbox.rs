//! Read stored messages and the network clock.
//!
//! Walks the first storage slots of the SIM, printing every message found,
//! then prints the modem's real-time clock.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p modemlib --example read_inbox
//! ```

use modemlib::sim800::Sim800Builder;
use modemlib::SmsLookup;

fn main() -> modemlib::Result<()> {
    let serial_port = "/dev/ttyUSB0";

    let mut modem = Sim800Builder::new().serial_port(serial_port).build()?;

    // Keep the clock in step with the network from now on.
    modem.set_auto_cell_rtc()?;

    for index in 1..=10 {
        match modem.read_sms(index) {
            Ok(SmsLookup::Found(sms)) => {
                println!("[{}] {} {} ({})", index, sms.timestamp, sms.sender, sms.status);
                println!("    {}", sms.body.replace('\n', "\n    "));
            }
            Ok(SmsLookup::NotFound) => {}
            Err(e) => println!("[{}] error: {}", index, e),
        }
    }

    match modem.rtc_time() {
        Ok(now) => println!("\nModem clock: {}", now),
        Err(e) => println!("\nModem clock unavailable: {}", e),
    }

    modem.close()
}
