//! Print the SIM card's own phone number.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 cargo run --example own_number
//! ```

use anyhow::Result;
use gsm_modem::{GsmModem, ModemConfig};

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("own-number-demo")?;

    let modem = GsmModem::new(ModemConfig::load(None)?);
    modem.connect().await?;

    match modem.own_number().await? {
        Some(number) => println!("The SIM card phone number is: {}", number),
        None => println!("The SIM card phone number is unknown"),
    }

    modem.close().await;
    Ok(())
}
