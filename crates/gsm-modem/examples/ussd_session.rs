//! Start a USSD session, print the response and close the session.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 GSM_DEMO_USSD='*101#' cargo run --example ussd_session
//! ```

use anyhow::Result;
use gsm_modem::{GsmModem, ModemConfig};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("ussd-demo")?;

    let code = std::env::var("GSM_DEMO_USSD").unwrap_or_else(|_| "*101#".to_string());

    let modem = GsmModem::new(ModemConfig::load(None)?);
    modem.connect().await?;
    modem.wait_for_network_coverage(Some(Duration::from_secs(10))).await?;

    info!("Sending USSD string: {}", code);
    let mut response = modem.send_ussd(&code, None).await?;
    println!("USSD reply received: {}", response.message);

    if response.session_active {
        info!("Closing USSD session.");
        response.cancel().await?;
    } else {
        info!("USSD session was ended by network.");
    }

    modem.close().await;
    Ok(())
}
