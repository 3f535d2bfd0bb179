//! Dial a number, wait for the call to end, and exit.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 GSM_DEMO_NUMBER=+27820001234 cargo run --example dial
//! ```

use anyhow::{bail, Result};
use gsm_modem::{GsmModem, ModemConfig};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("dial-demo")?;

    let Ok(number) = std::env::var("GSM_DEMO_NUMBER") else {
        bail!("set GSM_DEMO_NUMBER to the number to dial");
    };

    let modem = GsmModem::new(ModemConfig::load(None)?);
    modem.connect().await?;
    modem.wait_for_network_coverage(Some(Duration::from_secs(30))).await?;

    let call = modem.dial(&number, None).await?;
    info!(call_id = call.id(), "Call initiated; waiting for it to end");
    while call.active() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    modem.close().await;
    info!("Call ended");
    Ok(())
}
