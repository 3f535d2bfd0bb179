//! Dial a number and poll the call state instead of using a callback.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 GSM_DEMO_NUMBER=+27820001234 cargo run --example dial_polling
//! ```

use anyhow::{bail, Result};
use gsm_modem::{GsmModem, ModemConfig};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("dial-polling-demo")?;

    let Ok(number) = std::env::var("GSM_DEMO_NUMBER") else {
        bail!("set GSM_DEMO_NUMBER to the number to dial");
    };

    let modem = GsmModem::new(ModemConfig::load(None)?);
    modem.connect().await?;
    info!("Waiting for network coverage...");
    modem.wait_for_network_coverage(Some(Duration::from_secs(30))).await?;

    info!("Dialing number: {}", number);
    let call = modem.dial(&number, None).await?;

    info!("Waiting for call to be answered/rejected");
    while call.active() && !call.answered() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    if call.answered() {
        info!("Call has been answered; waiting a while...");
        tokio::time::sleep(Duration::from_secs(3)).await;
        if call.active() {
            info!("Playing DTMF tones...");
            if let Err(e) = call.send_dtmf_tone("9515999955951").await {
                warn!("DTMF playback failed: {}", e);
            }
        }
        if call.active() {
            info!("Hanging up call.");
            call.hangup().await?;
        } else {
            info!("Call has been ended by remote party");
        }
    } else {
        info!("Call was not answered by remote party");
    }

    modem.close().await;
    info!("Done");
    Ok(())
}
