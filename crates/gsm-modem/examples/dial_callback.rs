//! Dial a number and track the call through a status callback.
//!
//! Plays a few DTMF tones once the call is answered, then hangs up.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 GSM_DEMO_NUMBER=+27820001234 cargo run --example dial_callback
//! ```

use anyhow::{bail, Result};
use gsm_modem::{Call, GsmError, GsmModem, ModemConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

const DTMF_TONES: &str = "9515999955951";

async fn on_call_status(call: Call, done: Arc<Notify>) {
    if !call.answered() {
        info!("Call has been ended by remote party");
        done.notify_one();
        return;
    }

    info!("Call has been answered; waiting a while...");
    // Some older modems cannot send DTMF immediately after the call connects
    tokio::time::sleep(Duration::from_secs(3)).await;

    if call.active() {
        info!("Playing DTMF tones...");
        match call.send_dtmf_tone(DTMF_TONES).await {
            Ok(()) => {}
            Err(GsmError::Interrupted { message, cause }) => {
                warn!("DTMF playback interrupted: {} ({:?})", message, cause)
            }
            Err(e) => warn!("DTMF playback failed: {}", e),
        }
    }
    if call.active() {
        info!("Hanging up call...");
        if let Err(e) = call.hangup().await {
            warn!("Hangup failed: {}", e);
        }
    }
    done.notify_one();
}

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("dial-callback-demo")?;

    let Ok(number) = std::env::var("GSM_DEMO_NUMBER") else {
        bail!("set GSM_DEMO_NUMBER to the number to dial");
    };

    let modem = GsmModem::new(ModemConfig::load(None)?);
    modem.connect().await?;
    info!("Waiting for network coverage...");
    modem.wait_for_network_coverage(Some(Duration::from_secs(30))).await?;

    info!("Dialing number: {}", number);
    let done = Arc::new(Notify::new());
    let notify = Arc::clone(&done);
    modem
        .dial_with_callback(&number, None, move |call: Call| on_call_status(call, Arc::clone(&notify)))
        .await?;

    done.notified().await;
    modem.close().await;
    info!("Done");
    Ok(())
}
