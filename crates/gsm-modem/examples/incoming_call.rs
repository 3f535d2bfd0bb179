//! Answer incoming calls after the third ring, then hang up after ten seconds.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 cargo run --example incoming_call
//! ```

use anyhow::Result;
use async_trait::async_trait;
use gsm_modem::{Call, GsmModem, ModemConfig, ModemHandler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const ANSWER_ON_RING: u32 = 3;

struct AnswerOnThirdRing;

#[async_trait]
impl ModemHandler for AnswerOnThirdRing {
    async fn on_incoming_call(&self, call: Call) {
        if call.ring_count() < ANSWER_ON_RING {
            info!(number = ?call.number(), ring = call.ring_count(), "Incoming call");
            return;
        }
        if call.answered() {
            return;
        }

        info!("Answering call...");
        if let Err(e) = call.answer().await {
            warn!("Failed to answer call: {}", e);
            return;
        }
        info!("Call answered; hanging up in 10 seconds");
        tokio::time::sleep(Duration::from_secs(10)).await;
        if call.active() {
            if let Err(e) = call.hangup().await {
                warn!("Hangup failed: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("incoming-call-demo")?;

    let modem = GsmModem::with_handler(ModemConfig::load(None)?, Arc::new(AnswerOnThirdRing));
    modem.connect().await?;
    info!("Waiting for incoming calls (Ctrl-C to stop)...");

    tokio::signal::ctrl_c().await?;
    modem.close().await;
    Ok(())
}
