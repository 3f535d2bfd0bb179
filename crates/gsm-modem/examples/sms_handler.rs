//! Reply "Thank you" to every incoming SMS.
//!
//! ```text
//! GSM_MODEM_PORT=/dev/ttyUSB2 cargo run --example sms_handler
//! ```

use anyhow::Result;
use async_trait::async_trait;
use gsm_modem::{GsmModem, ModemConfig, ModemHandler, ReceivedSms};
use std::sync::Arc;
use tracing::{info, warn};

struct ThankYou;

#[async_trait]
impl ModemHandler for ThankYou {
    async fn on_sms_received(&self, sms: ReceivedSms) {
        info!(from = %sms.number, time = %sms.time, "SMS received: {}", sms.text);
        match sms.reply("Thank you").await {
            Ok(_) => info!("Reply sent"),
            Err(e) => warn!("Failed to reply: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    modem_telemetry::init("sms-handler-demo")?;

    let modem = GsmModem::with_handler(ModemConfig::load(None)?, Arc::new(ThankYou));
    modem.connect().await?;
    info!("Waiting for SMS messages (Ctrl-C to stop)...");

    tokio::signal::ctrl_c().await?;
    modem.close().await;
    Ok(())
}
