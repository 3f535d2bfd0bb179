//! # GSM Modem
//!
//! Control of GSM modems over a serial port with AT commands
//! (3GPP TS 27.005 / 27.007):
//!
//! - **Calls** - dial with a status callback or by polling, answer incoming calls, DTMF
//! - **SMS** - text and PDU mode sending, delivery reports, stored message access
//! - **USSD** - interactive sessions
//! - **GPRS** - PDP context management
//! - **PDU** - SMS-SUBMIT / SMS-DELIVER / SMS-STATUS-REPORT codec
//!
//! The modem family (Huawei, Wavecom, ZTE or generic) is detected on connect
//! and decides how call progress is tracked.
//!
//! ## Example
//! ```rust,ignore
//! use gsm_modem::{GsmModem, ModemConfig};
//!
//! let modem = GsmModem::new(ModemConfig::for_port("/dev/ttyUSB0"));
//! modem.connect().await?;
//! modem.wait_for_network_coverage(Some(Duration::from_secs(30))).await?;
//!
//! let sms = modem.send_sms("+27820001234", "Hello", true, None).await?;
//! println!("delivery: {:?}", sms.status());
//! ```

pub mod call;
pub mod config;
pub mod errors;
pub mod gprs;
pub mod handler;
pub mod metrics;
pub mod modem;
pub mod pdu;
pub mod serial;
pub mod sms;
pub mod types;
pub mod ussd;
pub mod util;

// Re-exports
pub use call::Call;
pub use config::ModemConfig;
pub use errors::{CommandError, EncodingError, GsmError, Result};
pub use gprs::PdpContext;
pub use handler::{CallStatusCallback, ModemHandler, NoopHandler};
pub use modem::{GsmModem, WriteOptions};
pub use sms::{ReceivedSms, SentSms, StatusReport, StoredSms, StoredSubmit};
pub use types::*;
pub use ussd::Ussd;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
