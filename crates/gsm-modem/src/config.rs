//! Modem configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::GsmError;

/// Environment variable prefix used by [`ModemConfig::load`]
pub const ENV_PREFIX: &str = "GSM_MODEM";

/// Complete modem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial port device (e.g. `/dev/ttyUSB0` or `COM3`)
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// SIM card PIN, if the SIM is locked
    pub pin: Option<String>,
    /// Use SMS text mode instead of PDU mode
    pub sms_text_mode: bool,
    /// SMSC number to configure on connect (uses the SIM's SMSC when unset)
    pub smsc: Option<String>,
    /// Override for the `AT+CNMI` parameters (e.g. `2,1,0,2`)
    pub cnmi: Option<String>,
    /// Request delivery status reports for sent PDU-mode messages
    pub request_status_report: bool,
    /// Default command response timeout (ms)
    pub command_timeout_ms: u64,
    /// Timeout for the message body of `AT+CMGS` (ms)
    pub sms_send_timeout_ms: u64,
    /// Timeout waiting for a USSD response (ms)
    pub ussd_timeout_ms: u64,
    /// Timeout waiting for a dialled call to be initiated (ms)
    pub dial_timeout_ms: u64,
    /// Call state polling interval for modems without call notifications (ms)
    pub call_poll_interval_ms: u64,
    /// Keep sending `AT` for up to this long on connect, for slow-booting modems (s)
    pub startup_wait_secs: u64,
    /// Maximum retries of a command answered with `+CME ERROR: 515` (device busy)
    pub max_busy_retries: u32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            pin: None,
            sms_text_mode: false,
            smsc: None,
            cnmi: None,
            request_status_report: true,
            command_timeout_ms: 5000,
            sms_send_timeout_ms: 15000,
            ussd_timeout_ms: 15000,
            dial_timeout_ms: 5000,
            call_poll_interval_ms: 500,
            startup_wait_secs: 0,
            max_busy_retries: 10,
        }
    }
}

impl ModemConfig {
    /// Configuration for a port with all other settings at their defaults
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Load configuration: defaults, then the optional file, then `GSM_MODEM_*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, GsmError> {
        let defaults = config::Config::try_from(&ModemConfig::default())
            .map_err(|e| GsmError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Values stay strings until deserialized so PINs keep their leading zeros
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| GsmError::Config(e.to_string()))
    }

    /// Load configuration from a file only (JSON, TOML or YAML by extension)
    pub fn from_file(path: &str) -> Result<Self, GsmError> {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| GsmError::Config(e.to_string()))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn sms_send_timeout(&self) -> Duration {
        Duration::from_millis(self.sms_send_timeout_ms)
    }

    pub fn ussd_timeout(&self) -> Duration {
        Duration::from_millis(self.ussd_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn call_poll_interval(&self) -> Duration {
        Duration::from_millis(self.call_poll_interval_ms)
    }

    pub fn startup_wait(&self) -> Duration {
        Duration::from_secs(self.startup_wait_secs)
    }

    /// `AT+CNMI` parameters to try first
    pub fn cnmi_params(&self) -> &str {
        self.cnmi.as_deref().unwrap_or("2,1,0,2")
    }
}
