//! # GSM Tools
//!
//! Shared plumbing for the `sendsms`, `identify-modem` and `gsmterm` binaries.

pub mod atcommands;
pub mod terminal;

use anyhow::{bail, Result};
use gsm_modem::{CommandError, GsmError, GsmModem, ModemConfig};
use modem_telemetry::TelemetryConfig;

/// Serial options common to every tool
#[derive(Debug, Clone, clap::Args)]
pub struct PortArgs {
    /// Set baud rate
    #[arg(short, long, value_name = "BAUDRATE", default_value_t = 115200)]
    pub baud: u32,

    /// SIM card PIN
    #[arg(short, long)]
    pub pin: Option<String>,

    /// Wait for the modem to start, in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = 0)]
    pub wait: u64,
}

impl PortArgs {
    /// Modem configuration for `port`; file and environment settings apply first
    pub fn modem_config(&self, port: &str) -> Result<ModemConfig> {
        let mut config = ModemConfig::load(None)?;
        config.port = port.to_string();
        config.baud_rate = self.baud;
        if self.pin.is_some() {
            config.pin = self.pin.clone();
        }
        config.startup_wait_secs = self.wait;
        Ok(config)
    }
}

/// Start logging for a tool; `debug` turns on the serial dump
pub fn init_logging(tool: &str, debug: bool) -> Result<()> {
    let config = TelemetryConfig::from_env().with_debug(debug);
    modem_telemetry::init_tracing(tool, &config)?;
    Ok(())
}

/// Connect, turning SIM lock failures into instructions for the user
pub async fn connect(modem: &GsmModem) -> Result<()> {
    println!("Connecting to GSM modem on {}...", modem.config().port);
    match modem.connect().await {
        Ok(()) => Ok(()),
        Err(GsmError::Command(CommandError::PinRequired { .. })) => {
            bail!("SIM card PIN required. Please specify a PIN with the -p argument.")
        }
        Err(GsmError::Command(CommandError::IncorrectPin { .. })) => {
            bail!("Incorrect SIM card PIN entered.")
        }
        Err(GsmError::Command(CommandError::PukRequired { .. })) => {
            bail!("SIM card is PUK-locked; unlock it in a phone first.")
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_args_override_config() {
        let args = PortArgs {
            baud: 9600,
            pin: Some("0000".to_string()),
            wait: 5,
        };
        let config = args.modem_config("/dev/ttyS1").unwrap();
        assert_eq!(config.port, "/dev/ttyS1");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.pin.as_deref(), Some("0000"));
        assert_eq!(config.startup_wait_secs, 5);
    }
}
