//! Send an SMS message, optionally waiting for its delivery report

use anyhow::{bail, Result};
use clap::Parser;
use gsm_modem::{DeliveryState, GsmModem};
use gsm_tools::PortArgs;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// How long to wait for network coverage before giving up
const COVERAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "sendsms")]
#[command(about = "Simple tool for sending SMS messages")]
struct Args {
    /// Port to which the GSM modem is connected
    #[arg(short = 'i', long, value_name = "PORT")]
    port: String,

    #[command(flatten)]
    serial: PortArgs,

    /// Wait for the SMS delivery report
    #[arg(short, long)]
    deliver: bool,

    /// AT+CNMI parameters used for message notifications
    #[arg(long, value_name = "PARAMS")]
    cnmi: Option<String>,

    /// Turn on debug logging (serial port dump)
    #[arg(long)]
    debug: bool,

    /// Destination mobile number
    destination: String,

    /// Message to send; read from stdin when omitted
    message: Option<String>,
}

async fn read_message() -> Result<String> {
    println!("\nPlease type your message and press enter to send it:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    gsm_tools::init_logging("sendsms", args.debug)?;

    let mut config = args.serial.modem_config(&args.port)?;
    if args.cnmi.is_some() {
        config.cnmi = args.cnmi.clone();
    }
    let modem = GsmModem::new(config);
    gsm_tools::connect(&modem).await?;

    println!("Checking for network coverage...");
    if let Err(e) = modem.wait_for_network_coverage(Some(COVERAGE_TIMEOUT)).await {
        modem.close().await;
        if e.is_timeout() {
            bail!("Network signal strength is not sufficient, please adjust modem position/antenna and try again.");
        }
        return Err(e.into());
    }

    let text = match args.message {
        Some(message) => message,
        None => read_message().await?,
    };

    if args.deliver {
        println!("\nSending SMS and waiting for delivery report...");
    } else {
        println!("\nSending SMS message...");
    }
    let result = modem.send_sms(&args.destination, &text, args.deliver, None).await;
    modem.close().await;

    let sms = match result {
        Ok(sms) => sms,
        Err(e) if e.is_timeout() => bail!("Failed to send message: the send operation timed out"),
        Err(e) => return Err(e.into()),
    };
    match (sms.report().is_some(), sms.status()) {
        (true, DeliveryState::Delivered) => println!("Message sent and delivered OK."),
        (true, _) => println!("Message sent, but delivery failed."),
        (false, _) => println!("Message sent."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let args = Args::parse_from(["sendsms", "-i", "/dev/ttyUSB0", "-d", "--cnmi", "2,1,0,2", "+27820001234", "Hello"]);
        assert_eq!(args.port, "/dev/ttyUSB0");
        assert_eq!(args.serial.baud, 115200);
        assert!(args.deliver);
        assert_eq!(args.cnmi.as_deref(), Some("2,1,0,2"));
        assert_eq!(args.destination, "+27820001234");
        assert_eq!(args.message.as_deref(), Some("Hello"));

        let args = Args::parse_from(["sendsms", "-i", "COM3", "-b", "9600", "-p", "1234", "0821234567"]);
        assert_eq!(args.serial.baud, 9600);
        assert_eq!(args.serial.pin.as_deref(), Some("1234"));
        assert!(args.message.is_none());
    }
}
