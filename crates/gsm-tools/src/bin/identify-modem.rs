//! Identify an attached GSM modem, or dump its responses to diagnostic commands

use anyhow::Result;
use clap::Parser;
use gsm_modem::{GsmModem, WriteOptions};
use gsm_tools::PortArgs;
use serde::Serialize;

/// Commands whose raw responses help when adding support for a new modem
const DEBUG_COMMANDS: &[&str] = &[
    "ATI",
    "AT+CGMI",
    "AT+CGMM",
    "AT+CGMR",
    "AT+CFUN=?",
    "AT+WIND=?",
    "AT+WIND?",
    "AT+CPMS=?",
    "AT+CNMI=?",
    "AT+CVHU=?",
    "AT+CSMP?",
    "AT+GCAP",
    "AT+CPIN?",
    "AT+CLAC",
];

#[derive(Parser, Debug)]
#[command(name = "identify-modem")]
#[command(about = "Identify and debug attached GSM modem")]
struct Args {
    /// Port to which the GSM modem is connected
    port: String,

    #[command(flatten)]
    serial: PortArgs,

    /// Dump raw responses to diagnostic commands
    #[arg(short, long)]
    debug: bool,

    /// Print the modem information as JSON
    #[arg(short, long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ModemInfo {
    manufacturer: String,
    model: String,
    revision: Option<String>,
    imei: Option<String>,
    imsi: Option<String>,
    network: Option<String>,
    signal_strength: i32,
}

impl ModemInfo {
    async fn query(modem: &GsmModem) -> Result<Self> {
        Ok(Self {
            manufacturer: modem.manufacturer().await?,
            model: modem.model().await?,
            revision: modem.revision().await?,
            imei: modem.imei().await.ok(),
            imsi: modem.imsi().await.ok(),
            network: modem.network_name().await?,
            signal_strength: modem.signal_strength().await?,
        })
    }

    fn print(&self) {
        let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());
        println!("\n== MODEM INFORMATION ==\n");
        println!("Manufacturer: {}", self.manufacturer);
        println!("Model: {}", self.model);
        println!("Revision: {}", or_na(&self.revision));
        println!("\nIMEI: {}", or_na(&self.imei));
        println!("IMSI: {}", or_na(&self.imsi));
        println!("\nNetwork: {}", or_na(&self.network));
        println!("Signal strength: {}", self.signal_strength);
        println!();
    }
}

async fn dump_debug_info(modem: &GsmModem) {
    println!("\n== MODEM DEBUG INFORMATION ==\n");
    for command in DEBUG_COMMANDS {
        match modem
            .write_with(command, WriteOptions::default().no_parse_error())
            .await
        {
            Ok(lines) => println!("{}: {:?}", command, lines),
            Err(e) => println!("{}: <{}>", command, e),
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    gsm_tools::init_logging("identify-modem", false)?;

    let modem = GsmModem::new(args.serial.modem_config(&args.port)?);
    gsm_tools::connect(&modem).await?;

    let result = if args.debug {
        dump_debug_info(&modem).await;
        Ok(())
    } else {
        match ModemInfo::query(&modem).await {
            Ok(info) if args.json => serde_json::to_string_pretty(&info)
                .map(|json| println!("{}", json))
                .map_err(Into::into),
            Ok(info) => {
                info.print();
                Ok(())
            }
            Err(e) => Err(e),
        }
    };

    modem.close().await;
    result
}
