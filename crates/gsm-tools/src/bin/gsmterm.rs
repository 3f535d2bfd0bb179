//! Interactive terminal for a connected GSM modem

use anyhow::{Context, Result};
use clap::Parser;
use gsm_modem::modem::{CMD_TERM, CTRLZ};
use gsm_modem::serial::SerialComms;
use gsm_modem::GsmError;
use gsm_tools::terminal::{self, Input};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const SMS_PROMPT_TIMEOUT: Duration = Duration::from_secs(3);
/// Pause between the commands of a `load`ed file
const LOAD_DELAY: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "gsmterm")]
#[command(about = "User-friendly terminal for interacting with a connected GSM modem")]
struct Args {
    /// Port to which the GSM modem is connected
    port: String,

    /// Set baud rate
    #[arg(short, long, value_name = "BAUDRATE", default_value_t = 115200)]
    baud: u32,

    /// Raw mode: send every line to the modem as typed
    #[arg(short, long)]
    raw: bool,
}

type StdinLines = Lines<BufReader<Stdin>>;

struct Terminal {
    comms: SerialComms,
    raw: bool,
}

impl Terminal {
    fn prompt(&self) {
        if !self.raw {
            print!("> ");
            let _ = std::io::stdout().flush();
        }
    }

    async fn send(&self, command: &str) {
        let data = format!("{}{}", command, CMD_TERM);
        match self.comms.write(data.as_bytes(), true, COMMAND_TIMEOUT, None).await {
            Ok(lines) => print_lines(&lines),
            Err(GsmError::Timeout(partial)) => {
                print_lines(partial.as_deref().unwrap_or_default());
                println!("<no response>");
            }
            Err(e) => println!("<{}>", e),
        }
    }

    /// `AT+CMGS`: wait for the prompt, then send the next input line as the message body
    async fn send_sms(&self, command: &str, input: &mut StdinLines) -> Result<()> {
        let data = format!("{}{}", command, CMD_TERM);
        let prompt = self
            .comms
            .write(data.as_bytes(), true, SMS_PROMPT_TIMEOUT, Some(&b"> "[..]))
            .await;
        match prompt {
            Ok(_) => {}
            Err(e) => {
                println!("<{}>", e);
                return Ok(());
            }
        }

        println!("Type your SMS message and press enter to send it (an empty line cancels).");
        print!("> ");
        std::io::stdout().flush()?;
        let body = input.next_line().await?.unwrap_or_default();
        if body.is_empty() {
            // ESC aborts the message without sending it
            self.comms.write(b"\x1b", false, COMMAND_TIMEOUT, None).await?;
            println!("Message cancelled.");
            return Ok(());
        }

        let data = format!("{}{}", body, CTRLZ);
        match self.comms.write(data.as_bytes(), true, COMMAND_TIMEOUT, None).await {
            Ok(lines) => print_lines(&lines),
            Err(e) => println!("<{}>", e),
        }
        Ok(())
    }

    async fn load(&self, path: &str) {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                println!("Cannot read \"{}\": {}", path, e);
                return;
            }
        };
        for command in terminal::command_file_lines(&contents) {
            println!("> {}", command);
            self.send(command).await;
            tokio::time::sleep(LOAD_DELAY).await;
        }
    }

    async fn run(&self) -> Result<()> {
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        self.prompt();
        while let Some(line) = input.next_line().await? {
            if self.raw {
                if !line.trim().is_empty() {
                    self.send(line.trim()).await;
                }
                continue;
            }

            let parsed = Input::parse(&line);
            if let Some(text) = terminal::local_response(&parsed) {
                print!("{}", text);
            } else {
                match parsed {
                    Input::Exit => break,
                    Input::Load(path) => self.load(&path).await,
                    Input::SendSms(command) => self.send_sms(&command, &mut input).await?,
                    Input::Command(command) => self.send(&command).await,
                    _ => {}
                }
            }
            self.prompt();
        }
        Ok(())
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    gsm_tools::init_logging("gsmterm", false)?;

    let (comms, mut notifications) = SerialComms::open(&args.port, args.baud)
        .with_context(|| format!("cannot open {}", args.port))?;

    let printer = tokio::spawn(async move {
        while let Some(lines) = notifications.recv().await {
            for line in lines {
                println!("{}", line);
            }
        }
        debug!("Notification stream ended");
    });

    if args.raw {
        println!("Raw terminal connected to {} at {} bps. Press Ctrl-D to exit.", args.port, args.baud);
    } else {
        println!(
            "GSMTerm connected to {} at {} bps. Type \"help\" for help, \"exit\" to leave.",
            args.port, args.baud
        );
    }

    let term = Terminal {
        comms,
        raw: args.raw,
    };
    let result = term.run().await;
    term.comms.close().await;
    printer.abort();
    println!("Done.");
    result
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
    fn test_raw_flag() {
        let args = Args::parse_from(["gsmterm", "/dev/ttyUSB0", "-r", "-b", "9600"]);
        assert!(args.raw);
        assert_eq!(args.baud, 9600);
    }
}
