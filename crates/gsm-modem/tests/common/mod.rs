//! Scripted modem on the far end of an in-memory duplex stream

#![allow(dead_code)]

use gsm_modem::{GsmModem, ModemConfig, ModemHandler, NoopHandler};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

/// Per-test response override; `None` falls through to the generic modem
pub type Responder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Handle to the fake device
pub struct FakeDevice {
    commands: Arc<Mutex<Vec<String>>>,
    unsolicited: mpsc::UnboundedSender<String>,
}

impl FakeDevice {
    /// Every command (or SMS body) received so far
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn received(&self, command: &str) -> bool {
        self.commands.lock().iter().any(|c| c == command)
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Send unsolicited lines in a single write
    pub fn notify(&self, lines: &[&str]) {
        let _ = self.unsolicited.send(reply(lines));
    }
}

/// Encode response lines the way a modem sends them
pub fn reply(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("\r\n{}\r\n", line)).collect()
}

/// Responses of a generic modem without vendor extensions
pub fn generic_response(command: &str) -> String {
    match command {
        "AT+CFUN?" => reply(&["+CFUN: 1", "OK"]),
        "AT+CPIN?" => reply(&["+CPIN: READY", "OK"]),
        "AT+CLAC" | "AT+WIND?" | "AT+WIND=50" | "AT+ZPAS?" => reply(&["ERROR"]),
        "AT+CGMI" => reply(&["Generic", "OK"]),
        "AT+CGMM" => reply(&["GSM Modem 1.0", "OK"]),
        "AT+CGMR" => reply(&["REV 42", "OK"]),
        "AT+CGSN" => reply(&["351234567890123", "OK"]),
        "AT+CIMI" => reply(&["655011234567890", "OK"]),
        "AT+CPMS=?" => reply(&[
            r#"+CPMS: ("ME","MT","SM","SR"),("ME","MT","SM","SR"),("ME","MT","SM","SR")"#,
            "OK",
        ]),
        "AT+CSCS=?" => reply(&[r#"+CSCS: ("GSM","UCS2")"#, "OK"]),
        "AT+CSCS?" => reply(&[r#"+CSCS: "GSM""#, "OK"]),
        "AT+CSCA?" => reply(&[r#"+CSCA: "+27829129",145"#, "OK"]),
        "AT+CSQ" => reply(&["+CSQ: 18,99", "OK"]),
        "AT+CREG?" => reply(&["+CREG: 0,1", "OK"]),
        "AT+COPS?" => reply(&[r#"+COPS: 0,0,"Test Network",2"#, "OK"]),
        "AT+CLCC" => reply(&["OK"]),
        cmd if cmd.starts_with("AT+CMGS=") => "\r\n> ".to_string(),
        _ => reply(&["OK"]),
    }
}

pub fn test_config() -> ModemConfig {
    let mut config = ModemConfig::for_port("fake");
    config.command_timeout_ms = 1000;
    config.sms_send_timeout_ms = 1000;
    config.ussd_timeout_ms = 1000;
    config.dial_timeout_ms = 2000;
    config.call_poll_interval_ms = 50;
    config
}

/// Start a fake device answering with `responder`, then the generic responses
pub fn spawn_device(responder: Responder) -> (tokio::io::DuplexStream, FakeDevice) {
    let (client, device) = duplex(8192);
    let (mut reader, mut writer) = tokio::io::split(device);
    let commands = Arc::new(Mutex::new(Vec::new()));
    let (unsolicited, mut unsolicited_rx) = mpsc::unbounded_channel::<String>();

    let log = Arc::clone(&commands);
    tokio::spawn(async move {
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    pending.extend_from_slice(&buf[..n]);
                    // Commands end with CR, SMS bodies with Ctrl-Z
                    while let Some(pos) = pending.iter().position(|&b| b == b'\r' || b == 0x1a) {
                        let command = String::from_utf8_lossy(&pending[..pos]).into_owned();
                        pending.drain(..=pos);
                        if command.is_empty() {
                            continue;
                        }
                        log.lock().push(command.clone());
                        let response = responder(&command).unwrap_or_else(|| generic_response(&command));
                        if !response.is_empty() && writer.write_all(response.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                }
                Some(raw) = unsolicited_rx.recv() => {
                    if writer.write_all(raw.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    (
        client,
        FakeDevice {
            commands,
            unsolicited,
        },
    )
}

pub fn responder<F>(f: F) -> Responder
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Connected generic modem
pub async fn connect(responder: Responder) -> (GsmModem, FakeDevice) {
    connect_with(test_config(), Arc::new(NoopHandler), responder).await
}

pub async fn connect_with(
    config: ModemConfig,
    handler: Arc<dyn ModemHandler>,
    responder: Responder,
) -> (GsmModem, FakeDevice) {
    let (stream, device) = spawn_device(responder);
    let modem = GsmModem::with_handler(config, handler);
    modem.connect_stream(stream).await.expect("connect to fake modem");
    device.clear();
    (modem, device)
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
