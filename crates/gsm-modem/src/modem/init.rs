//! Connect and device initialisation

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, instrument, warn};

use super::notify::spawn_dispatcher;
use super::{CallStatusPatterns, GsmModem, WriteOptions};
use crate::errors::{CommandError, GsmError, Result};
use crate::serial::{NotificationReceiver, SerialComms};
use crate::types::CallStatusStyle;
use crate::util::line_matching;

/// `AT+CPIN?` can take a while on SIMs that are still booting
const PIN_QUERY_TIMEOUT: Duration = Duration::from_secs(15);
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Message memories in order of preference for each `AT+CPMS` slot
const PREFERRED_MEMORIES: [&str; 3] = ["ME", "SM", "SR"];

/// Fallback `AT+CNMI` parameters for modems that reject the configured ones
const CNMI_FALLBACK: &str = "2,1,0,1,0";

impl GsmModem {
    /// Open the configured serial port and initialise the modem.
    ///
    /// The SIM is unlocked with the configured PIN if it asks for one.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<()> {
        let config = &self.inner.config;
        info!(port = %config.port, baud = config.baud_rate, "Connecting to modem");
        let (comms, notifications) = SerialComms::open(&config.port, config.baud_rate)?;
        self.attach(comms, notifications).await
    }

    /// Initialise a modem reachable through an already-open stream
    pub async fn connect_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (comms, notifications) = SerialComms::from_stream(stream);
        self.attach(comms, notifications).await
    }

    async fn attach(&self, comms: SerialComms, notifications: NotificationReceiver) -> Result<()> {
        *self.inner.comms.write() = Some(Arc::new(comms));
        let dispatcher = spawn_dispatcher(self.downgrade(), notifications);
        if let Some(previous) = self.inner.dispatcher.lock().replace(dispatcher) {
            previous.abort();
        }

        if let Err(e) = self.initialize().await {
            error!("Modem initialisation failed: {}", e);
            self.close().await;
            return Err(e);
        }
        info!("Modem initialised");
        Ok(())
    }

    async fn initialize(&self) -> Result<()> {
        let startup_wait = self.inner.config.startup_wait();
        if !startup_wait.is_zero() {
            self.wait_for_startup(startup_wait).await?;
        }

        // Reset; a locked SIM may refuse even this until the PIN is entered
        match self.write("ATZ").await {
            Ok(_) => {}
            Err(GsmError::Command(e)) if e.is_cme() => {
                debug!("ATZ failed ({}); unlocking SIM first", e);
                self.write_with("AT+CMEE=1", WriteOptions::default().no_parse_error()).await?;
                self.unlock_sim().await?;
                self.write("ATZ").await?;
            }
            Err(e) => return Err(e),
        }
        self.write("ATE0").await?;

        self.ensure_full_functionality().await?;

        self.write("AT+CMEE=1").await?;
        self.unlock_sim().await?;

        let commands = self.supported_commands().await?;
        self.detect_device_profile(commands.as_deref()).await?;
        self.inner.state.lock().commands = commands;

        self.write_with("AT+COPS=3,0", WriteOptions::default().no_parse_error()).await?;

        self.setup_sms().await?;
        self.setup_incoming_calls().await?;

        // Allow hanging up with ATH; not every modem knows this
        self.write_with("AT+CVHU=0", WriteOptions::default().no_parse_error()).await?;
        Ok(())
    }

    /// Probe with `AT` until the modem answers
    async fn wait_for_startup(&self, wait: Duration) -> Result<()> {
        info!(wait_secs = wait.as_secs(), "Waiting for modem to start up");
        let deadline = Instant::now() + wait;
        loop {
            let probe = self
                .write_with("AT", WriteOptions::default().timeout(STARTUP_PROBE_TIMEOUT))
                .await;
            match probe {
                Ok(_) => return Ok(()),
                Err(e) if Instant::now() < deadline => debug!("Modem not ready yet: {}", e),
                Err(e) => return Err(e),
            }
        }
    }

    async fn ensure_full_functionality(&self) -> Result<()> {
        let lines = match self.write("AT+CFUN?").await {
            Ok(lines) => lines,
            Err(GsmError::Command(e)) => {
                debug!("AT+CFUN not supported: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let cfun = line_matching(&self.inner.patterns.cfun, &lines).and_then(|caps| caps[1].parse::<u8>().ok());
        if let Some(cfun) = cfun.filter(|&value| value != 1) {
            info!(cfun, "Enabling full modem functionality");
            if let Err(e) = self.write_with("AT+CFUN=1", WriteOptions::default().timeout(Duration::from_secs(10))).await
            {
                match e {
                    GsmError::Command(e) => warn!("Could not set AT+CFUN=1: {}", e),
                    e => return Err(e),
                }
            }
        }
        Ok(())
    }

    /// Enter the PIN if the SIM asks for one
    async fn unlock_sim(&self) -> Result<()> {
        let lines = match self
            .write_with("AT+CPIN?", WriteOptions::default().timeout(PIN_QUERY_TIMEOUT))
            .await
        {
            Ok(lines) => lines,
            // Some modems send +CPIN without a final OK
            Err(GsmError::Timeout(Some(partial))) if partial.iter().any(|l| l.starts_with("+CPIN")) => partial,
            Err(e) => return Err(e),
        };

        let status = line_matching(&self.inner.patterns.cpin, &lines)
            .map(|caps| caps[1].trim().to_string())
            .ok_or_else(|| CommandError::unexpected("AT+CPIN?", format!("{:?}", lines)))?;

        match status.as_str() {
            "READY" => Ok(()),
            "SIM PIN" => match self.inner.config.pin.as_deref() {
                Some(pin) => {
                    info!("Entering SIM PIN");
                    self.write(&format!("AT+CPIN=\"{}\"", pin)).await?;
                    Ok(())
                }
                None => Err(CommandError::PinRequired {
                    command: "AT+CPIN?".to_string(),
                }
                .into()),
            },
            "SIM PUK" => Err(CommandError::PukRequired {
                command: "AT+CPIN?".to_string(),
            }
            .into()),
            other => Err(CommandError::unexpected("AT+CPIN?", other).into()),
        }
    }

    /// Pick DTMF support and the call progress table for this device
    async fn detect_device_profile(&self, commands: Option<&[String]>) -> Result<()> {
        let has = |cmd: &str| commands.map(|c| c.iter().any(|x| x == cmd)).unwrap_or(false);

        let mut style = None;
        let mut enable_wind = commands.is_none();
        if commands.is_some() {
            if has("^CVOICE") {
                self.write_with("AT^CVOICE=0", WriteOptions::default().no_parse_error()).await?;
            }
            if has("+VTS") {
                self.set_dtmf("+VTS=");
            } else if has("^DTMF") {
                self.set_dtmf("^DTMF={cid},");
                style = Some(CallStatusStyle::Huawei);
            }
            if has("^USSDMODE") {
                // Text-mode USSD on Huawei E1752 and relatives
                self.write_with("AT^USSDMODE=0", WriteOptions::default().no_parse_error()).await?;
            }
            if has("+WIND") {
                enable_wind = true;
            } else if has("+ZPAS") {
                style = Some(CallStatusStyle::Zte);
            }
        }

        if enable_wind && style.is_none() && self.enable_wind().await? {
            style = Some(CallStatusStyle::Wavecom);
            if commands.is_none() {
                // Older Wavecom modems support +VTS without listing it
                self.set_dtmf("+VTS=");
            }
        }

        if style.is_none() {
            style = self.probe_call_style().await?;
        }

        let style = style.unwrap_or(CallStatusStyle::Polling);
        info!(style = ?style, "Loaded call status update table");
        let mut state = self.inner.state.lock();
        state.call_style = style;
        state.call_patterns = CallStatusPatterns::for_style(style);
        Ok(())
    }

    /// Turn on Wavecom `+WIND` indications; `false` if the modem has none
    async fn enable_wind(&self) -> Result<bool> {
        let lines = match self.write("AT+WIND?").await {
            Ok(lines) => lines,
            Err(GsmError::Command(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let current = line_matching(&self.inner.patterns.wind, &lines).and_then(|caps| caps[1].parse::<u32>().ok());
        if current != Some(50) {
            if let Err(e) = self.write("AT+WIND=50").await {
                match e {
                    GsmError::Command(_) => return Ok(false),
                    e => return Err(e),
                }
            }
        }
        Ok(true)
    }

    /// Identify the modem family by manufacturer or vendor commands
    async fn probe_call_style(&self) -> Result<Option<CallStatusStyle>> {
        let manufacturer = match self.manufacturer().await {
            Ok(manufacturer) => manufacturer.to_lowercase(),
            Err(GsmError::Command(_)) => String::new(),
            Err(e) => return Err(e),
        };

        if manufacturer.contains("simcom") {
            self.set_dtmf("+VTS=");
            if let Err(e) = self.write("AT+DDET=1").await {
                debug!("DTMF detection not enabled: {}", e);
            }
            return Ok(None);
        }
        if manufacturer.contains("huawei") {
            self.set_dtmf("^DTMF={cid},");
            return Ok(Some(CallStatusStyle::Huawei));
        }

        match self.write("AT+ZPAS?").await {
            Ok(_) => Ok(Some(CallStatusStyle::Zte)),
            Err(GsmError::Command(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_dtmf(&self, base: &str) {
        let mut state = self.inner.state.lock();
        state.dtmf_supported = true;
        state.dtmf_base = base.to_string();
    }

    async fn setup_sms(&self) -> Result<()> {
        let text_mode = self.inner.state.lock().sms_text_mode;
        self.write(if text_mode { "AT+CMGF=1" } else { "AT+CMGF=0" }).await?;

        if let Some(smsc) = self.inner.config.smsc.clone() {
            // Force the write even though the value is already cached
            self.inner.state.lock().smsc = None;
            self.set_smsc(&smsc).await?;
        }

        if text_mode {
            // Some modems drop the SMSC number when CSMP is written
            let smsc = match self.smsc().await {
                Ok(smsc) => smsc,
                Err(GsmError::Command(e)) => {
                    debug!("Could not read SMSC: {}", e);
                    None
                }
                Err(e) => return Err(e),
            };
            self.write("AT+CSMP=49,167,0,0").await?;
            if let Some(smsc) = smsc {
                self.write(&format!("AT+CSCA=\"{}\"", smsc)).await?;
            }
        }

        self.select_sms_memory().await?;

        let cnmi = self.inner.config.cnmi_params().to_string();
        let enabled = self.try_write(&format!("AT+CNMI={}", cnmi)).await?
            || self.try_write(&format!("AT+CNMI={}", CNMI_FALLBACK)).await?;
        if !enabled {
            warn!("Modem does not support new SMS notifications (AT+CNMI); incoming SMS will not be reported");
            self.inner.state.lock().sms_read_supported = false;
        }
        Ok(())
    }

    /// Select message storage from what `AT+CPMS=?` reports
    async fn select_sms_memory(&self) -> Result<()> {
        let lines = match self.write("AT+CPMS=?").await {
            Ok(lines) => lines,
            Err(GsmError::Command(e)) => {
                warn!("SMS storage selection not supported: {}", e);
                self.inner.state.lock().sms_read_supported = false;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let Some(memories) = lines
            .iter()
            .find(|line| line.starts_with("+CPMS:"))
            .and_then(|line| choose_sms_memories(line))
        else {
            warn!("Unexpected AT+CPMS=? response: {:?}", lines);
            self.inner.state.lock().sms_read_supported = false;
            return Ok(());
        };

        let args: Vec<String> = memories.iter().map(|m| format!("\"{}\"", m)).collect();
        self.write(&format!("AT+CPMS={}", args.join(","))).await?;
        self.inner.state.lock().sms_memory = memories.first().cloned();
        Ok(())
    }

    async fn setup_incoming_calls(&self) -> Result<()> {
        if !self.try_write("AT+CLIP=1").await? {
            warn!("Incoming call caller ID (AT+CLIP) not supported by modem");
            return Ok(());
        }
        self.inner.state.lock().calling_line_identification = true;

        let crc = self.try_write("AT+CRC=1").await?;
        if !crc {
            warn!("Extended incoming call indication (AT+CRC) not supported by modem");
        }
        self.inner.state.lock().extended_incoming_call_indication = crc;
        Ok(())
    }

    /// Write a command whose rejection is not fatal; `false` if the modem returned an error
    pub(crate) async fn try_write(&self, command: &str) -> Result<bool> {
        match self.write(command).await {
            Ok(_) => Ok(true),
            Err(GsmError::Command(e)) => {
                debug!("{}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Choose one memory per slot of a `+CPMS: (...),(...),(...)` line
fn choose_sms_memories(line: &str) -> Option<Vec<String>> {
    let (_, list) = line.split_once(':')?;
    let list = list.trim();
    let list = list.strip_prefix('(').unwrap_or(list);
    let list = list.strip_suffix(')').unwrap_or(list);

    list.split("),(")
        .map(|slot| {
            let supported: Vec<&str> = slot
                .split(',')
                .map(|m| m.trim().trim_matches(|c: char| c == '(' || c == ')' || c == '"'))
                .filter(|m| !m.is_empty())
                .collect();
            PREFERRED_MEMORIES
                .iter()
                .find(|m| supported.contains(m))
                .map(|m| m.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_sms_memories() {
        assert_eq!(
            choose_sms_memories(r#"+CPMS: ("ME","MT","SM","SR"),("ME","MT","SM","SR"),("ME","MT","SM","SR")"#),
            Some(vec!["ME".to_string(), "ME".to_string(), "ME".to_string()])
        );
        assert_eq!(
            choose_sms_memories(r#"+CPMS: (("SM","BM","SR"),("SM"))"#),
            Some(vec!["SM".to_string(), "SM".to_string()])
        );
        assert_eq!(choose_sms_memories(r#"+CPMS: ("BM"),("SM")"#), None);
        assert_eq!(choose_sms_memories("+CPMS: "), None);
    }
}
