//! Modem session
//!
//! [`GsmModem`] is a cheap, cloneable handle to one attached device. It owns
//! the serial connection, the AT command engine and the device profile
//! detected at connect time. Calls, SMS, USSD and GPRS operations are added
//! to it by their own modules.

mod init;
mod notify;

pub(crate) use notify::{CallStatusPatterns, CallUpdate, Patterns};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::call::Call;
use crate::config::ModemConfig;
use crate::errors::{CommandError, GsmError, Result};
use crate::handler::{ModemHandler, NoopHandler};
use crate::metrics::ModemMetrics;
use crate::serial::{parse_error_code, ModemErrorCode, SerialComms};
use crate::sms::{SentSms, StatusReport};
use crate::types::CallStatusStyle;
use crate::ussd::Ussd;
use crate::util::line_matching;
use modem_telemetry::MetricsSnapshot;

/// Write terminator for ordinary commands
pub const CMD_TERM: &str = "\r";
/// Write terminator for SMS bodies (Ctrl-Z)
pub const CTRLZ: &str = "\x1a";

/// Default `+CME ERROR` code for "busy, try again"
const CME_BUSY: u16 = 515;
/// `+CMS ERROR: 330`: SMSC address unknown
const CMS_SMSC_UNKNOWN: u16 = 330;

const NETWORK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Options for a single command write
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Wait for and return the response
    pub wait: bool,
    /// Response timeout; the configured command timeout when `None`
    pub timeout: Option<Duration>,
    /// Turn error responses into [`CommandError`]s
    pub parse_error: bool,
    /// Appended to the command
    pub write_term: &'static str,
    /// Response is complete once the received data ends with this
    pub expected_term: Option<&'static str>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            wait: true,
            timeout: None,
            parse_error: true,
            write_term: CMD_TERM,
            expected_term: None,
        }
    }
}

impl WriteOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Return error responses as plain lines
    pub fn no_parse_error(mut self) -> Self {
        self.parse_error = false;
        self
    }

    /// Write without waiting for a response
    pub fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }

    pub fn write_term(mut self, term: &'static str) -> Self {
        self.write_term = term;
        self
    }

    pub fn expect(mut self, term: &'static str) -> Self {
        self.expected_term = Some(term);
        self
    }
}

/// Device profile and cached settings
pub(crate) struct ModemState {
    pub sms_text_mode: bool,
    pub smsc: Option<String>,
    pub sms_encoding: Option<String>,
    pub supported_encodings: Option<Vec<String>>,
    pub calling_line_identification: bool,
    pub extended_incoming_call_indication: bool,
    pub sms_read_supported: bool,
    /// Memory `AT+CMGR`/`AT+CMGD` currently operate on
    pub sms_memory: Option<String>,
    pub commands: Option<Vec<String>>,
    pub call_style: CallStatusStyle,
    pub call_patterns: CallStatusPatterns,
    pub dtmf_supported: bool,
    /// DTMF command prefix; `{cid}` is replaced by the call id
    pub dtmf_base: String,
}

impl ModemState {
    fn new(config: &ModemConfig) -> Self {
        Self {
            sms_text_mode: config.sms_text_mode,
            smsc: config.smsc.clone(),
            sms_encoding: None,
            supported_encodings: None,
            calling_line_identification: false,
            extended_incoming_call_indication: false,
            sms_read_supported: true,
            sms_memory: None,
            commands: None,
            call_style: CallStatusStyle::Polling,
            call_patterns: CallStatusPatterns::for_style(CallStatusStyle::Polling),
            dtmf_supported: false,
            dtmf_base: "+VTS=".to_string(),
        }
    }
}

pub(crate) struct Inner {
    pub config: ModemConfig,
    pub comms: RwLock<Option<Arc<SerialComms>>>,
    pub handler: Arc<dyn ModemHandler>,
    pub state: Mutex<ModemState>,
    pub active_calls: DashMap<u32, Call>,
    pub sent_sms: DashMap<u8, SentSms>,
    pub report_waiters: DashMap<u8, oneshot::Sender<StatusReport>>,
    /// Waiting `dial`: receives (call id, call type)
    pub dial_waiter: Mutex<Option<oneshot::Sender<(u32, u8)>>>,
    pub ussd_waiter: Mutex<Option<oneshot::Sender<Ussd>>>,
    pub write_wait_ms: AtomicU64,
    pub sms_reference: AtomicU8,
    pub metrics: ModemMetrics,
    pub patterns: Patterns,
    pub dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to an attached GSM modem
#[derive(Clone)]
pub struct GsmModem {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for GsmModem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsmModem")
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl GsmModem {
    /// Create a modem handle; nothing is opened until [`connect`](Self::connect)
    pub fn new(config: ModemConfig) -> Self {
        Self::with_handler(config, Arc::new(NoopHandler))
    }

    /// Create a modem handle that reports incoming calls and messages to `handler`
    pub fn with_handler(config: ModemConfig, handler: Arc<dyn ModemHandler>) -> Self {
        let state = ModemState::new(&config);
        Self {
            inner: Arc::new(Inner {
                config,
                comms: RwLock::new(None),
                handler,
                state: Mutex::new(state),
                active_calls: DashMap::new(),
                sent_sms: DashMap::new(),
                report_waiters: DashMap::new(),
                dial_waiter: Mutex::new(None),
                ussd_waiter: Mutex::new(None),
                write_wait_ms: AtomicU64::new(0),
                sms_reference: AtomicU8::new(0),
                metrics: ModemMetrics::new(),
                patterns: Patterns::new(),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Rebuild a handle from a weak reference held by a call, message or session
    pub(crate) fn upgrade(weak: &Weak<Inner>) -> Result<Self> {
        weak.upgrade()
            .map(Self::from_inner)
            .ok_or_else(|| GsmError::InvalidState("Modem no longer exists".to_string()))
    }

    pub fn config(&self) -> &ModemConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .comms
            .read()
            .as_ref()
            .map(|c| !c.is_closed())
            .unwrap_or(false)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Calls currently ringing or in progress, keyed by call id
    pub fn active_calls(&self) -> Vec<Call> {
        let mut calls: Vec<Call> = self.inner.active_calls.iter().map(|c| c.value().clone()).collect();
        calls.sort_by_key(Call::id);
        calls
    }

    /// Modem family detected at connect time
    pub fn call_status_style(&self) -> CallStatusStyle {
        self.inner.state.lock().call_style
    }

    pub fn dtmf_supported(&self) -> bool {
        self.inner.state.lock().dtmf_supported
    }

    /// Whether new-message notifications were enabled on connect
    pub fn sms_read_supported(&self) -> bool {
        self.inner.state.lock().sms_read_supported
    }

    /// Whether caller ID (`AT+CLIP=1`) is enabled
    pub fn calling_line_identification(&self) -> bool {
        self.inner.state.lock().calling_line_identification
    }

    /// Whether extended ring indications (`AT+CRC=1`) are enabled
    pub fn extended_incoming_call_indication(&self) -> bool {
        self.inner.state.lock().extended_incoming_call_indication
    }

    pub fn sms_text_mode(&self) -> bool {
        self.inner.state.lock().sms_text_mode
    }

    fn comms(&self) -> Result<Arc<SerialComms>> {
        self.inner
            .comms
            .read()
            .clone()
            .ok_or_else(|| GsmError::InvalidState("Modem is not connected".to_string()))
    }

    /// Close the serial connection and stop notification handling
    pub async fn close(&self) {
        if let Some(dispatcher) = self.inner.dispatcher.lock().take() {
            dispatcher.abort();
        }
        let comms = self.inner.comms.write().take();
        if let Some(comms) = comms {
            comms.close().await;
        }
        self.inner.metrics.active_calls.set(0);
        info!(port = %self.inner.config.port, "Modem closed");
    }

    /// Write a command and return its response lines
    pub async fn write(&self, command: &str) -> Result<Vec<String>> {
        self.write_with(command, WriteOptions::default()).await
    }

    /// Write a command with explicit options.
    ///
    /// `+CME ERROR: 515` (device busy) is retried with a growing delay, up to
    /// the configured `max_busy_retries`.
    pub async fn write_with(&self, command: &str, options: WriteOptions) -> Result<Vec<String>> {
        let comms = self.comms()?;
        let timeout = options.timeout.unwrap_or_else(|| self.inner.config.command_timeout());
        let mut data = Vec::with_capacity(command.len() + options.write_term.len());
        data.extend_from_slice(command.as_bytes());
        data.extend_from_slice(options.write_term.as_bytes());

        let mut busy_retries = 0u32;
        loop {
            debug!("write: {}", command.escape_debug());
            self.inner.metrics.commands_written.inc();
            let started = Instant::now();

            let result = comms
                .write(&data, options.wait, timeout, options.expected_term.map(str::as_bytes))
                .await;
            self.pause_after_write().await;

            let lines = match result {
                Ok(lines) => lines,
                Err(e) => {
                    if e.is_timeout() {
                        self.inner.metrics.timeouts.inc();
                        debug!(command = %command, "Command timed out");
                    }
                    return Err(e);
                }
            };
            if !options.wait {
                return Ok(lines);
            }
            self.inner
                .metrics
                .command_latency_ms
                .record(started.elapsed().as_secs_f64() * 1000.0);

            let failed = options.parse_error
                && lines
                    .last()
                    .map(|status| status.contains("ERROR") || status.starts_with("COMMAND NOT SUPPORT"))
                    .unwrap_or(false);
            if !failed {
                if busy_retries > 0 {
                    debug!("Recovered from busy error; write wait set to 100ms");
                    self.inner.write_wait_ms.store(100, Ordering::Relaxed);
                }
                return Ok(lines);
            }

            let status = lines.last().map(String::as_str).unwrap_or_default();
            let error = match parse_error_code(status) {
                Some(ModemErrorCode::Cme(CME_BUSY)) if busy_retries < self.inner.config.max_busy_retries => {
                    busy_retries += 1;
                    let wait = self.inner.write_wait_ms.fetch_add(200, Ordering::Relaxed) + 200;
                    debug!(wait_ms = wait, attempt = busy_retries, "515 error detected; retrying");
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                    continue;
                }
                Some(ModemErrorCode::Cme(code)) => CommandError::from_cme(command, code),
                Some(ModemErrorCode::Cms(code)) => CommandError::from_cms(command, code),
                None => CommandError::Generic {
                    command: command.to_string(),
                },
            };
            self.inner.metrics.command_errors.inc();
            return Err(error.into());
        }
    }

    async fn pause_after_write(&self) {
        let wait = self.inner.write_wait_ms.load(Ordering::Relaxed);
        if wait > 0 {
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }

    /// First response line of a query command
    async fn query_first_line(&self, command: &str) -> Result<String> {
        self.write(command)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CommandError::unexpected(command, "empty response").into())
    }

    #[instrument(skip(self))]
    pub async fn manufacturer(&self) -> Result<String> {
        self.query_first_line("AT+CGMI").await
    }

    #[instrument(skip(self))]
    pub async fn model(&self) -> Result<String> {
        self.query_first_line("AT+CGMM").await
    }

    /// Software revision, or `None` if the modem does not report one
    #[instrument(skip(self))]
    pub async fn revision(&self) -> Result<Option<String>> {
        match self.query_first_line("AT+CGMR").await {
            Ok(revision) => Ok(Some(revision)),
            Err(GsmError::Command(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serial number (IMEI)
    #[instrument(skip(self))]
    pub async fn imei(&self) -> Result<String> {
        self.query_first_line("AT+CGSN").await
    }

    /// SIM subscriber identity; the SIM may need to be unlocked first
    #[instrument(skip(self))]
    pub async fn imsi(&self) -> Result<String> {
        self.query_first_line("AT+CIMI").await
    }

    /// Name of the network operator the modem is registered with
    #[instrument(skip(self))]
    pub async fn network_name(&self) -> Result<Option<String>> {
        let line = self.query_first_line("AT+COPS?").await?;
        Ok(self
            .inner
            .patterns
            .cops
            .captures(&line)
            .map(|caps| caps[1].to_string()))
    }

    /// Signal strength (0-31), or -1 when unknown
    #[instrument(skip(self))]
    pub async fn signal_strength(&self) -> Result<i32> {
        let lines = self.write("AT+CSQ").await?;
        let caps = line_matching(&self.inner.patterns.csq, &lines)
            .ok_or_else(|| CommandError::unexpected("AT+CSQ", format!("{:?}", lines)))?;
        let strength: i32 = caps[1]
            .parse()
            .map_err(|_| CommandError::unexpected("AT+CSQ", &caps[1]))?;
        Ok(if strength == 99 { -1 } else { strength })
    }

    /// AT commands the modem lists as supported (without the `AT` prefix), or `None` if unknown
    #[instrument(skip(self))]
    pub async fn supported_commands(&self) -> Result<Option<Vec<String>>> {
        match self.write("AT+CLAC").await {
            Ok(lines) => Ok(parse_clac(&lines)),
            Err(GsmError::Command(_)) | Err(GsmError::Timeout(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The SIM's own number (MSISDN), if stored
    #[instrument(skip(self))]
    pub async fn own_number(&self) -> Result<Option<String>> {
        match self.write("AT+CNUM").await {
            Ok(lines) => {
                if let Some(caps) = line_matching(&self.inner.patterns.cnum, &lines) {
                    return Ok(Some(caps[1].to_string()));
                }
                Ok(None)
            }
            Err(GsmError::Command(e)) => {
                // Some modems only expose the number through the "ON" phonebook
                debug!("AT+CNUM failed ({}); reading own-number phonebook", e);
                self.write("AT+CPBS=\"ON\"").await?;
                let lines = self.write("AT+CPBR=1").await?;
                Ok(line_matching(&self.inner.patterns.cpbr, &lines).map(|caps| caps[1].to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Store the SIM's own number; `None` clears it
    #[instrument(skip(self))]
    pub async fn set_own_number(&self, number: Option<&str>) -> Result<()> {
        self.write("AT+CPBS=\"ON\"").await?;
        match number {
            Some(number) => {
                let toa = if number.starts_with('+') { 145 } else { 129 };
                self.write(&format!("AT+CPBW=1,\"{}\",{}", number, toa)).await?
            }
            None => self.write("AT+CPBW=1").await?,
        };
        Ok(())
    }

    /// SMS service centre number; cached after the first successful read
    #[instrument(skip(self))]
    pub async fn smsc(&self) -> Result<Option<String>> {
        if let Some(smsc) = self.inner.state.lock().smsc.clone() {
            return Ok(Some(smsc));
        }
        match self.write("AT+CSCA?").await {
            Ok(lines) => {
                let smsc = line_matching(&self.inner.patterns.csca, &lines).map(|caps| caps[1].to_string());
                if smsc.is_some() {
                    self.inner.state.lock().smsc = smsc.clone();
                }
                Ok(smsc)
            }
            Err(GsmError::Command(e)) if e.is_cms() && e.code() == Some(CMS_SMSC_UNKNOWN) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set the SMS service centre number; a no-op if it is already set to `number`
    #[instrument(skip(self))]
    pub async fn set_smsc(&self, number: &str) -> Result<()> {
        if self.inner.state.lock().smsc.as_deref() == Some(number) {
            return Ok(());
        }
        self.write(&format!("AT+CSCA=\"{}\"", number)).await?;
        self.inner.state.lock().smsc = Some(number.to_string());
        Ok(())
    }

    /// Current TE character set (`AT+CSCS?`), or `UNKNOWN`
    #[instrument(skip(self))]
    pub async fn sms_encoding(&self) -> Result<String> {
        if let Some(encoding) = self.inner.state.lock().sms_encoding.clone() {
            return Ok(encoding);
        }
        let lines = match self.write("AT+CSCS?").await {
            Ok(lines) => lines,
            Err(GsmError::Command(_)) => return Ok("UNKNOWN".to_string()),
            Err(e) => return Err(e),
        };
        match line_matching(&self.inner.patterns.cscs, &lines) {
            Some(caps) => {
                let encoding = caps[1].to_string();
                self.inner.state.lock().sms_encoding = Some(encoding.clone());
                Ok(encoding)
            }
            None => Ok("UNKNOWN".to_string()),
        }
    }

    /// Character sets the modem supports (`AT+CSCS=?`)
    #[instrument(skip(self))]
    pub async fn sms_supported_encodings(&self) -> Result<Vec<String>> {
        if let Some(encodings) = self.inner.state.lock().supported_encodings.clone() {
            return Ok(encodings);
        }
        let lines = match self.write("AT+CSCS=?").await {
            Ok(lines) => lines,
            Err(GsmError::Command(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let encodings = lines
            .iter()
            .find(|line| line.starts_with("+CSCS:"))
            .map(|line| parse_encoding_list(&self.inner.patterns.quoted, line))
            .unwrap_or_default();
        self.inner.state.lock().supported_encodings = Some(encodings.clone());
        Ok(encodings)
    }

    /// Select the TE character set; returns `false` if the modem does not support it
    #[instrument(skip(self))]
    pub async fn set_sms_encoding(&self, encoding: &str) -> Result<bool> {
        let supported = self.sms_supported_encodings().await?;
        if !supported.iter().any(|e| e == encoding) {
            warn!(encoding = %encoding, "Character set not supported by modem");
            return Ok(false);
        }
        self.write(&format!("AT+CSCS=\"{}\"", encoding)).await?;
        self.inner.state.lock().sms_encoding = Some(encoding.to_string());
        Ok(true)
    }

    /// Block until the modem is registered and has signal; returns the signal strength.
    ///
    /// Registration is checked with `AT+CREG?` when the modem supports it.
    #[instrument(skip(self))]
    pub async fn wait_for_network_coverage(&self, timeout: Option<Duration>) -> Result<i32> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let expired = || deadline.map(|d| Instant::now() >= d).unwrap_or(false);

        let mut check_creg = true;
        while check_creg {
            let lines = self.write_with("AT+CREG?", WriteOptions::default().no_parse_error()).await?;
            match line_matching(&self.inner.patterns.creg, &lines) {
                Some(caps) => match &caps[2] {
                    "1" | "5" => break,
                    "3" => return Err(GsmError::InvalidState("Network registration denied".to_string())),
                    "0" => {
                        return Err(GsmError::InvalidState(
                            "Device not searching for network operator".to_string(),
                        ))
                    }
                    _ => {}
                },
                None => check_creg = false,
            }
            if check_creg {
                if expired() {
                    return Err(GsmError::Timeout(None));
                }
                tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
            }
        }

        loop {
            let strength = self.signal_strength().await?;
            if strength > 0 {
                info!(signal = strength, "Network coverage available");
                return Ok(strength);
            }
            if expired() {
                return Err(GsmError::Timeout(None));
            }
            tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
        }
    }
}

/// Parse an `AT+CLAC` response in any of the layouts modems use
pub(crate) fn parse_clac(lines: &[String]) -> Option<Vec<String>> {
    match lines.len() {
        // One comma-separated line plus OK
        2 => {
            let list = lines[0].strip_prefix("+CLAC:").unwrap_or(&lines[0]);
            Some(
                list.split(',')
                    .map(|cmd| cmd.trim().to_string())
                    .filter(|cmd| !cmd.is_empty())
                    .collect(),
            )
        }
        // One command per line, possibly AT-prefixed or with a stray \r
        n if n > 2 => Some(
            lines[..n - 1]
                .iter()
                .map(|line| {
                    let cmd = line.trim();
                    cmd.strip_prefix("AT").unwrap_or(cmd).to_string()
                })
                .filter(|cmd| !cmd.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

/// Parse `+CSCS: ("GSM","UCS2")`
fn parse_encoding_list(quoted: &Regex, line: &str) -> Vec<String> {
    let list = line.split_once(':').map(|(_, list)| list).unwrap_or_default();
    let list = list.trim().trim_start_matches('(').trim_end_matches(')');
    list.split(',')
        .filter_map(|item| quoted.captures(item.trim()).map(|caps| caps[1].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_clac_layouts() {
        assert_eq!(
            parse_clac(&lines(&["+CLAC:&C,D,E,\\S,+CGMM,^DTMF", "OK"])),
            Some(lines(&["&C", "D", "E", "\\S", "+CGMM", "^DTMF"]))
        );
        assert_eq!(parse_clac(&lines(&["+CLAC:Z", "OK"])), Some(lines(&["Z"])));
        assert_eq!(parse_clac(&lines(&["FGH,RTY,UIO", "OK"])), Some(lines(&["FGH", "RTY", "UIO"])));
        assert_eq!(
            parse_clac(&lines(&["A", "BCD", "EFGH", "OK"])),
            Some(lines(&["A", "BCD", "EFGH"]))
        );
        assert_eq!(
            parse_clac(&lines(&["AT&F", "AT&V", "AT&W", "AT+CACM", "OK"])),
            Some(lines(&["&F", "&V", "&W", "+CACM"]))
        );
        assert_eq!(
            parse_clac(&lines(&["Q\r", "QWERTY\r", "^DTMF\r", "OK"])),
            Some(lines(&["Q", "QWERTY", "^DTMF"]))
        );
        assert_eq!(parse_clac(&lines(&["OK"])), None);
    }

    #[test]
    fn test_parse_encoding_list() {
        let quoted = Regex::new(r#"^"([^"]*)""#).unwrap();
        assert_eq!(parse_encoding_list(&quoted, "+CSCS: (\"GSM\")"), vec!["GSM"]);
        assert_eq!(parse_encoding_list(&quoted, "+CSCS:(\"GSM\",\"UCS2\")"), vec!["GSM", "UCS2"]);
        assert_eq!(
            parse_encoding_list(&quoted, "+CSCS:   (  \"GSM\"  ,   \"UCS2\"  )"),
            vec!["GSM", "UCS2"]
        );
        assert_eq!(parse_encoding_list(&quoted, "+CSCS: (\"GSM\" \"UCS2\")"), vec!["GSM"]);
    }

    #[test]
    fn test_write_options_builder() {
        let options = WriteOptions::default()
            .timeout(Duration::from_secs(3))
            .expect("> ")
            .no_parse_error();
        assert!(options.wait);
        assert!(!options.parse_error);
        assert_eq!(options.expected_term, Some("> "));
        assert_eq!(options.write_term, CMD_TERM);
        assert!(!WriteOptions::default().no_wait().wait);
    }
}
