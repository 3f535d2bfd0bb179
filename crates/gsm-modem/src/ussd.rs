//! USSD sessions

use regex::Regex;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::errors::{GsmError, Result};
use crate::modem::{GsmModem, Inner, WriteOptions};
use crate::types::CallStatusStyle;

/// A USSD response; `session_active` means the network expects a reply
#[derive(Debug, Clone)]
pub struct Ussd {
    pub session_active: bool,
    pub message: String,
    modem: Weak<Inner>,
}

impl Ussd {
    /// Answer the network's prompt within the same session
    pub async fn reply(&self, message: &str) -> Result<Ussd> {
        if !self.session_active {
            return Err(GsmError::InvalidState("USSD session is inactive".to_string()));
        }
        GsmModem::upgrade(&self.modem)?.send_ussd(message, None).await
    }

    /// End the session; does nothing if the network already closed it
    pub async fn cancel(&mut self) -> Result<()> {
        if !self.session_active {
            return Ok(());
        }
        GsmModem::upgrade(&self.modem)?.write("AT+CUSD=2").await?;
        self.session_active = false;
        Ok(())
    }
}

impl GsmModem {
    /// Start a USSD session with `code` (e.g. `*101#`), or send `code` within the open one
    #[instrument(skip(self))]
    pub async fn send_ussd(&self, code: &str, timeout: Option<Duration>) -> Result<Ussd> {
        let timeout = timeout.unwrap_or_else(|| self.inner.config.ussd_timeout());
        let command = format!("AT+CUSD=1,\"{}\",15", code);
        let options = WriteOptions::default().timeout(timeout);

        let (response_tx, response) = oneshot::channel();
        *self.inner.ussd_waiter.lock() = Some(response_tx);
        self.inner.metrics.ussd_sessions.inc();

        let lines = match self.write_with(&command, options).await {
            Ok(lines) => Ok(lines),
            Err(GsmError::Command(e)) if self.call_status_style() == CallStatusStyle::Huawei => {
                // Huawei sticks do PDU-mode USSD by default
                debug!("USSD failed ({}); switching to text-mode USSD and retrying", e);
                match self.write("AT^USSDMODE=0").await {
                    Ok(_) => self.write_with(&command, options).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        let lines = match lines {
            Ok(lines) => lines,
            Err(e) => {
                self.inner.ussd_waiter.lock().take();
                return Err(e);
            }
        };

        // Some modems put the response before the OK
        if let Some((session_active, message)) = parse_cusd(&self.inner.patterns.cusd, &lines) {
            self.inner.ussd_waiter.lock().take();
            return Ok(self.new_ussd(session_active, message));
        }

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(ussd)) => Ok(ussd),
            Ok(Err(_)) => Err(GsmError::InvalidState("USSD request was superseded".to_string())),
            Err(_) => {
                self.inner.ussd_waiter.lock().take();
                self.inner.metrics.timeouts.inc();
                warn!(code = %code, "Timed out waiting for USSD response");
                Err(GsmError::Timeout(None))
            }
        }
    }

    fn new_ussd(&self, session_active: bool, message: String) -> Ussd {
        info!(session_active, "USSD response received");
        Ussd {
            session_active,
            message,
            modem: self.downgrade(),
        }
    }

    /// `+CUSD:` notification, possibly spread over several lines
    pub(crate) async fn handle_ussd(&self, lines: &[String]) {
        let Some((session_active, message)) = parse_cusd(&self.inner.patterns.cusd, lines) else {
            debug!("Unparsable USSD notification: {:?}", lines);
            return;
        };
        let waiter = self.inner.ussd_waiter.lock().take();
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(self.new_ussd(session_active, message));
            }
            None => debug!(message = %message, "USSD notification without a waiting request"),
        }
    }
}

/// Extract (session active, message) from `+CUSD:` lines.
///
/// Some networks send a `+CUSD: 2` or `+CUSD: 3` release line alongside the
/// real response; those are skipped when there is more than one. A release
/// after the response still ends the session. Line breaks inside the message
/// are kept as `\r\n`, as sent by the modem.
fn parse_cusd(pattern: &Regex, lines: &[String]) -> Option<(bool, String)> {
    let text = lines.join("\r\n");
    let matches: Vec<_> = pattern.captures_iter(&text).collect();
    let is_release = |caps: &regex::Captures<'_>| matches!(&caps[1], "2" | "3");
    let chosen = match matches.len() {
        0 => return None,
        1 => 0,
        n => matches.iter().position(|caps| !is_release(caps)).unwrap_or(n - 1),
    };
    let released = matches[chosen + 1..].iter().any(|caps| &caps[1] == "2");
    let caps = &matches[chosen];
    Some((&caps[1] == "1" && !released, caps[2].to_string()))
}
