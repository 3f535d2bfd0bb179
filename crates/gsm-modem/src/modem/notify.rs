//! Unsolicited notification handling

use regex::{Captures, Regex, RegexBuilder};
use std::sync::Weak;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{GsmModem, Inner};
use crate::serial::NotificationReceiver;
use crate::types::CallStatusStyle;

/// Response and notification patterns, compiled once per modem
pub(crate) struct Patterns {
    pub csq: Regex,
    pub creg: Regex,
    pub cops: Regex,
    pub cnum: Regex,
    pub cpbr: Regex,
    pub csca: Regex,
    pub cscs: Regex,
    pub quoted: Regex,
    pub cfun: Regex,
    pub cpin: Regex,
    pub wind: Regex,
    pub clip: Regex,
    pub clcc: Regex,
    pub cmti: Regex,
    pub cdsi: Regex,
    pub cmgs: Regex,
    pub cmgr_sm_deliver: Regex,
    pub cmgr_sm_submit: Regex,
    pub cmgr_sm_report: Regex,
    pub cmgr_pdu: Regex,
    pub cmgl_text: Regex,
    pub cmgl_text_submit: Regex,
    pub cmgl_pdu: Regex,
    pub cusd: Regex,
    pub cgdcont: Regex,
}

impl Default for Patterns {
    fn default() -> Self {
        Self::new()
    }
}

impl Patterns {
    pub fn new() -> Self {
        Self {
            csq: Regex::new(r"^\+CSQ:\s*(\d+),").unwrap(),
            creg: Regex::new(r"^\+CREG:\s*(\d),(\d)$").unwrap(),
            cops: Regex::new(r#"^\+COPS:\s*\d+,\d+,"(.+)"(?:,\d+)?$"#).unwrap(),
            cnum: Regex::new(r#"^\+CNUM:\s*"[^"]*","([^"]+)",\d+"#).unwrap(),
            cpbr: Regex::new(r#"^\+CPBR:\s*\d+,"([^"]+)",\d+"#).unwrap(),
            csca: Regex::new(r#"\+CSCA:\s*"([^,]+)",(\d+)$"#).unwrap(),
            cscs: Regex::new(r#"^\+CSCS:\s*"(\w+)"$"#).unwrap(),
            quoted: Regex::new(r#"^"([^"]*)""#).unwrap(),
            cfun: Regex::new(r"^\+CFUN:\s*(\d+)").unwrap(),
            cpin: Regex::new(r"^\+CPIN:\s*(.+)$").unwrap(),
            wind: Regex::new(r"^\+WIND:\s*(\d+)$").unwrap(),
            clip: Regex::new(r#"^\+CLIP:\s*"(\+?\d+)",(\d+).*$"#).unwrap(),
            clcc: Regex::new(r#"^\+CLCC:\s+(\d+),(\d),(\d),(\d),([^,]),"([^,]*)",(\d+)$"#).unwrap(),
            cmti: Regex::new(r#"^\+CMTI:\s*"([^"]+)",\s*(\d+)$"#).unwrap(),
            cdsi: Regex::new(r#"^\+CDSI:\s*"([^"]+)",(\d+)$"#).unwrap(),
            cmgs: Regex::new(r"^\+CMGS:\s*(\d+)").unwrap(),
            cmgr_sm_deliver: Regex::new(r#"^\+CMGR:\s*"([^"]+)","([^"]+)",[^,]*,"([^"]+)"$"#).unwrap(),
            cmgr_sm_submit: Regex::new(r#"^\+CMGR:\s*"(STO (?:UN)?SENT)","([^"]*)".*$"#).unwrap(),
            cmgr_sm_report: Regex::new(
                r#"^\+CMGR:\s*([^,]*),\d+,(\d+),"?([^"]*)"?,\d*,"([^"]+)","([^"]+)",(\d+)$"#,
            )
            .unwrap(),
            cmgr_pdu: Regex::new(r#"^\+CMGR:\s*(\d*),"?([^"]*)"?,(\d+)$"#).unwrap(),
            cmgl_text: Regex::new(r#"^\+CMGL:\s*(\d+),"([^"]+)","([^"]+)",[^,]*,"([^"]+)"$"#).unwrap(),
            cmgl_text_submit: Regex::new(r#"^\+CMGL:\s*(\d+),"(STO (?:UN)?SENT)","([^"]*)".*$"#).unwrap(),
            cmgl_pdu: Regex::new(r"^\+CMGL:\s*(\d+),\s*(\d+),.*$").unwrap(),
            cusd: RegexBuilder::new(r#"\+CUSD:\s*(\d),\s*"(.*?)",\s*(\d+)"#)
                .dot_matches_new_line(true)
                .build()
                .unwrap(),
            cgdcont: Regex::new(r#"^\+CGDCONT:\s*(\d+),"([^"]+)","([^"]*)","([^"]*)",(\d+),(\d+)"#).unwrap(),
        }
    }
}

/// Call progress notifications for one modem family
#[derive(Debug, Clone)]
pub(crate) struct CallStatusPatterns {
    pub initiated: Option<Regex>,
    pub answered: Option<Regex>,
    pub ended: Option<Regex>,
    pub rejected: Option<Regex>,
}

impl CallStatusPatterns {
    pub fn for_style(style: CallStatusStyle) -> Self {
        let re = |pattern: &str| Some(Regex::new(pattern).unwrap());
        match style {
            CallStatusStyle::Huawei => Self {
                initiated: re(r"^\^ORIG:(\d),(\d)$"),
                answered: re(r"^\^CONN:(\d),(\d)$"),
                ended: re(r"^\^CEND:(\d),(\d+),(\d)+,(\d)+$"),
                rejected: None,
            },
            CallStatusStyle::Wavecom => Self {
                initiated: re(r"^\+WIND: 5,(\d)$"),
                answered: re(r"^OK$"),
                ended: re(r"^\+WIND: 6,(\d)$"),
                rejected: None,
            },
            CallStatusStyle::Zte => Self {
                initiated: None,
                answered: re(r"^CONNECT$"),
                ended: re(r"^HANGUP:\s*(\d+)$"),
                rejected: re(r"^OK$"),
            },
            CallStatusStyle::Polling => Self {
                initiated: None,
                answered: None,
                ended: None,
                rejected: None,
            },
        }
    }
}

/// Call status update recognised in a notification line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallUpdate {
    Initiated { id: u32, call_type: u8 },
    Answered { id: Option<u32> },
    Ended { id: Option<u32> },
    Rejected,
}

impl CallStatusPatterns {
    /// Match a line against this family's call progress table
    pub fn classify(&self, line: &str) -> Option<CallUpdate> {
        fn group(caps: &Captures<'_>, i: usize) -> Option<u32> {
            caps.get(i).and_then(|m| m.as_str().parse().ok())
        }

        if let Some(caps) = self.initiated.as_ref().and_then(|re| re.captures(line)) {
            return Some(CallUpdate::Initiated {
                id: group(&caps, 1).unwrap_or(1),
                call_type: group(&caps, 2).and_then(|t| u8::try_from(t).ok()).unwrap_or(0),
            });
        }
        if let Some(caps) = self.answered.as_ref().and_then(|re| re.captures(line)) {
            return Some(CallUpdate::Answered { id: group(&caps, 1) });
        }
        if let Some(caps) = self.ended.as_ref().and_then(|re| re.captures(line)) {
            return Some(CallUpdate::Ended { id: group(&caps, 1) });
        }
        if self.rejected.as_ref().map(|re| re.is_match(line)).unwrap_or(false) {
            return Some(CallUpdate::Rejected);
        }
        None
    }
}

/// Forward notification batches to their handlers, one task per batch
pub(crate) fn spawn_dispatcher(modem: Weak<Inner>, mut notifications: NotificationReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(lines) = notifications.recv().await {
            let Some(inner) = modem.upgrade() else {
                break;
            };
            let modem = GsmModem::from_inner(inner);
            tokio::spawn(async move { modem.handle_notification(lines).await });
        }
        debug!("Notification dispatcher stopped");
    })
}

impl GsmModem {
    pub(crate) async fn handle_notification(&self, lines: Vec<String>) {
        let mut handled = false;
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].as_str();
            if line.starts_with("+CUSD") {
                // Multi-line USSD messages take up the rest of the batch
                self.handle_ussd(&lines[i..]).await;
                return;
            }
            if line == "RING" || line.starts_with("+CRING") {
                // A following +CLIP line belongs to this ring
                let end = match lines.get(i + 1) {
                    Some(next) if next.starts_with("+CLIP") => i + 2,
                    _ => i + 1,
                };
                self.handle_incoming_call(&lines[i..end]).await;
                handled = true;
                i = end;
                continue;
            }

            let result = if line.starts_with("+CMTI") {
                Some(self.handle_sms_received(line).await)
            } else if line.starts_with("+CDSI") {
                Some(self.handle_sms_status_report(line).await)
            } else if let Some(update) = self.call_update(line) {
                self.handle_call_update(update).await;
                Some(Ok(()))
            } else {
                None
            };

            match result {
                Some(Ok(())) => handled = true,
                Some(Err(e)) => {
                    warn!("Error handling notification {:?}: {}", line, e);
                    handled = true;
                }
                None => {}
            }
            i += 1;
        }

        if !handled {
            debug!("Unhandled unsolicited modem notification: {:?}", lines);
        }
    }

    pub(crate) fn call_update(&self, line: &str) -> Option<CallUpdate> {
        self.inner.state.lock().call_patterns.classify(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_huawei_call_updates() {
        let table = CallStatusPatterns::for_style(CallStatusStyle::Huawei);
        assert_eq!(
            table.classify("^ORIG:1,0"),
            Some(CallUpdate::Initiated { id: 1, call_type: 0 })
        );
        assert_eq!(table.classify("^CONN:1,0"), Some(CallUpdate::Answered { id: Some(1) }));
        assert_eq!(table.classify("^CEND:1,5,29,16"), Some(CallUpdate::Ended { id: Some(1) }));
        assert_eq!(table.classify("^CONF:1"), None);
        assert_eq!(table.classify("OK"), None);
    }

    #[test]
    fn test_wavecom_and_zte_call_updates() {
        let wavecom = CallStatusPatterns::for_style(CallStatusStyle::Wavecom);
        assert_eq!(
            wavecom.classify("+WIND: 5,1"),
            Some(CallUpdate::Initiated { id: 1, call_type: 0 })
        );
        assert_eq!(wavecom.classify("OK"), Some(CallUpdate::Answered { id: None }));
        assert_eq!(wavecom.classify("+WIND: 6,1"), Some(CallUpdate::Ended { id: Some(1) }));
        assert_eq!(wavecom.classify("+WIND: 2"), None);

        let zte = CallStatusPatterns::for_style(CallStatusStyle::Zte);
        assert_eq!(zte.classify("CONNECT"), Some(CallUpdate::Answered { id: None }));
        assert_eq!(zte.classify("HANGUP: 2"), Some(CallUpdate::Ended { id: Some(2) }));
        assert_eq!(zte.classify("OK"), Some(CallUpdate::Rejected));
    }

    #[test]
    fn test_polling_table_is_empty() {
        let polling = CallStatusPatterns::for_style(CallStatusStyle::Polling);
        assert_eq!(polling.classify("OK"), None);
        assert_eq!(polling.classify("^ORIG:1,0"), None);
    }

    #[test]
    fn test_notification_patterns() {
        let p = Patterns::new();
        let caps = p.cmti.captures("+CMTI: \"SM\",1").unwrap();
        assert_eq!((&caps[1], &caps[2]), ("SM", "1"));
        let caps = p.clip.captures("+CLIP: \"+27820001234\",145,,,,0").unwrap();
        assert_eq!((&caps[1], &caps[2]), ("+27820001234", "145"));
        let caps = p
            .cusd
            .captures("+CUSD: 1,\"Bal:$100.00 *\r\nExp 01 Jan 2013\",15")
            .unwrap();
        assert_eq!(&caps[2], "Bal:$100.00 *\r\nExp 01 Jan 2013");
        let caps = p.clcc.captures("+CLCC: 1,0,2,0,0,\"+27820001234\",129").unwrap();
        assert_eq!((&caps[3], &caps[6]), ("2", "+27820001234"));
        assert!(p.cops.is_match("+COPS: 0,0,\"MTN\",2"));
        assert!(p.cops.is_match("+COPS: 0,0,\"I OMNITEL\""));
        assert!(!p.cops.is_match("SOME RANDOM RESPONSE"));
    }
}
