//! SMS messages
//!
//! Sending (text or PDU mode), reading and listing stored messages, and the
//! `+CMTI`/`+CDSI` new-message notifications. Received messages and status
//! reports are read off the SIM, deleted, and handed to the modem's
//! [`ModemHandler`](crate::handler::ModemHandler).

use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::errors::{CommandError, GsmError, Result};
use crate::modem::{GsmModem, Inner, WriteOptions, CTRLZ};
use crate::pdu::{decode_sms_pdu, encode_sms_submit_pdu, encode_text_mode, InformationElement, PduMessage, SubmitOptions};
use crate::types::{DeliveryState, SmsStatus};
use crate::util::{parse_text_mode_time, unquote};

/// Timeout for the `> ` prompt of `AT+CMGS`
const CMGS_PROMPT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// A received SMS
#[derive(Debug, Clone)]
pub struct ReceivedSms {
    pub status: SmsStatus,
    /// Sender
    pub number: String,
    /// Service centre timestamp
    pub time: DateTime<FixedOffset>,
    pub text: String,
    /// Service centre that delivered the message (PDU mode only)
    pub smsc: Option<String>,
    /// User data header elements, e.g. concatenation info of multipart messages
    pub udh: Vec<InformationElement>,
    modem: Weak<Inner>,
}

impl ReceivedSms {
    /// Send `text` back to the sender
    pub async fn reply(&self, text: &str) -> Result<SentSms> {
        GsmModem::upgrade(&self.modem)?
            .send_sms(&self.number, text, false, None)
            .await
    }
}

/// A stored outgoing message (`STO SENT` / `STO UNSENT`)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSubmit {
    pub status: SmsStatus,
    /// Recipient
    pub number: String,
    pub text: String,
    pub udh: Vec<InformationElement>,
}

/// SMS delivery status report
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: SmsStatus,
    /// Reference of the message this report is for
    pub reference: u8,
    /// Recipient of the original message
    pub number: String,
    pub time_sent: DateTime<FixedOffset>,
    pub time_finalized: DateTime<FixedOffset>,
    /// TP-ST; 0 means delivered
    pub delivery_status: u8,
    pub smsc: Option<String>,
}

impl StatusReport {
    pub fn delivered(&self) -> bool {
        self.delivery_status == 0
    }
}

/// A message read from modem storage
#[derive(Debug, Clone)]
pub enum StoredSms {
    Received(ReceivedSms),
    Submit(StoredSubmit),
    StatusReport(StatusReport),
}

struct SentShared {
    number: String,
    text: String,
    reference: u8,
    report: Mutex<Option<StatusReport>>,
}

/// A sent SMS; clones share the delivery report once it arrives
#[derive(Clone)]
pub struct SentSms {
    shared: Arc<SentShared>,
}

impl fmt::Debug for SentSms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentSms")
            .field("number", &self.shared.number)
            .field("reference", &self.shared.reference)
            .field("status", &self.status())
            .finish()
    }
}

impl SentSms {
    fn new(number: &str, text: &str, reference: u8) -> Self {
        Self {
            shared: Arc::new(SentShared {
                number: number.to_string(),
                text: text.to_string(),
                reference,
                report: Mutex::new(None),
            }),
        }
    }

    pub fn number(&self) -> &str {
        &self.shared.number
    }

    pub fn text(&self) -> &str {
        &self.shared.text
    }

    /// Message reference assigned by the modem
    pub fn reference(&self) -> u8 {
        self.shared.reference
    }

    pub fn status(&self) -> DeliveryState {
        match self.shared.report.lock().as_ref() {
            None => DeliveryState::Enroute,
            Some(report) if report.delivered() => DeliveryState::Delivered,
            Some(_) => DeliveryState::Failed,
        }
    }

    /// Delivery report, once received
    pub fn report(&self) -> Option<StatusReport> {
        self.shared.report.lock().clone()
    }

    fn attach_report(&self, report: StatusReport) {
        *self.shared.report.lock() = Some(report);
    }
}

impl GsmModem {
    /// Send an SMS.
    ///
    /// With `wait_for_delivery_report` this blocks until the status report
    /// arrives (up to `delivery_timeout`, 15 s by default).
    #[instrument(skip(self, text))]
    pub async fn send_sms(
        &self,
        destination: &str,
        text: &str,
        wait_for_delivery_report: bool,
        delivery_timeout: Option<Duration>,
    ) -> Result<SentSms> {
        if self.sms_text_mode() && encode_text_mode(text).is_err() {
            debug!("Text does not fit text mode; switching to PDU mode");
            self.write("AT+CMGF=0").await?;
            self.inner.state.lock().sms_text_mode = false;
        }

        let (report_tx, report_rx) = oneshot::channel();
        let reference = if self.sms_text_mode() {
            self.send_sms_text(destination, text).await?
        } else {
            self.send_sms_pdu(destination, text).await?
        };

        let sms = SentSms::new(destination, text, reference);
        self.inner.sent_sms.insert(reference, sms.clone());
        self.inner.metrics.sms_sent.inc();
        info!(reference, "SMS sent");

        if !wait_for_delivery_report {
            return Ok(sms);
        }

        self.inner.report_waiters.insert(reference, report_tx);
        if sms.report().is_some() {
            // Report raced ahead of the waiter
            self.inner.report_waiters.remove(&reference);
            return Ok(sms);
        }
        let timeout = delivery_timeout.unwrap_or(DEFAULT_DELIVERY_TIMEOUT);
        match tokio::time::timeout(timeout, report_rx).await {
            Ok(Ok(_)) => Ok(sms),
            Ok(Err(_)) => Err(GsmError::InvalidState("Delivery report wait was superseded".to_string())),
            Err(_) => {
                self.inner.report_waiters.remove(&reference);
                self.inner.metrics.timeouts.inc();
                warn!(reference, "No delivery report received");
                Err(GsmError::Timeout(None))
            }
        }
    }

    async fn send_sms_text(&self, destination: &str, text: &str) -> Result<u8> {
        self.write_with(
            &format!("AT+CMGS=\"{}\"", destination),
            WriteOptions::default().timeout(CMGS_PROMPT_TIMEOUT).expect("> "),
        )
        .await?;
        let lines = self
            .write_with(
                text,
                WriteOptions::default()
                    .timeout(self.inner.config.sms_send_timeout())
                    .write_term(CTRLZ),
            )
            .await?;
        // The counter tracks messages in both modes
        self.inner.sms_reference.fetch_add(1, Ordering::Relaxed);
        self.parse_cmgs_reference(&lines)
    }

    async fn send_sms_pdu(&self, destination: &str, text: &str) -> Result<u8> {
        let options = SubmitOptions {
            reference: self.inner.sms_reference.fetch_add(1, Ordering::Relaxed),
            request_status_report: self.inner.config.request_status_report,
            ..SubmitOptions::default()
        };
        let pdus = encode_sms_submit_pdu(destination, text, &options)?;
        debug!(parts = pdus.len(), "Sending SMS in PDU mode");

        let mut reference = None;
        for pdu in &pdus {
            self.write_with(
                &format!("AT+CMGS={}", pdu.tpdu_length),
                WriteOptions::default().timeout(CMGS_PROMPT_TIMEOUT).expect("> "),
            )
            .await?;
            let lines = self
                .write_with(
                    &pdu.to_string(),
                    WriteOptions::default()
                        .timeout(self.inner.config.sms_send_timeout())
                        .write_term(CTRLZ),
                )
                .await?;
            reference = Some(self.parse_cmgs_reference(&lines)?);
        }
        reference.ok_or_else(|| CommandError::unexpected("AT+CMGS", "no PDU to send").into())
    }

    fn parse_cmgs_reference(&self, lines: &[String]) -> Result<u8> {
        lines
            .iter()
            .find_map(|line| self.inner.patterns.cmgs.captures(line))
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .map(|reference| (reference % 256) as u8)
            .ok_or_else(|| CommandError::unexpected("AT+CMGS", format!("{:?}", lines)).into())
    }

    /// Read one stored message; `memory` switches the read memory first
    #[instrument(skip(self))]
    pub async fn read_stored_sms(&self, index: u32, memory: Option<&str>) -> Result<StoredSms> {
        self.switch_sms_memory(memory).await?;
        let command = format!("AT+CMGR={}", index);
        let lines = self.write(&command).await?;
        let header = lines
            .first()
            .ok_or_else(|| CommandError::unexpected(command.as_str(), "empty response"))?;
        let body = message_body(&lines[1..]);

        let p = &self.inner.patterns;
        if self.sms_text_mode() {
            if let Some(caps) = p.cmgr_sm_submit.captures(header) {
                return Ok(StoredSms::Submit(StoredSubmit {
                    status: SmsStatus::from_text(&caps[1]).unwrap_or(SmsStatus::StoredUnsent),
                    number: caps[2].to_string(),
                    text: body,
                    udh: Vec::new(),
                }));
            }
            if let Some(caps) = p.cmgr_sm_deliver.captures(header) {
                return Ok(StoredSms::Received(ReceivedSms {
                    status: SmsStatus::from_text(&caps[1]).unwrap_or(SmsStatus::ReceivedUnread),
                    number: caps[2].to_string(),
                    time: parse_text_mode_time(&caps[3])?,
                    text: body,
                    smsc: None,
                    udh: Vec::new(),
                    modem: self.downgrade(),
                }));
            }
            if let Some(caps) = p.cmgr_sm_report.captures(header) {
                return Ok(StoredSms::StatusReport(StatusReport {
                    status: SmsStatus::from_text(unquote(&caps[1])).unwrap_or(SmsStatus::ReceivedUnread),
                    reference: parse_reference(&caps[2]),
                    number: caps[3].to_string(),
                    time_sent: parse_text_mode_time(&caps[4])?,
                    time_finalized: parse_text_mode_time(&caps[5])?,
                    delivery_status: caps[6].parse().unwrap_or(u8::MAX),
                    smsc: None,
                }));
            }
        } else if let Some(caps) = p.cmgr_pdu.captures(header) {
            let status = caps[1]
                .parse()
                .ok()
                .and_then(SmsStatus::from_code)
                .unwrap_or(SmsStatus::ReceivedUnread);
            let pdu = lines
                .get(1)
                .ok_or_else(|| CommandError::unexpected(command.as_str(), "missing PDU"))?;
            return self.stored_from_pdu(status, pdu);
        }

        Err(CommandError::unexpected(command, format!("{:?}", lines)).into())
    }

    fn stored_from_pdu(&self, status: SmsStatus, pdu: &str) -> Result<StoredSms> {
        let decoded = decode_sms_pdu(pdu)?;
        Ok(match decoded.message {
            PduMessage::Deliver { number, time, text, udh, .. } => StoredSms::Received(ReceivedSms {
                status,
                number,
                time,
                text,
                smsc: decoded.smsc,
                udh,
                modem: self.downgrade(),
            }),
            PduMessage::Submit { number, text, udh, .. } => StoredSms::Submit(StoredSubmit {
                status,
                number,
                text,
                udh,
            }),
            PduMessage::StatusReport {
                reference,
                number,
                time,
                discharge,
                status: delivery_status,
            } => StoredSms::StatusReport(StatusReport {
                status,
                reference,
                number,
                time_sent: time,
                time_finalized: discharge,
                delivery_status,
                smsc: decoded.smsc,
            }),
        })
    }

    /// List stored messages with `status`, optionally deleting them after the read
    #[instrument(skip(self))]
    pub async fn list_stored_sms(
        &self,
        status: SmsStatus,
        memory: Option<&str>,
        delete: bool,
    ) -> Result<Vec<StoredSms>> {
        self.switch_sms_memory(memory).await?;
        let text_mode = self.sms_text_mode();
        let command = if text_mode {
            format!("AT+CMGL=\"{}\"", status.as_text())
        } else {
            format!("AT+CMGL={}", status.code())
        };
        let lines = self.write(&command).await?;

        let listed = if text_mode {
            self.parse_cmgl_text(&lines)?
        } else {
            self.parse_cmgl_pdu(&lines)
        };
        debug!(count = listed.len(), "Listed stored messages");

        if delete && !listed.is_empty() {
            if status == SmsStatus::All {
                self.delete_multiple_stored_sms(4, None).await?;
            } else {
                for (index, _) in &listed {
                    self.delete_stored_sms(*index, None).await?;
                }
            }
        }
        Ok(listed.into_iter().map(|(_, sms)| sms).collect())
    }

    fn parse_cmgl_text(&self, lines: &[String]) -> Result<Vec<(u32, StoredSms)>> {
        enum Header<'a> {
            Received {
                status: SmsStatus,
                number: &'a str,
                time: DateTime<FixedOffset>,
            },
            Submit {
                status: SmsStatus,
                number: &'a str,
            },
        }

        let p = &self.inner.patterns;
        let mut messages = Vec::new();
        // Header of the entry being read, `None` while skipping an unknown entry
        let mut current: Option<(u32, Header<'_>, Vec<&str>)> = None;
        let finish = |(index, header, text): (u32, Header<'_>, Vec<&str>)| {
            let text = text.join("\n");
            let sms = match header {
                Header::Received { status, number, time } => StoredSms::Received(ReceivedSms {
                    status,
                    number: number.to_string(),
                    time,
                    text,
                    smsc: None,
                    udh: Vec::new(),
                    modem: self.downgrade(),
                }),
                Header::Submit { status, number } => StoredSms::Submit(StoredSubmit {
                    status,
                    number: number.to_string(),
                    text,
                    udh: Vec::new(),
                }),
            };
            (index, sms)
        };

        for line in lines {
            if line.starts_with("+CMGL:") {
                if let Some(done) = current.take() {
                    messages.push(finish(done));
                }
                if let Some(caps) = p.cmgl_text_submit.captures(line) {
                    let header = Header::Submit {
                        status: SmsStatus::from_text(&caps[2]).unwrap_or(SmsStatus::StoredUnsent),
                        number: caps.get(3).map(|m| m.as_str()).unwrap_or_default(),
                    };
                    current = Some((caps[1].parse().unwrap_or(0), header, Vec::new()));
                } else if let Some(caps) = p.cmgl_text.captures(line) {
                    let header = Header::Received {
                        status: SmsStatus::from_text(&caps[2]).unwrap_or(SmsStatus::ReceivedUnread),
                        number: caps.get(3).map(|m| m.as_str()).unwrap_or_default(),
                        time: parse_text_mode_time(&caps[4])?,
                    };
                    current = Some((caps[1].parse().unwrap_or(0), header, Vec::new()));
                } else {
                    debug!(header = %line, "Skipping stored message with an unrecognised list header");
                }
            } else if line != "OK" {
                if let Some((_, _, text)) = current.as_mut() {
                    text.push(line.as_str());
                }
            }
        }
        if let Some(done) = current.take() {
            messages.push(finish(done));
        }
        Ok(messages)
    }

    fn parse_cmgl_pdu(&self, lines: &[String]) -> Vec<(u32, StoredSms)> {
        let mut messages = Vec::new();
        let mut header: Option<(u32, SmsStatus)> = None;
        for line in lines {
            if let Some(caps) = self.inner.patterns.cmgl_pdu.captures(line) {
                let status = caps[2]
                    .parse()
                    .ok()
                    .and_then(SmsStatus::from_code)
                    .unwrap_or(SmsStatus::ReceivedUnread);
                header = Some((caps[1].parse().unwrap_or(0), status));
                continue;
            }
            // Skip anything that is not a decodable PDU
            if let Some((index, status)) = header {
                match self.stored_from_pdu(status, line) {
                    Ok(sms) => {
                        messages.push((index, sms));
                        header = None;
                    }
                    Err(e) => debug!("Skipping unparsable CMGL line {:?}: {}", line, e),
                }
            }
        }
        messages
    }

    /// Deliver every stored received message to the handler, deleting it from the modem.
    ///
    /// Read messages are processed before unread ones. Returns the number of
    /// messages delivered.
    #[instrument(skip(self))]
    pub async fn process_stored_sms(&self, unread_only: bool) -> Result<usize> {
        let mut messages = Vec::new();
        if !unread_only {
            messages.extend(self.list_stored_sms(SmsStatus::ReceivedRead, None, true).await?);
        }
        messages.extend(self.list_stored_sms(SmsStatus::ReceivedUnread, None, true).await?);

        let mut delivered = 0;
        for message in messages {
            match message {
                StoredSms::Received(sms) => {
                    self.inner.metrics.sms_received.inc();
                    self.inner.handler.on_sms_received(sms).await;
                    delivered += 1;
                }
                StoredSms::StatusReport(report) => {
                    self.inner.metrics.status_reports.inc();
                    self.deliver_status_report(report).await;
                    delivered += 1;
                }
                StoredSms::Submit(_) => {}
            }
        }
        Ok(delivered)
    }

    /// Delete the message at `index`
    #[instrument(skip(self))]
    pub async fn delete_stored_sms(&self, index: u32, memory: Option<&str>) -> Result<()> {
        self.switch_sms_memory(memory).await?;
        self.write(&format!("AT+CMGD={},0", index)).await?;
        Ok(())
    }

    /// Bulk delete with `AT+CMGD=1,<flag>`.
    ///
    /// 1: read messages, 2: read and sent, 3: read, sent and unsent, 4: all.
    #[instrument(skip(self))]
    pub async fn delete_multiple_stored_sms(&self, flag: u8, memory: Option<&str>) -> Result<()> {
        if !(1..=4).contains(&flag) {
            return Err(GsmError::InvalidArgument(format!(
                "Delete flag must be between 1 and 4, got {}",
                flag
            )));
        }
        self.switch_sms_memory(memory).await?;
        self.write(&format!("AT+CMGD=1,{}", flag)).await?;
        Ok(())
    }

    /// Make `memory` the read/delete memory if it is not already
    async fn switch_sms_memory(&self, memory: Option<&str>) -> Result<()> {
        let Some(memory) = memory else {
            return Ok(());
        };
        if self.inner.state.lock().sms_memory.as_deref() == Some(memory) {
            return Ok(());
        }
        self.write(&format!("AT+CPMS=\"{}\"", memory)).await?;
        self.inner.state.lock().sms_memory = Some(memory.to_string());
        Ok(())
    }

    /// `+CMTI: "mem",idx`
    pub(crate) async fn handle_sms_received(&self, line: &str) -> Result<()> {
        let caps = self
            .inner
            .patterns
            .cmti
            .captures(line)
            .ok_or_else(|| CommandError::unexpected("+CMTI", line))?;
        let memory = caps[1].to_string();
        let index = parse_index(&caps[2])?;
        debug!(memory = %memory, index, "New SMS");

        let message = self.read_stored_sms(index, Some(&memory)).await?;
        self.delete_stored_sms(index, None).await?;
        match message {
            StoredSms::Received(sms) => {
                self.inner.metrics.sms_received.inc();
                info!(number = %sms.number, "SMS received");
                self.inner.handler.on_sms_received(sms).await;
            }
            StoredSms::StatusReport(report) => {
                // Some modems announce status reports with +CMTI
                self.inner.metrics.status_reports.inc();
                self.deliver_status_report(report).await;
            }
            StoredSms::Submit(_) => warn!(index, "+CMTI for a stored outgoing message"),
        }
        Ok(())
    }

    /// `+CDSI: "mem",idx`
    pub(crate) async fn handle_sms_status_report(&self, line: &str) -> Result<()> {
        let caps = self
            .inner
            .patterns
            .cdsi
            .captures(line)
            .ok_or_else(|| CommandError::unexpected("+CDSI", line))?;
        let memory = caps[1].to_string();
        let index = parse_index(&caps[2])?;

        let message = self.read_stored_sms(index, Some(&memory)).await?;
        self.delete_stored_sms(index, None).await?;
        match message {
            StoredSms::StatusReport(report) => {
                self.inner.metrics.status_reports.inc();
                self.deliver_status_report(report).await;
                Ok(())
            }
            other => Err(CommandError::unexpected("AT+CMGR", format!("expected status report, got {:?}", other)).into()),
        }
    }

    /// Attach a report to its sent message and wake the sender, or hand it to the handler
    async fn deliver_status_report(&self, report: StatusReport) {
        let tracked = self
            .inner
            .sent_sms
            .get(&report.reference)
            .map(|sms| sms.value().clone());
        if let Some(sms) = tracked {
            sms.attach_report(report.clone());
        }
        info!(reference = report.reference, delivered = report.delivered(), "SMS status report");

        match self.inner.report_waiters.remove(&report.reference) {
            Some((_, waiter)) => {
                let _ = waiter.send(report);
            }
            None => self.inner.handler.on_sms_status_report(report).await,
        }
    }
}

/// Message text lines, without the final `OK`
fn message_body(lines: &[String]) -> String {
    let end = match lines.last() {
        Some(last) if last == "OK" => lines.len() - 1,
        _ => lines.len(),
    };
    lines[..end].join("\n")
}

fn parse_index(s: &str) -> Result<u32> {
    s.parse()
        .map_err(|_| GsmError::InvalidArgument(format!("Invalid message index: {}", s)))
}

fn parse_reference(s: &str) -> u8 {
    s.parse::<u32>().map(|r| (r % 256) as u8).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(delivery_status: u8) -> StatusReport {
        let time = FixedOffset::east_opt(7200)
            .unwrap()
            .with_ymd_and_hms(2013, 4, 29, 19, 58, 0)
            .unwrap();
        StatusReport {
            status: SmsStatus::ReceivedUnread,
            reference: 7,
            number: "+27820001234".to_string(),
            time_sent: time,
            time_finalized: time,
            delivery_status,
            smsc: None,
        }
    }

    #[test]
    fn test_sent_sms_status_follows_report() {
        let sms = SentSms::new("+27820001234", "hello", 7);
        assert_eq!(sms.status(), DeliveryState::Enroute);
        assert!(sms.report().is_none());

        let clone = sms.clone();
        clone.attach_report(report(0));
        assert_eq!(sms.status(), DeliveryState::Delivered);

        sms.attach_report(report(68));
        assert_eq!(clone.status(), DeliveryState::Failed);
    }

    #[test]
    fn test_message_body_strips_ok() {
        let lines: Vec<String> = vec!["line one".into(), "line two".into(), "OK".into()];
        assert_eq!(message_body(&lines), "line one\nline two");
        assert_eq!(message_body(&lines[..1]), "line one");
        assert_eq!(message_body(&[]), "");
    }

    #[test]
    fn test_parse_reference_wraps() {
        assert_eq!(parse_reference("12"), 12);
        assert_eq!(parse_reference("300"), 44);
        assert_eq!(parse_reference("x"), 0);
    }
}
