//! Common types used across the modem API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored message status (`<stat>` of `+CMGL`/`+CMGR`, 3GPP TS 27.005)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SmsStatus {
    ReceivedUnread = 0,
    ReceivedRead = 1,
    StoredUnsent = 2,
    StoredSent = 3,
    All = 4,
}

impl SmsStatus {
    /// Text-mode status string
    pub fn as_text(&self) -> &'static str {
        match self {
            SmsStatus::ReceivedUnread => "REC UNREAD",
            SmsStatus::ReceivedRead => "REC READ",
            SmsStatus::StoredUnsent => "STO UNSENT",
            SmsStatus::StoredSent => "STO SENT",
            SmsStatus::All => "ALL",
        }
    }

    pub fn from_text(s: &str) -> Option<Self> {
        match s {
            "REC UNREAD" => Some(SmsStatus::ReceivedUnread),
            "REC READ" => Some(SmsStatus::ReceivedRead),
            "STO UNSENT" => Some(SmsStatus::StoredUnsent),
            "STO SENT" => Some(SmsStatus::StoredSent),
            "ALL" => Some(SmsStatus::All),
            _ => None,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SmsStatus::ReceivedUnread),
            1 => Some(SmsStatus::ReceivedRead),
            2 => Some(SmsStatus::StoredUnsent),
            3 => Some(SmsStatus::StoredSent),
            4 => Some(SmsStatus::All),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for SmsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// Direction of a voice call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

/// Delivery state of a sent message, derived from its status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryState {
    /// No status report received yet
    Enroute,
    Delivered,
    Failed,
}

/// Call type reported by the modem (`VOICE` = 0)
pub mod call_type {
    pub const VOICE: u8 = 0;

    /// Map a `+CRING: <type>` string to its numeric call type
    pub fn from_cring(s: &str) -> Option<u8> {
        match s.trim() {
            "VOICE" => Some(VOICE),
            _ => None,
        }
    }
}

/// Modem family, selected at connect time; decides how call progress is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatusStyle {
    /// `^ORIG` / `^CONN` / `^CEND` notifications
    Huawei,
    /// `+WIND: 5` / `OK` / `+WIND: 6` notifications
    Wavecom,
    /// `CONNECT` / `HANGUP:` notifications, no call-initiated update
    Zte,
    /// No notifications: poll `AT+CLCC`
    Polling,
}

impl CallStatusStyle {
    /// Whether the `ATD` command's own response should be awaited
    pub fn waits_for_atd_response(&self) -> bool {
        matches!(self, CallStatusStyle::Huawei | CallStatusStyle::Polling)
    }

    /// Whether the modem reports "call initiated" at all
    pub fn has_call_init_update(&self) -> bool {
        !matches!(self, CallStatusStyle::Zte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_status_text_mapping() {
        for code in 0..=4u8 {
            let status = SmsStatus::from_code(code).unwrap();
            assert_eq!(SmsStatus::from_text(status.as_text()), Some(status));
            assert_eq!(status.code(), code);
        }
        assert_eq!(SmsStatus::from_code(5), None);
        assert_eq!(SmsStatus::from_text("REC"), None);
    }

    #[test]
    fn test_call_status_style_flags() {
        assert!(CallStatusStyle::Polling.waits_for_atd_response());
        assert!(!CallStatusStyle::Wavecom.waits_for_atd_response());
        assert!(!CallStatusStyle::Zte.has_call_init_update());
        assert_eq!(call_type::from_cring("VOICE"), Some(0));
    }
}
