//! SMS PDU codec
//!
//! 3GPP TS 23.040 SMS-SUBMIT encoding and SMS-DELIVER / SMS-SUBMIT /
//! SMS-STATUS-REPORT decoding, with concatenation for long messages.

pub mod encoding;
pub mod udh;

pub use encoding::{
    decode_gsm7, decode_semi_octets, decode_ucs2, divide_text_gsm7, divide_text_ucs2,
    encode_gsm7, encode_semi_octets, encode_text_mode, encode_ucs2, is_gsm7, pack_septets,
    unpack_septets,
};
pub use udh::{decode_udh, encode_udh, InformationElement};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EncodingError;
use self::encoding::{MAX_8BIT_LENGTH, MAX_GSM7_LENGTH, MAX_UCS2_LENGTH};

/// TPDU first-octet flags
pub mod first_octet {
    pub const SMS_SUBMIT: u8 = 0x01;
    pub const REJECT_DUPLICATES: u8 = 0x04;
    pub const VALIDITY_RELATIVE: u8 = 0x10;
    pub const VALIDITY_ABSOLUTE: u8 = 0x18;
    pub const STATUS_REPORT_REQUEST: u8 = 0x20;
    pub const UDH_INDICATOR: u8 = 0x40;

    /// Message type indicator mask (bits 1-0)
    pub const MTI_MASK: u8 = 0x03;
    /// Validity period format mask (bits 4-3)
    pub const VPF_MASK: u8 = 0x18;
}

/// Type-of-address values
pub mod toa {
    pub const INTERNATIONAL: u8 = 0x91;
    pub const LOCAL: u8 = 0xA1;
    pub const ALPHANUMERIC: u8 = 0xD0;

    /// Type-of-number mask
    pub const TON_MASK: u8 = 0x70;
    pub const TON_INTERNATIONAL: u8 = 0x10;
    pub const TON_ALPHANUMERIC: u8 = 0x50;
}

/// User data alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataCoding {
    Gsm7,
    EightBit,
    Ucs2,
}

impl DataCoding {
    /// Alphabet of a data coding scheme octet; coding groups other than general data coding read as GSM-7
    pub fn from_dcs(octet: u8) -> Self {
        if octet & 0xC0 != 0 {
            return DataCoding::Gsm7;
        }
        match (octet & 0x0C) >> 2 {
            1 => DataCoding::EightBit,
            2 => DataCoding::Ucs2,
            _ => DataCoding::Gsm7,
        }
    }

    /// DCS octet for a submitted message
    pub fn dcs(&self, flash: bool) -> u8 {
        match (self, flash) {
            (DataCoding::Gsm7, false) => 0x00,
            (DataCoding::EightBit, false) => 0x04,
            (DataCoding::Ucs2, false) => 0x08,
            (DataCoding::Gsm7, true) => 0x10,
            (DataCoding::EightBit, true) => 0x14,
            (DataCoding::Ucs2, true) => 0x18,
        }
    }

    /// Longest single-part message in this alphabet (characters/octets)
    pub fn max_length(&self) -> usize {
        match self {
            DataCoding::Gsm7 => MAX_GSM7_LENGTH,
            DataCoding::EightBit => MAX_8BIT_LENGTH,
            DataCoding::Ucs2 => MAX_UCS2_LENGTH,
        }
    }
}

/// An encoded PDU, ready for `AT+CMGS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// Complete PDU including the SMSC field
    pub data: Vec<u8>,
    /// Length of the TPDU part (what `AT+CMGS=<n>` expects)
    pub tpdu_length: usize,
}

impl fmt::Display for Pdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.data))
    }
}

/// Validity period of a submitted message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Relative(Duration),
    Absolute(DateTime<FixedOffset>),
}

/// Parameters of an SMS-SUBMIT PDU besides destination and text
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// TP-MR message reference, also used as the concatenation reference
    pub reference: u8,
    pub validity: Option<Validity>,
    /// SMSC to use; the device's configured SMSC when `None`
    pub smsc: Option<String>,
    pub request_status_report: bool,
    pub reject_duplicates: bool,
    /// Class 0 (flash) message
    pub send_flash: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            reference: 0,
            validity: None,
            smsc: None,
            request_status_report: true,
            reject_duplicates: false,
            send_flash: false,
        }
    }
}

/// A decoded PDU
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPdu {
    pub smsc: Option<String>,
    pub tpdu_length: usize,
    pub message: PduMessage,
}

/// TPDU contents by message type
#[derive(Debug, Clone, PartialEq)]
pub enum PduMessage {
    Deliver {
        number: String,
        protocol_id: u8,
        time: DateTime<FixedOffset>,
        text: String,
        udh: Vec<InformationElement>,
    },
    Submit {
        reference: u8,
        number: String,
        protocol_id: u8,
        validity: Option<Validity>,
        text: String,
        udh: Vec<InformationElement>,
    },
    StatusReport {
        reference: u8,
        number: String,
        /// Service centre timestamp of the original message
        time: DateTime<FixedOffset>,
        /// Time the final delivery status was reached
        discharge: DateTime<FixedOffset>,
        /// TP-ST; 0 means delivered
        status: u8,
    },
}

impl DecodedPdu {
    pub fn number(&self) -> &str {
        match &self.message {
            PduMessage::Deliver { number, .. }
            | PduMessage::Submit { number, .. }
            | PduMessage::StatusReport { number, .. } => number,
        }
    }

    /// Message text; empty for status reports
    pub fn text(&self) -> &str {
        match &self.message {
            PduMessage::Deliver { text, .. } | PduMessage::Submit { text, .. } => text,
            PduMessage::StatusReport { .. } => "",
        }
    }

    pub fn udh(&self) -> &[InformationElement] {
        match &self.message {
            PduMessage::Deliver { udh, .. } | PduMessage::Submit { udh, .. } => udh,
            PduMessage::StatusReport { .. } => &[],
        }
    }
}

/// Encode SMS-SUBMIT PDU(s); texts over the single-part limit are split with a concatenation header
pub fn encode_sms_submit_pdu(
    number: &str,
    text: &str,
    options: &SubmitOptions,
) -> Result<Vec<Pdu>, EncodingError> {
    let mut fo = first_octet::SMS_SUBMIT;
    let validity = match &options.validity {
        Some(Validity::Relative(period)) => {
            fo |= first_octet::VALIDITY_RELATIVE;
            vec![encode_relative_validity(*period)?]
        }
        Some(Validity::Absolute(time)) => {
            fo |= first_octet::VALIDITY_ABSOLUTE;
            encode_timestamp(time)?
        }
        None => Vec::new(),
    };
    if options.reject_duplicates {
        fo |= first_octet::REJECT_DUPLICATES;
    }
    if options.request_status_report {
        fo |= first_octet::STATUS_REPORT_REQUEST;
    }

    let (coding, encoded_len) = match encode_gsm7(text, false) {
        Ok(septets) => (DataCoding::Gsm7, septets.len()),
        Err(_) => (DataCoding::Ucs2, text.encode_utf16().count()),
    };

    let multipart = encoded_len > coding.max_length();
    let parts = if multipart {
        fo |= first_octet::UDH_INDICATOR;
        match coding {
            DataCoding::Ucs2 => divide_text_ucs2(text),
            _ => divide_text_gsm7(text)?,
        }
    } else {
        vec![text.to_string()]
    };
    let part_count = u8::try_from(parts.len()).map_err(|_| EncodingError::TooManyParts(parts.len()))?;

    let smsc_field = match options.smsc.as_deref() {
        Some(smsc) if !smsc.is_empty() => encode_address(smsc, true)?,
        _ => vec![0x00],
    };
    let destination = encode_address(number, false)?;

    let mut pdus = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        let udh = if multipart {
            InformationElement::Concatenation {
                reference: u16::from(options.reference),
                parts: part_count,
                number: i as u8 + 1,
            }
            .encode()
        } else {
            Vec::new()
        };

        let mut pdu = smsc_field.clone();
        pdu.push(fo);
        pdu.push(options.reference);
        pdu.extend_from_slice(&destination);
        pdu.push(0x00); // TP-PID
        pdu.push(coding.dcs(options.send_flash));
        pdu.extend_from_slice(&validity);

        let (user_data, mut udl) = match coding {
            DataCoding::Ucs2 => {
                let data = encode_ucs2(part);
                let len = data.len();
                (data, len)
            }
            _ => {
                let septets = encode_gsm7(part, false)?;
                let mut udl = septets.len();
                // UDH must end on a septet boundary
                let shift = if udh.is_empty() { 0 } else { ((udh.len() + 1) * 8) % 7 };
                let fill_bits = if shift > 0 {
                    udl += 1;
                    (7 - shift) as u8
                } else {
                    0
                };
                (pack_septets(&septets, fill_bits), udl)
            }
        };

        if udh.is_empty() {
            pdu.push(udl as u8);
        } else {
            udl += udh.len() + 1;
            pdu.push(udl as u8);
            pdu.push(udh.len() as u8);
            pdu.extend_from_slice(&udh);
        }
        pdu.extend_from_slice(&user_data);

        let tpdu_length = pdu.len() - smsc_field.len();
        pdus.push(Pdu { data: pdu, tpdu_length });
    }

    Ok(pdus)
}

/// Decode a hex-encoded PDU (as returned by `AT+CMGR` / `AT+CMGL` in PDU mode)
pub fn decode_sms_pdu(pdu: &str) -> Result<DecodedPdu, EncodingError> {
    let data = hex::decode(pdu.trim())?;
    decode_sms_pdu_bytes(&data)
}

/// Decode raw PDU octets
pub fn decode_sms_pdu_bytes(data: &[u8]) -> Result<DecodedPdu, EncodingError> {
    let mut reader = PduReader::new(data);

    let smsc = decode_address(&mut reader, true)?;
    let tpdu_length = data.len() - reader.pos;

    let fo = reader.u8()?;
    let message = match fo & first_octet::MTI_MASK {
        0x00 => {
            let number = decode_address(&mut reader, false)?.unwrap_or_default();
            let protocol_id = reader.u8()?;
            let coding = DataCoding::from_dcs(reader.u8()?);
            let time = decode_timestamp(reader.take(7)?)?;
            let udl = reader.u8()? as usize;
            let (text, udh) = decode_user_data(reader.rest(), udl, coding, fo & first_octet::UDH_INDICATOR != 0)?;
            PduMessage::Deliver { number, protocol_id, time, text, udh }
        }
        0x01 => {
            let reference = reader.u8()?;
            let number = decode_address(&mut reader, false)?.unwrap_or_default();
            let protocol_id = reader.u8()?;
            let coding = DataCoding::from_dcs(reader.u8()?);
            let validity = match (fo & first_octet::VPF_MASK) >> 3 {
                0x02 => Some(Validity::Relative(decode_relative_validity(reader.u8()?))),
                0x03 => Some(Validity::Absolute(decode_timestamp(reader.take(7)?)?)),
                _ => None,
            };
            let udl = reader.u8()? as usize;
            let (text, udh) = decode_user_data(reader.rest(), udl, coding, fo & first_octet::UDH_INDICATOR != 0)?;
            PduMessage::Submit { reference, number, protocol_id, validity, text, udh }
        }
        0x02 => {
            let reference = reader.u8()?;
            let number = decode_address(&mut reader, false)?.unwrap_or_default();
            let time = decode_timestamp(reader.take(7)?)?;
            let discharge = decode_timestamp(reader.take(7)?)?;
            let status = reader.u8()?;
            PduMessage::StatusReport { reference, number, time, discharge, status }
        }
        mti => return Err(EncodingError::UnknownMessageType(mti)),
    };

    Ok(DecodedPdu { smsc, tpdu_length, message })
}

/// Cursor over PDU octets
struct PduReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PduReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, EncodingError> {
        let byte = *self.data.get(self.pos).ok_or(EncodingError::BufferTooShort)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EncodingError> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or(EncodingError::BufferTooShort)?;
        self.pos += n;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }
}

fn decode_user_data(
    ud: &[u8],
    udl: usize,
    coding: DataCoding,
    udh_present: bool,
) -> Result<(String, Vec<InformationElement>), EncodingError> {
    let (udh, header_len) = if udh_present {
        let udhl = *ud.first().ok_or(EncodingError::BufferTooShort)? as usize;
        let header = ud.get(1..1 + udhl).ok_or(EncodingError::BufferTooShort)?;
        (decode_udh(header)?, udhl + 1)
    } else {
        (Vec::new(), 0)
    };

    let text = match coding {
        DataCoding::Gsm7 => {
            // UDL counts septets including the header and its fill bits
            let septets = unpack_septets(ud, Some(udl));
            let skip = (header_len * 8 + 6) / 7;
            decode_gsm7(septets.get(skip..).unwrap_or_default())
        }
        DataCoding::Ucs2 | DataCoding::EightBit => {
            let body = &ud[header_len.min(ud.len())..];
            let len = udl.saturating_sub(header_len).min(body.len());
            if coding == DataCoding::Ucs2 {
                decode_ucs2(&body[..len])
            } else {
                body[..len].iter().map(|&b| char::from(b)).collect()
            }
        }
    };

    Ok((text, udh))
}

/// Encode an address field: `+digits` (international), digits (local) or alphanumeric.
///
/// The SMSC field carries its length in octets; other addresses in digits.
pub fn encode_address(address: &str, smsc_field: bool) -> Result<Vec<u8>, EncodingError> {
    if address.is_empty() {
        return Err(EncodingError::EmptyAddress);
    }

    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let (toa, digits) = if is_digits(address) {
        (toa::LOCAL, Some(address))
    } else {
        match address.strip_prefix('+') {
            Some(rest) if is_digits(rest) => (toa::INTERNATIONAL, Some(rest)),
            _ => (toa::ALPHANUMERIC, None),
        }
    };

    let (len, value) = match digits {
        Some(digits) => {
            let value = encode_semi_octets(digits)?;
            let len = if smsc_field { value.len() + 1 } else { digits.len() };
            (len, value)
        }
        None => {
            let value = pack_septets(&encode_gsm7(address, false)?, 0);
            (value.len() * 2, value)
        }
    };

    let mut field = Vec::with_capacity(value.len() + 2);
    field.push(len as u8);
    field.push(toa);
    field.extend_from_slice(&value);
    Ok(field)
}

fn decode_address(reader: &mut PduReader<'_>, smsc_field: bool) -> Result<Option<String>, EncodingError> {
    let len = reader.u8()? as usize;
    if len == 0 {
        return Ok(None);
    }

    let toa = reader.u8()?;
    let ton = toa & toa::TON_MASK;
    if ton == toa::TON_ALPHANUMERIC {
        let octets = reader.take((len + 1) / 2)?;
        let septets = unpack_septets(octets, Some(len * 4 / 7));
        return Ok(Some(decode_gsm7(&septets)));
    }

    let octets = if smsc_field { len - 1 } else { (len + 1) / 2 };
    let mut number = decode_semi_octets(reader.take(octets)?, None);
    if ton == toa::TON_INTERNATIONAL {
        number.insert(0, '+');
    }
    Ok(Some(number))
}

/// Encode a 7-octet service centre timestamp
pub fn encode_timestamp(time: &DateTime<FixedOffset>) -> Result<Vec<u8>, EncodingError> {
    let offset = time.offset().local_minus_utc();
    let quarters = offset.abs() / (15 * 60);
    let zone = if offset >= 0 {
        format!("{:02}", quarters)
    } else {
        // Quarter-hour digits with the sign in the MSB of the first semi-octet
        let value = u8::from_str_radix(&format!("{:02}", quarters), 16)
            .map_err(|_| EncodingError::InvalidTimestamp(time.to_rfc3339()))?;
        format!("{:02X}", value | 0x80)
    };

    encode_semi_octets(&format!("{}{}", time.format("%y%m%d%H%M%S"), zone))
}

/// Decode a 7-octet service centre timestamp
pub fn decode_timestamp(octets: &[u8]) -> Result<DateTime<FixedOffset>, EncodingError> {
    let digits = decode_semi_octets(octets, Some(7));
    let invalid = || EncodingError::InvalidTimestamp(digits.clone());
    if digits.len() != 14 {
        return Err(invalid());
    }

    let field = |i: usize| digits[i..i + 2].parse::<u32>().map_err(|_| invalid());
    let yy = field(0)? as i32;
    let year = if yy < 69 { 2000 + yy } else { 1900 + yy };
    let naive = NaiveDate::from_ymd_opt(year, field(2)?, field(4)?)
        .and_then(|date| date.and_hms_opt(field(6).ok()?, field(8).ok()?, field(10).ok()?))
        .ok_or_else(invalid)?;

    let mut zone = u8::from_str_radix(&digits[12..14], 16).map_err(|_| invalid())?;
    // Some networks send a non-BCD low digit
    if zone & 0x0F > 9 {
        zone = zone.wrapping_add(0x06);
    }
    let bcd = zone & 0x7F;
    let minutes = i32::from((bcd >> 4) * 10 + (bcd & 0x0F)) * 15;
    let seconds = if zone & 0x80 == 0 { minutes * 60 } else { -minutes * 60 };

    FixedOffset::east_opt(seconds)
        .and_then(|offset| offset.from_local_datetime(&naive).single())
        .ok_or_else(invalid)
}

/// Encode a relative validity period into TP-VP
pub fn encode_relative_validity(period: Duration) -> Result<u8, EncodingError> {
    let seconds = period.num_seconds();
    let days = period.num_days();

    let value = if seconds <= 12 * 3600 {
        (seconds / 300 - 1).max(0)
    } else if seconds <= 24 * 3600 {
        (seconds - 12 * 3600) / 1800 + 143
    } else if days <= 30 {
        days + 166
    } else if days <= 441 {
        days / 7 + 192
    } else {
        return Err(EncodingError::ValidityTooLong);
    };

    Ok(value as u8)
}

/// Decode TP-VP into a relative validity period
pub fn decode_relative_validity(value: u8) -> Duration {
    let value = i64::from(value);
    match value {
        0..=143 => Duration::minutes((value + 1) * 5),
        144..=167 => Duration::hours(12) + Duration::minutes((value - 143) * 30),
        168..=196 => Duration::days(value - 166),
        _ => Duration::weeks(value - 192),
    }
}
