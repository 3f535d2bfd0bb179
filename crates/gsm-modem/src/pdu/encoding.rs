//! GSM 7-bit, UCS2 and semi-octet encodings (3GPP TS 23.038 / 23.040)

use crate::errors::EncodingError;

/// GSM 7-bit default alphabet
pub(crate) const GSM7_BASIC: &[char] = &[
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\x1b', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// GSM 7-bit extension table (after ESC)
pub(crate) const GSM7_EXTENSION: &[(u8, char)] = &[
    (0x0A, '\x0C'), // Form feed
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

const ESC: u8 = 0x1B;

/// Characters accepted by modems in SMS text mode
const TEXT_MODE_CHARS: &str =
    "\n\r !\"#%&'()*+,-./0123456789:;<=>?ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Maximum single-message lengths per alphabet
pub const MAX_GSM7_LENGTH: usize = 160;
pub const MAX_8BIT_LENGTH: usize = 140;
pub const MAX_UCS2_LENGTH: usize = 70;

/// Maximum segment lengths when a concatenation header is present
pub const MAX_MULTIPART_GSM7_LENGTH: usize = 153;
pub const MAX_MULTIPART_8BIT_LENGTH: usize = 133;
pub const MAX_MULTIPART_UCS2_LENGTH: usize = 67;

fn gsm7_basic_index(ch: char) -> Option<u8> {
    GSM7_BASIC.iter().position(|&c| c == ch).map(|p| p as u8)
}

fn gsm7_extension_code(ch: char) -> Option<u8> {
    GSM7_EXTENSION.iter().find(|&&(_, c)| c == ch).map(|&(code, _)| code)
}

/// Number of septets `ch` occupies in GSM-7, or `None` if it is not representable
fn gsm7_char_len(ch: char) -> Option<usize> {
    if gsm7_basic_index(ch).is_some() {
        Some(1)
    } else if gsm7_extension_code(ch).is_some() {
        Some(2)
    } else {
        None
    }
}

/// Encode text to unpacked GSM-7 septets.
///
/// With `discard_invalid`, characters outside the alphabet are dropped instead of failing.
pub fn encode_gsm7(text: &str, discard_invalid: bool) -> Result<Vec<u8>, EncodingError> {
    let mut septets = Vec::with_capacity(text.len());

    for ch in text.chars() {
        if let Some(idx) = gsm7_basic_index(ch) {
            septets.push(idx);
        } else if let Some(code) = gsm7_extension_code(ch) {
            septets.push(ESC);
            septets.push(code);
        } else if !discard_invalid {
            return Err(EncodingError::InvalidGsm7Char(ch));
        }
    }

    Ok(septets)
}

/// Decode unpacked GSM-7 septets
pub fn decode_gsm7(septets: &[u8]) -> String {
    let mut result = String::with_capacity(septets.len());
    let mut escape = false;

    for &septet in septets {
        if escape {
            escape = false;
            if let Some(&(_, ch)) = GSM7_EXTENSION.iter().find(|&&(c, _)| c == septet) {
                result.push(ch);
            }
        } else if septet == ESC {
            escape = true;
        } else if let Some(&ch) = GSM7_BASIC.get(septet as usize) {
            result.push(ch);
        }
    }

    result
}

/// True if the whole text can be encoded with GSM-7
pub fn is_gsm7(text: &str) -> bool {
    text.chars().all(|ch| gsm7_char_len(ch).is_some())
}

/// Pack septets into octets, starting after `fill_bits` zero bits
pub fn pack_septets(septets: &[u8], fill_bits: u8) -> Vec<u8> {
    let mut result = Vec::with_capacity(septets.len() * 7 / 8 + 2);
    let mut bits_pending = 0u32;
    let mut pending_bits = u32::from(fill_bits % 8);

    for &septet in septets {
        bits_pending |= u32::from(septet & 0x7F) << pending_bits;
        pending_bits += 7;

        while pending_bits >= 8 {
            result.push((bits_pending & 0xFF) as u8);
            bits_pending >>= 8;
            pending_bits -= 8;
        }
    }

    if pending_bits > 0 {
        result.push((bits_pending & 0xFF) as u8);
    }

    result
}

/// Unpack octets into septets, stopping after `count` septets when given
pub fn unpack_septets(data: &[u8], count: Option<usize>) -> Vec<u8> {
    let limit = count.unwrap_or(usize::MAX);
    let mut result = Vec::with_capacity(data.len() * 8 / 7 + 1);
    let mut bits_pending = 0u32;
    let mut pending_bits = 0u32;

    for &byte in data {
        bits_pending |= u32::from(byte) << pending_bits;
        pending_bits += 8;

        while pending_bits >= 7 {
            if result.len() == limit {
                return result;
            }
            result.push((bits_pending & 0x7F) as u8);
            bits_pending >>= 7;
            pending_bits -= 7;
        }
    }

    // Without a count, a trailing zero septet is padding from an 8-septets-in-7-octets boundary
    if count.is_none() && result.len() % 8 == 0 && result.last() == Some(&0) {
        result.pop();
    }

    result
}

/// Encode to UCS2 (UTF-16BE)
pub fn encode_ucs2(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

/// Decode UCS2 (UTF-16BE); a trailing odd byte is ignored
pub fn decode_ucs2(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Semi-octet (swapped nibble) encoding, e.g. for phone numbers; odd lengths are padded with `F`
pub fn encode_semi_octets(digits: &str) -> Result<Vec<u8>, EncodingError> {
    let nibbles = digits
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| EncodingError::InvalidSemiOctets(digits.to_string()))?;

    Ok(nibbles
        .chunks(2)
        .map(|pair| {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(0x0F);
            (high << 4) | low
        })
        .collect())
}

/// Semi-octet decoding; stops at an `F` filler nibble or after `max_octets` octets
pub fn decode_semi_octets(data: &[u8], max_octets: Option<usize>) -> String {
    let limit = max_octets.unwrap_or(data.len()).min(data.len());
    let mut number = String::with_capacity(limit * 2);

    for &octet in &data[..limit] {
        number.push(nibble_char(octet & 0x0F));
        let high = octet >> 4;
        if high == 0x0F {
            break;
        }
        number.push(nibble_char(high));
    }

    number
}

fn nibble_char(n: u8) -> char {
    char::from_digit(u32::from(n), 16).unwrap_or('?')
}

/// Check that text can be sent as-is in SMS text mode
pub fn encode_text_mode(text: &str) -> Result<&str, EncodingError> {
    if let Some(ch) = text.chars().find(|&ch| !TEXT_MODE_CHARS.contains(ch)) {
        return Err(EncodingError::InvalidTextModeChar(ch));
    }
    let len = text.chars().count();
    if len > MAX_GSM7_LENGTH {
        return Err(EncodingError::TextModeTooLong(len));
    }
    Ok(text)
}

/// Split GSM-7 text into segments of at most 153 septets without splitting escape pairs
pub fn divide_text_gsm7(text: &str) -> Result<Vec<String>, EncodingError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for ch in text.chars() {
        let len = gsm7_char_len(ch).ok_or(EncodingError::InvalidGsm7Char(ch))?;
        if current_len + len > MAX_MULTIPART_GSM7_LENGTH {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(ch);
        current_len += len;
    }

    if current_len > 0 {
        parts.push(current);
    }

    Ok(parts)
}

/// Split text into UCS2 segments of at most 67 UTF-16 code units
pub fn divide_text_ucs2(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_units = 0usize;

    for ch in text.chars() {
        let units = ch.len_utf16();
        if current_units + units > MAX_MULTIPART_UCS2_LENGTH {
            parts.push(std::mem::take(&mut current));
            current_units = 0;
        }
        current.push(ch);
        current_units += units;
    }

    if current_units > 0 {
        parts.push(current);
    }

    parts
}
