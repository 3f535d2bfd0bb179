//! Response line helpers and text-mode timestamp parsing

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use regex::{Captures, Regex};

use crate::errors::EncodingError;

/// First line starting with `prefix`
pub fn line_starting_with<'a>(prefix: &str, lines: &'a [String]) -> Option<&'a str> {
    lines
        .iter()
        .map(String::as_str)
        .find(|line| line.starts_with(prefix))
}

/// Captures of the first line matching `pattern`
pub fn line_matching<'a>(pattern: &Regex, lines: &'a [String]) -> Option<Captures<'a>> {
    lines.iter().find_map(|line| pattern.captures(line))
}

/// Captures of every line matching `pattern`
pub fn all_lines_matching<'a>(pattern: &Regex, lines: &'a [String]) -> Vec<Captures<'a>> {
    lines.iter().filter_map(|line| pattern.captures(line)).collect()
}

/// Parse a text-mode SMS timestamp: `yy/MM/dd,hh:mm:ss±zz` where `zz` is in quarter hours
pub fn parse_text_mode_time(s: &str) -> Result<DateTime<FixedOffset>, EncodingError> {
    let invalid = || EncodingError::InvalidTimestamp(s.to_string());
    if s.len() < 4 || !s.is_char_boundary(s.len() - 3) {
        return Err(invalid());
    }
    let (local, zone) = s.split_at(s.len() - 3);

    let naive = NaiveDateTime::parse_from_str(local, "%y/%m/%d,%H:%M:%S").map_err(|_| invalid())?;
    let quarters: i32 = zone.parse().map_err(|_| invalid())?;
    let offset = FixedOffset::east_opt(quarters * 15 * 60).ok_or_else(invalid)?;

    offset.from_local_datetime(&naive).single().ok_or_else(invalid)
}

/// Strip one pair of surrounding double quotes
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_text_mode_time() {
        let time = parse_text_mode_time("13/04/29,19:58:00+08").unwrap();
        assert_eq!(time.year(), 2013);
        assert_eq!(time.month(), 4);
        assert_eq!(time.day(), 29);
        assert_eq!(time.hour(), 19);
        assert_eq!(time.offset().local_minus_utc(), 2 * 3600);

        let negative = parse_text_mode_time("12/12/31,23:59:59-04").unwrap();
        assert_eq!(negative.offset().local_minus_utc(), -3600);
    }

    #[test]
    fn test_parse_text_mode_time_rejects_garbage() {
        assert!(parse_text_mode_time("garbage").is_err());
        assert!(parse_text_mode_time("").is_err());
    }

    #[test]
    fn test_line_helpers() {
        let lines: Vec<String> = vec!["+CSQ: 12,99".into(), "OK".into()];
        assert_eq!(line_starting_with("+CSQ", &lines), Some("+CSQ: 12,99"));
        assert_eq!(line_starting_with("+CREG", &lines), None);

        let re = Regex::new(r"^\+CSQ:\s*(\d+),").unwrap();
        let caps = line_matching(&re, &lines).unwrap();
        assert_eq!(&caps[1], "12");
        assert_eq!(all_lines_matching(&re, &lines).len(), 1);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"SM\""), "SM");
        assert_eq!(unquote("SM"), "SM");
    }
}
