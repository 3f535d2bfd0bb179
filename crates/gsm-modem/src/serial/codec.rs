//! Line framing of the modem's receive stream

use bytes::{Buf, BytesMut};
use regex::Regex;

/// End-of-line sequence used by the modem
pub const RX_EOL: &[u8] = b"\r\n";

/// A segment cut from the receive buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A `\r\n`-terminated line (terminator stripped)
    Line(String),
    /// Everything up to and including a caller-supplied terminator (e.g. the `> ` prompt)
    Terminated(String),
}

impl Segment {
    pub fn into_string(self) -> String {
        match self {
            Segment::Line(s) | Segment::Terminated(s) => s,
        }
    }
}

/// Splits received bytes into lines
pub struct LineFramer {
    buf: BytesMut,
    /// Prefix lengths of `buf` already checked for a terminator
    scanned: usize,
    /// Terminator the `scanned` prefix was checked against
    scanned_term: Option<Vec<u8>>,
    response_term: Regex,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            scanned: 0,
            scanned_term: None,
            // Matched at the start of the line; only the last alternative is anchored at the end
            response_term: Regex::new(r"^(?:OK|ERROR|\+CM[ES] ERROR: \d+|COMMAND NOT SUPPORT$)").unwrap(),
        }
    }

    /// Buffer to read into; received data is only ever appended
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// True when no partial data is buffered
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Cut the next segment. Empty lines are skipped.
    ///
    /// With `expected_term`, a buffer ending in that sequence is returned whole even
    /// without a line terminator; `\r\n` takes precedence when both end at the same byte.
    pub fn next_segment(&mut self, expected_term: Option<&[u8]>) -> Option<Segment> {
        let expected_term = expected_term.filter(|t| !t.is_empty());
        if self.scanned_term.as_deref() != expected_term {
            // Earlier prefixes were not checked against this terminator
            self.scanned = 0;
            self.scanned_term = expected_term.map(<[u8]>::to_vec);
        }

        let mut end = self.scanned + 1;
        while end <= self.buf.len() {
            let head = &self.buf[..end];
            if head.ends_with(RX_EOL) {
                let line = String::from_utf8_lossy(&head[..end - RX_EOL.len()]).into_owned();
                self.buf.advance(end);
                self.scanned = 0;
                if line.is_empty() {
                    end = 1;
                    continue;
                }
                return Some(Segment::Line(line));
            }
            if let Some(term) = expected_term {
                if head.ends_with(term) {
                    let segment = String::from_utf8_lossy(head).into_owned();
                    self.buf.advance(end);
                    self.scanned = 0;
                    return Some(Segment::Terminated(segment));
                }
            }
            end += 1;
        }

        self.scanned = self.buf.len();
        None
    }

    /// Whether a line ends a command response (`OK`, `ERROR`, `+CME ERROR: n`, ...)
    pub fn is_response_terminator(&self, line: &str) -> bool {
        self.response_term.is_match(line)
    }
}

/// Parsed `+CME ERROR` / `+CMS ERROR` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemErrorCode {
    Cme(u16),
    Cms(u16),
}

/// Extract the error code from a final `+CME ERROR: n` / `+CMS ERROR: n` line
pub fn parse_error_code(line: &str) -> Option<ModemErrorCode> {
    let (kind, code) = line.strip_prefix('+')?.split_once(" ERROR: ")?;
    let code = code.trim().parse().ok()?;
    match kind {
        "CME" => Some(ModemErrorCode::Cme(code)),
        "CMS" => Some(ModemErrorCode::Cms(code)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_lines_and_skips_empty() {
        let mut framer = LineFramer::new();
        framer.extend(b"\r\n+CSQ: 12,99\r\n\r\nOK\r\n+CM");
        assert_eq!(framer.next_segment(None), Some(Segment::Line("+CSQ: 12,99".into())));
        assert_eq!(framer.next_segment(None), Some(Segment::Line("OK".into())));
        assert_eq!(framer.next_segment(None), None);
        assert!(!framer.is_empty());

        framer.extend(b"TI: \"SM\",1\r\n");
        assert_eq!(framer.next_segment(None), Some(Segment::Line("+CMTI: \"SM\",1".into())));
        assert!(framer.is_empty());
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut framer = LineFramer::new();
        framer.extend(b"\r\n+CMGL: 1,1,,24\r");
        assert_eq!(framer.next_segment(None), None);
        framer.extend(b"\n0791");
        assert_eq!(framer.next_segment(None), Some(Segment::Line("+CMGL: 1,1,,24".into())));
        assert_eq!(framer.next_segment(None), None);
        framer.extend(b"7228\r\nOK\r\n");
        assert_eq!(framer.next_segment(None), Some(Segment::Line("07917228".into())));
        assert_eq!(framer.next_segment(None), Some(Segment::Line("OK".into())));
        assert!(framer.is_empty());
    }

    #[test]
    fn test_expected_terminator() {
        let mut framer = LineFramer::new();
        framer.extend(b"\r\n> ");
        assert_eq!(framer.next_segment(None), None);
        assert_eq!(framer.next_segment(Some(b"> ")), Some(Segment::Terminated("> ".into())));
        assert!(framer.is_empty());

        framer.extend(b"CONNECT\r");
        assert_eq!(
            framer.next_segment(Some(b"CONNECT\r")),
            Some(Segment::Terminated("CONNECT\r".into()))
        );
    }

    #[test]
    fn test_response_terminator() {
        let framer = LineFramer::new();
        assert!(framer.is_response_terminator("OK"));
        assert!(framer.is_response_terminator("ERROR"));
        assert!(framer.is_response_terminator("+CME ERROR: 11"));
        assert!(framer.is_response_terminator("+CMS ERROR: 330"));
        assert!(framer.is_response_terminator("COMMAND NOT SUPPORT"));
        assert!(!framer.is_response_terminator("+CUSD: 0,\"ERROR\",15"));
        assert!(!framer.is_response_terminator("+CSQ: 12,99"));
    }

    #[test]
    fn test_parse_error_code() {
        assert_eq!(parse_error_code("+CME ERROR: 515"), Some(ModemErrorCode::Cme(515)));
        assert_eq!(parse_error_code("+CMS ERROR: 302"), Some(ModemErrorCode::Cms(302)));
        assert_eq!(parse_error_code("ERROR"), None);
        assert_eq!(parse_error_code("+CME ERROR: SIM busy"), None);
    }
}
