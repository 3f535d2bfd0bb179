//! Error types for the GSM modem library

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GsmError>;

/// Top-level modem error
#[derive(Debug, Error)]
pub enum GsmError {
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// No (complete) response in time; carries any partial response lines
    #[error("Timeout{}", format_partial(.0))]
    Timeout(Option<Vec<String>>),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An operation was interrupted, typically because the call ended
    #[error("Interrupted: {message}")]
    Interrupted {
        message: String,
        #[source]
        cause: Option<Box<CommandError>>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,
}

fn format_partial(data: &Option<Vec<String>>) -> String {
    match data {
        Some(lines) if !lines.is_empty() => format!(" (partial response: {:?})", lines),
        _ => String::new(),
    }
}

impl GsmError {
    /// Partial response data attached to a timeout, if any
    pub fn timeout_data(&self) -> Option<&[String]> {
        match self {
            GsmError::Timeout(Some(lines)) => Some(lines),
            _ => None,
        }
    }

    /// The modem-reported command error, if this is one
    pub fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            GsmError::Command(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GsmError::Timeout(_))
    }
}

/// Errors reported by the modem in response to a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{command} failed")]
    Generic { command: String },

    #[error("+CME ERROR {code} for {command}")]
    Cme { command: String, code: u16 },

    #[error("+CMS ERROR {code} for {command}")]
    Cms { command: String, code: u16 },

    /// CME 11: SIM PIN required
    #[error("SIM PIN required ({command})")]
    PinRequired { command: String },

    /// CME 12: SIM PUK required
    #[error("SIM PUK required ({command})")]
    PukRequired { command: String },

    /// CME 16: incorrect password
    #[error("Incorrect PIN ({command})")]
    IncorrectPin { command: String },

    #[error("Unexpected response to {command}: {detail}")]
    UnexpectedResponse { command: String, detail: String },
}

impl CommandError {
    /// Build the most specific error for a `+CME ERROR: <code>` response
    pub fn from_cme(command: impl Into<String>, code: u16) -> Self {
        let command = command.into();
        match code {
            11 => CommandError::PinRequired { command },
            12 => CommandError::PukRequired { command },
            16 => CommandError::IncorrectPin { command },
            _ => CommandError::Cme { command, code },
        }
    }

    pub fn from_cms(command: impl Into<String>, code: u16) -> Self {
        CommandError::Cms { command: command.into(), code }
    }

    pub fn unexpected(command: impl Into<String>, detail: impl Into<String>) -> Self {
        CommandError::UnexpectedResponse {
            command: command.into(),
            detail: detail.into(),
        }
    }

    /// The command that failed
    pub fn command(&self) -> &str {
        match self {
            CommandError::Generic { command }
            | CommandError::Cme { command, .. }
            | CommandError::Cms { command, .. }
            | CommandError::PinRequired { command }
            | CommandError::PukRequired { command }
            | CommandError::IncorrectPin { command }
            | CommandError::UnexpectedResponse { command, .. } => command,
        }
    }

    /// The numeric CME/CMS code, if the modem reported one
    pub fn code(&self) -> Option<u16> {
        match self {
            CommandError::Cme { code, .. } | CommandError::Cms { code, .. } => Some(*code),
            CommandError::PinRequired { .. } => Some(11),
            CommandError::PukRequired { .. } => Some(12),
            CommandError::IncorrectPin { .. } => Some(16),
            _ => None,
        }
    }

    /// True for `+CME ERROR` variants (including the PIN/PUK specialisations)
    pub fn is_cme(&self) -> bool {
        matches!(
            self,
            CommandError::Cme { .. }
                | CommandError::PinRequired { .. }
                | CommandError::PukRequired { .. }
                | CommandError::IncorrectPin { .. }
        )
    }

    pub fn is_cms(&self) -> bool {
        matches!(self, CommandError::Cms { .. })
    }
}

/// Encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Invalid GSM7 character: {0:?}")]
    InvalidGsm7Char(char),

    #[error("Character {0:?} cannot be sent in text mode")]
    InvalidTextModeChar(char),

    #[error("Message too long for text mode ({0} > 160 characters)")]
    TextModeTooLong(usize),

    #[error("Buffer too short")]
    BufferTooShort,

    #[error("Invalid hex data: {0}")]
    InvalidHex(String),

    #[error("Invalid semi-octet data: {0}")]
    InvalidSemiOctets(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unknown SMS message type: {0}")]
    UnknownMessageType(u8),

    #[error("Validity period too long")]
    ValidityTooLong,

    #[error("Empty address")]
    EmptyAddress,

    #[error("Message needs {0} parts (maximum 255)")]
    TooManyParts(usize),
}

impl From<hex::FromHexError> for EncodingError {
    fn from(e: hex::FromHexError) -> Self {
        EncodingError::InvalidHex(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cme_specialisations() {
        assert_eq!(
            CommandError::from_cme("AT+CPIN?", 11),
            CommandError::PinRequired { command: "AT+CPIN?".into() }
        );
        assert_eq!(
            CommandError::from_cme("AT+CPIN=\"1\"", 16),
            CommandError::IncorrectPin { command: "AT+CPIN=\"1\"".into() }
        );
        let generic = CommandError::from_cme("AT+VTS=1", 30);
        assert_eq!(generic.code(), Some(30));
        assert!(generic.is_cme());
        assert!(!generic.is_cms());
    }

    #[test]
    fn test_timeout_display_includes_partial_data() {
        let err = GsmError::Timeout(Some(vec!["+CPIN: READY".to_string()]));
        assert!(err.to_string().contains("+CPIN: READY"));
        assert_eq!(err.timeout_data().map(|d| d.len()), Some(1));
        assert_eq!(GsmError::Timeout(None).to_string(), "Timeout");
    }
}
