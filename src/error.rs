// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::fmt;

/// Response codes returned by the Envisalink TPI for a `^XX` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TpiResponseCode {
    /// 00 - Command accepted
    Accepted,
    /// 01 - Receive buffer overrun
    BufferOverrun,
    /// 02 - Unknown command
    UnknownCommand,
    /// 03 - Syntax error
    SyntaxError,
    /// 04 - Receive buffer overflow
    BufferOverflow,
    /// 05 - Receive state machine timeout
    StateMachineTimeout,
}

impl TpiResponseCode {
    /// Parse a two-digit response code (e.g. "00", "03").
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "00" => Some(Self::Accepted),
            "01" => Some(Self::BufferOverrun),
            "02" => Some(Self::UnknownCommand),
            "03" => Some(Self::SyntaxError),
            "04" => Some(Self::BufferOverflow),
            "05" => Some(Self::StateMachineTimeout),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Human-readable description of the response code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Accepted => "No Error - Command Accepted",
            Self::BufferOverrun => {
                "Receive Buffer Overrun (a command is received while another is still being processed)"
            }
            Self::UnknownCommand => "Unknown Command",
            Self::SyntaxError => {
                "Syntax Error. Data appended to the command is incorrect in some fashion"
            }
            Self::BufferOverflow => "Receive Buffer Overflow",
            Self::StateMachineTimeout => {
                "Receive State Machine Timeout (command not completed within 3 seconds)"
            }
        }
    }

    /// The wire string representation (e.g. "00").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "00",
            Self::BufferOverrun => "01",
            Self::UnknownCommand => "02",
            Self::SyntaxError => "03",
            Self::BufferOverflow => "04",
            Self::StateMachineTimeout => "05",
        }
    }
}

impl fmt::Display for TpiResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.description())
    }
}

/// Reasons a panel payload could not be decoded. The offending message is
/// dropped; the session carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("payload contains an embedded frame marker")]
    EmbeddedMarker,

    #[error("invalid hex in {field}: {value:?}")]
    InvalidHex { field: &'static str, value: String },

    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("payload too short: need {expected} characters, got {actual}")]
    TooShort { expected: usize, actual: usize },
}

/// All errors that can occur in the bridge library.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Socket disconnected")]
    Disconnected,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint returned HTTP {status}")]
    DeliveryRejected { status: u16 },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },
}

impl BridgeError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_) | BridgeError::ConnectionTimeout | BridgeError::Disconnected
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
