// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use crate::constants::{EVENT_MARKER, FRAME_END, RESPONSE_MARKER};

/// A single line received from the TPI, split into code and data.
///
/// Framed lines (`%CODE,f1,...,fN$` or `^CODE,...$`) keep their leading
/// marker in `code` so events and command responses stay distinguishable.
/// Bare lines are login chatter: the whole line is the code and data is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: String,
    pub data: String,
    pub framed: bool,
}

impl Message {
    /// Classify a raw line. Returns `None` for empty lines.
    pub fn parse(line: &str) -> Option<Self> {
        if line.is_empty() {
            return None;
        }
        if line.starts_with(EVENT_MARKER) || line.starts_with(RESPONSE_MARKER) {
            let body = line.strip_suffix(FRAME_END).unwrap_or(line);
            let (code, data) = match body.split_once(',') {
                Some((code, data)) => (code, data),
                None => (body, ""),
            };
            Some(Self {
                code: code.to_string(),
                data: data.to_string(),
                framed: true,
            })
        } else {
            Some(Self {
                code: line.to_string(),
                data: String::new(),
                framed: false,
            })
        }
    }
}

/// Handler selected for an inbound code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// `Login:` - password prompt
    LoginPrompt,
    /// `OK` - password accepted
    LoginSuccess,
    /// `FAILED` - password rejected, socket will close
    LoginFailure,
    /// `Timed Out!` - no password sent in time, socket will close
    LoginTimeout,
    /// `%00` - virtual keypad update
    KeypadUpdate,
    /// `%01` - zone state change bitmap
    ZoneStateChange,
    /// `%02` - partition state change
    PartitionStateChange,
    /// `%03` - realtime Contact-ID event
    RealtimeCidEvent,
    /// `%FF` - zone timer dump
    ZoneTimerDump,
    /// `^00` - poll response
    PollResponse,
    /// `^01`, `^02`, `^03`, `^0C` - response to a command
    CommandResponse,
}

impl ResponseCode {
    /// Map a message code to its handler. Unknown codes are `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Login:" => Some(Self::LoginPrompt),
            "OK" => Some(Self::LoginSuccess),
            "FAILED" => Some(Self::LoginFailure),
            "Timed Out!" => Some(Self::LoginTimeout),
            "%00" => Some(Self::KeypadUpdate),
            "%01" => Some(Self::ZoneStateChange),
            "%02" => Some(Self::PartitionStateChange),
            "%03" => Some(Self::RealtimeCidEvent),
            "%FF" => Some(Self::ZoneTimerDump),
            "^00" => Some(Self::PollResponse),
            "^01" | "^02" | "^03" | "^0C" => Some(Self::CommandResponse),
            _ => None,
        }
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginPrompt => "Login Prompt",
            Self::LoginSuccess => "Login Success",
            Self::LoginFailure => "Login Failure",
            Self::LoginTimeout => "Login Interaction Timed Out",
            Self::KeypadUpdate => "Virtual Keypad Update",
            Self::ZoneStateChange => "Zone State Change",
            Self::PartitionStateChange => "Partition State Change",
            Self::RealtimeCidEvent => "Realtime CID Event",
            Self::ZoneTimerDump => "Envisalink Zone Timer Dump",
            Self::PollResponse => "Poll",
            Self::CommandResponse => "Command Response",
        }
    }
}

/// Commands that can be sent to the Envisalink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `00` - No-op poll, keeps the session alive.
    Poll,
    /// `01` - Change the default partition for keypresses (1-8).
    ChangePartition { partition: u8 },
    /// `02` - Dump zone timers; answered by a `%FF` event.
    DumpZoneTimers,
    /// `03` - Send a single keypress to a partition.
    Keypress { partition: u8, key: char },
}

impl Command {
    /// Two-digit command code.
    pub fn code(&self) -> &'static str {
        match self {
            Command::Poll => "00",
            Command::ChangePartition { .. } => "01",
            Command::DumpZoneTimers => "02",
            Command::Keypress { .. } => "03",
        }
    }

    /// Data appended after the code.
    pub fn data(&self) -> String {
        match self {
            Command::Poll | Command::DumpZoneTimers => String::new(),
            Command::ChangePartition { partition } => partition.to_string(),
            Command::Keypress { partition, key } => format!("{},{}", partition, key),
        }
    }

    /// Wire frame: `^CODE,DATA$`.
    pub fn to_frame(&self) -> String {
        format!("{}{},{}{}", RESPONSE_MARKER, self.code(), self.data(), FRAME_END)
    }
}
