// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

//! Pure decoders for TPI event payloads.
//!
//! Nothing here touches state; the session decides what to apply.

use crate::constants::{beep_description, CidQualifier, PartitionStatus, EVENT_MARKER};
use crate::error::DecodeError;
use crate::state::{PartitionFlags, ZoneStatus};

/// Zones carried by a `%01` zone state change bitmap.
pub const BITMAP_ZONES: u32 = 64;
/// Partitions carried by a `%02` partition state change.
pub const STATUS_PARTITIONS: u32 = 8;
/// Seconds per tick of the zone timer down-counter.
const ZONE_TIMER_TICK_SECS: i64 = 5;

/// Decoded `%00` virtual keypad update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadUpdate {
    pub partition: u32,
    pub flags: PartitionFlags,
    /// Zone number when the alpha text reports a fault, user number otherwise
    pub user_or_zone: String,
    /// Beep code resolved to its description
    pub beep: &'static str,
    pub alpha: String,
}

impl KeypadUpdate {
    /// Zone the keypad is reporting a fault on, if any.
    ///
    /// Only meaningful while the partition is not ready.
    pub fn fault_zone(&self) -> Option<u32> {
        if !self.alpha.starts_with("FAULT") || self.flags.contains(PartitionFlags::READY) {
            return None;
        }
        self.user_or_zone.trim().parse().ok()
    }
}

/// Decode `partition,flags,user_or_zone,beep,alpha`.
pub fn decode_keypad_update(data: &str) -> Result<KeypadUpdate, DecodeError> {
    if data.contains(EVENT_MARKER) {
        return Err(DecodeError::EmbeddedMarker);
    }
    let fields: Vec<&str> = data.split(',').collect();
    if fields.len() != 5 {
        return Err(DecodeError::FieldCount {
            expected: 5,
            actual: fields.len(),
        });
    }

    let partition = fields[0]
        .trim()
        .parse::<u32>()
        .map_err(|_| DecodeError::InvalidNumber {
            field: "partition",
            value: fields[0].to_string(),
        })?;
    let bits = u16::from_str_radix(fields[1].trim(), 16).map_err(|_| DecodeError::InvalidHex {
        field: "keypad flags",
        value: fields[1].to_string(),
    })?;

    Ok(KeypadUpdate {
        partition,
        flags: PartitionFlags::from_bits_truncate(bits),
        user_or_zone: fields[2].to_string(),
        beep: beep_description(fields[3]),
        alpha: fields[4].to_string(),
    })
}

/// Decode a `%01` zone bitmap into `(zone, status)` for zones 1-64.
///
/// The payload is a little-endian 64-bit word as 16 hex characters; after the
/// byte swap, zone N is bit `64 - N` of the 64-character binary rendering,
/// i.e. bit `N - 1` counting from the least significant end.
pub fn decode_zone_bitmap(data: &str) -> Result<Vec<(u32, ZoneStatus)>, DecodeError> {
    let hex = data.get(..16).ok_or(DecodeError::TooShort {
        expected: 16,
        actual: data.len(),
    })?;
    let bytes = hex_chunks(hex, 2, "zone bitmap")?;
    let big_endian: String = bytes.iter().rev().map(String::as_str).collect();
    let word = u64::from_str_radix(&big_endian, 16).map_err(|_| DecodeError::InvalidHex {
        field: "zone bitmap",
        value: data.to_string(),
    })?;

    Ok((1..=BITMAP_ZONES)
        .map(|zone| {
            let status = if word >> (zone - 1) & 1 == 1 {
                ZoneStatus::Open
            } else {
                ZoneStatus::Closed
            };
            (zone, status)
        })
        .collect())
}

/// One partition's entry from a `%02` partition state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatusEntry {
    pub partition: u32,
    pub code: String,
    /// `None` when the code is not in the status table
    pub status: Option<PartitionStatus>,
}

/// Decode a `%02` payload: eight two-character status codes for partitions 1-8.
pub fn decode_partition_status(data: &str) -> Result<Vec<PartitionStatusEntry>, DecodeError> {
    let expected = STATUS_PARTITIONS as usize * 2;
    let chars: Vec<char> = data.chars().collect();
    if chars.len() < expected {
        return Err(DecodeError::TooShort {
            expected,
            actual: chars.len(),
        });
    }

    Ok(chars[..expected]
        .chunks(2)
        .zip(1..)
        .map(|(pair, partition)| {
            let code: String = pair.iter().collect();
            let status = PartitionStatus::from_code(&code);
            PartitionStatusEntry {
                partition,
                code,
                status,
            }
        })
        .collect())
}

/// One zone's entry from a `%FF` zone timer dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDumpEntry {
    pub zone: u32,
    pub status: ZoneStatus,
    pub closed_seconds: i64,
    pub message: String,
}

/// Decode a `%FF` zone timer dump.
///
/// Each zone is a 4-hex-character little-endian counter that ticks down every
/// five seconds from 0xFFFF once the zone closes. 0xFFFF means open and 0x0000
/// means the counter ran out. A trailing partial chunk is ignored.
pub fn decode_zone_dump(data: &str) -> Result<Vec<ZoneDumpEntry>, DecodeError> {
    let usable = data.len() - data.len() % 4;
    let chunks = hex_chunks(
        data.get(..usable).ok_or(DecodeError::InvalidHex {
            field: "zone dump",
            value: data.to_string(),
        })?,
        4,
        "zone dump",
    )?;

    chunks
        .iter()
        .zip(1..)
        .map(|(chunk, zone)| {
            let swapped = format!("{}{}", &chunk[2..4], &chunk[0..2]);
            let value = u16::from_str_radix(&swapped, 16).map_err(|_| DecodeError::InvalidHex {
                field: "zone dump",
                value: chunk.clone(),
            })?;
            Ok(zone_dump_entry(zone, value))
        })
        .collect()
}

fn zone_dump_entry(zone: u32, value: u16) -> ZoneDumpEntry {
    let closed_seconds = (65536 - i64::from(value)) * ZONE_TIMER_TICK_SECS;
    match value {
        0xFFFF => ZoneDumpEntry {
            zone,
            status: ZoneStatus::Open,
            closed_seconds: 0,
            message: "Currently Open".to_string(),
        },
        0x0000 => ZoneDumpEntry {
            zone,
            status: ZoneStatus::Closed,
            closed_seconds,
            message: "Last Closed longer ago than I can remember".to_string(),
        },
        _ => ZoneDumpEntry {
            zone,
            status: ZoneStatus::Closed,
            closed_seconds,
            message: format!("Last Closed {} ago", human_time_ago(closed_seconds)),
        },
    }
}

/// Decoded `%03` realtime Contact-ID event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidEvent {
    pub qualifier: Option<CidQualifier>,
    pub code: u16,
    pub partition: u32,
    /// Zone or user number, depending on the event code
    pub zone_or_user: u32,
}

/// Decode `QEEEPPZZZ`: qualifier, event code, partition, zone or user.
pub fn decode_cid_event(data: &str) -> Result<CidEvent, DecodeError> {
    let field = |range: std::ops::Range<usize>, name: &'static str| -> Result<u32, DecodeError> {
        let text = data.get(range).ok_or(DecodeError::TooShort {
            expected: 9,
            actual: data.len(),
        })?;
        text.parse().map_err(|_| DecodeError::InvalidNumber {
            field: name,
            value: text.to_string(),
        })
    };

    let qualifier = field(0..1, "cid qualifier")?;
    let code = field(1..4, "cid event")?;
    let partition = field(4..6, "cid partition")?;
    let zone_or_user = field(6..9, "cid zone or user")?;

    Ok(CidEvent {
        qualifier: u8::try_from(qualifier).ok().and_then(CidQualifier::from_digit),
        code: code as u16,
        partition,
        zone_or_user,
    })
}

/// Render a duration in seconds as up to three non-zero units, largest
/// first, e.g. `1 day, 2 hours, 5 seconds`.
pub fn human_time_ago(seconds: i64) -> String {
    let seconds = seconds.unsigned_abs();
    let days = seconds / 86_400;
    let in_day = seconds % 86_400;
    let units = [
        ("year", days / 365),
        ("day", days % 365),
        ("hour", in_day / 3600),
        ("minute", in_day / 60 % 60),
        ("second", in_day % 60),
    ];

    units
        .iter()
        .filter(|(_, n)| *n != 0)
        .take(3)
        .map(|(unit, n)| {
            let plural = if *n == 1 { "" } else { "s" };
            format!("{n} {unit}{plural}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split an ASCII hex string into fixed-width chunks.
fn hex_chunks(data: &str, width: usize, field: &'static str) -> Result<Vec<String>, DecodeError> {
    if !data.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex {
            field,
            value: data.to_string(),
        });
    }
    Ok(data
        .as_bytes()
        .chunks(width)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect())
}
