// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use bitflags::bitflags;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::constants::PartitionStatus;

bitflags! {
    /// Partition flags.
    ///
    /// Bit positions are those of the 16-bit keypad LED/icon word carried by
    /// `%00` keypad updates, so a raw word decodes with `from_bits_truncate`.
    /// Bits 6, 10 and 11 are unused on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartitionFlags: u16 {
        const ALARM           = 1 << 0;
        const ALARM_IN_MEMORY = 1 << 1;
        const ARMED_AWAY      = 1 << 2;
        const AC_PRESENT      = 1 << 3;
        const BYPASS          = 1 << 4;
        const CHIME           = 1 << 5;
        /// Armed with zero entry delay
        const ARMED_MAX       = 1 << 7;
        /// Alarm on a fire zone
        const ALARM_FIRE      = 1 << 8;
        const SYSTEM_TROUBLE  = 1 << 9;
        const READY           = 1 << 12;
        const FIRE            = 1 << 13;
        const LOW_BATTERY     = 1 << 14;
        const ARMED_STAY      = 1 << 15;
    }
}

/// Serialized field names, in wire bit order.
pub const PARTITION_FLAG_NAMES: [(&str, PartitionFlags); 13] = [
    ("alarm", PartitionFlags::ALARM),
    ("alarm_in_memory", PartitionFlags::ALARM_IN_MEMORY),
    ("armed_away", PartitionFlags::ARMED_AWAY),
    ("ac_present", PartitionFlags::AC_PRESENT),
    ("bypass", PartitionFlags::BYPASS),
    ("chime", PartitionFlags::CHIME),
    ("armed_max", PartitionFlags::ARMED_MAX),
    ("alarm_fire", PartitionFlags::ALARM_FIRE),
    ("system_trouble", PartitionFlags::SYSTEM_TROUBLE),
    ("ready", PartitionFlags::READY),
    ("fire", PartitionFlags::FIRE),
    ("low_battery", PartitionFlags::LOW_BATTERY),
    ("armed_stay", PartitionFlags::ARMED_STAY),
];

/// Flags a `%02` status code can speak for. The rest keep their stored value.
const STATUS_CODE_FLAGS: PartitionFlags = PartitionFlags::ALARM
    .union(PartitionFlags::ALARM_IN_MEMORY)
    .union(PartitionFlags::ARMED_AWAY)
    .union(PartitionFlags::BYPASS)
    .union(PartitionFlags::ARMED_MAX)
    .union(PartitionFlags::ALARM_FIRE)
    .union(PartitionFlags::READY)
    .union(PartitionFlags::FIRE)
    .union(PartitionFlags::ARMED_STAY);

impl PartitionFlags {
    /// Flags implied by a partition status code.
    pub fn from_status(status: PartitionStatus) -> Self {
        match status {
            PartitionStatus::InAlarm => Self::ALARM,
            PartitionStatus::AlarmInMemory => Self::ALARM_IN_MEMORY,
            PartitionStatus::ArmedAway => Self::ARMED_AWAY,
            PartitionStatus::ReadyBypass => Self::BYPASS,
            PartitionStatus::ArmedMax => Self::ARMED_MAX,
            PartitionStatus::AlarmFire => Self::ALARM_FIRE | Self::FIRE,
            PartitionStatus::Ready => Self::READY,
            PartitionStatus::ArmedStay => Self::ARMED_STAY,
            PartitionStatus::NotUsed | PartitionStatus::NotReady | PartitionStatus::ExitEntryDelay => {
                Self::empty()
            }
        }
    }

    /// Names of the set flags, for logging.
    pub fn names(&self) -> Vec<&'static str> {
        PARTITION_FLAG_NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Incoming partition fields to merge into the stored record.
///
/// Only flags in `mask` are overwritten; `None` fields are left as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionUpdate {
    pub flags: PartitionFlags,
    pub mask: PartitionFlags,
    pub status: Option<String>,
    pub message: Option<String>,
    pub beep: Option<String>,
}

impl PartitionUpdate {
    /// A keypad update speaks for every flag.
    pub fn from_keypad(flags: PartitionFlags, beep: &str, message: &str) -> Self {
        Self {
            flags,
            mask: PartitionFlags::all(),
            status: None,
            message: Some(message.to_string()),
            beep: Some(beep.to_string()),
        }
    }

    /// A partition status code speaks for the flags it can infer, plus `status`.
    pub fn from_status(status: PartitionStatus) -> Self {
        Self {
            flags: PartitionFlags::from_status(status),
            mask: STATUS_CODE_FLAGS,
            status: Some(status.name().to_string()),
            message: None,
            beep: None,
        }
    }
}

/// A single partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionState {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub message: String,
    pub beep: String,
    pub flags: PartitionFlags,
    pub last_changed: Option<String>,
}

impl PartitionState {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: "uninitialized".to_string(),
            message: "uninitialized".to_string(),
            beep: "uninitialized".to_string(),
            flags: PartitionFlags::empty(),
            last_changed: None,
        }
    }

    /// Merge an update. Returns true if anything other than `message` or
    /// `status` differed, in which case `last_changed` is stamped.
    pub fn apply(&mut self, update: &PartitionUpdate, time_text: &str) -> bool {
        let merged = (self.flags & !update.mask) | (update.flags & update.mask);
        let beep_changed = update.beep.as_ref().is_some_and(|b| *b != self.beep);
        let changed = merged != self.flags || beep_changed;

        if changed {
            self.last_changed = Some(time_text.to_string());
        }
        self.flags = merged;
        if let Some(status) = &update.status {
            self.status.clone_from(status);
        }
        if let Some(message) = &update.message {
            self.message.clone_from(message);
        }
        if let Some(beep) = &update.beep {
            self.beep.clone_from(beep);
        }
        changed
    }

    pub fn is_ready(&self) -> bool {
        self.flags.contains(PartitionFlags::READY)
    }

}

impl Serialize for PartitionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("beep", &self.beep)?;
        for (name, flag) in &PARTITION_FLAG_NAMES {
            map.serialize_entry(name, &self.flags.contains(*flag))?;
        }
        if let Some(last_changed) = &self.last_changed {
            map.serialize_entry("lastChanged", last_changed)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: &str = "2026-01-01 10:00:00";
    const T2: &str = "2026-01-01 10:05:00";

    #[test]
    fn test_keypad_word_bit_layout() {
        // 0x1C08 sets bits 3, 10, 11 and 12; 10 and 11 are unused
        let flags = PartitionFlags::from_bits_truncate(0x1C08);
        assert!(flags.contains(PartitionFlags::AC_PRESENT));
        assert!(flags.contains(PartitionFlags::READY));
        assert!(!flags.contains(PartitionFlags::FIRE));
        assert_eq!(flags.names(), vec!["ac_present", "ready"]);

        assert_eq!(PartitionFlags::from_bits_truncate(0x8000), PartitionFlags::ARMED_STAY);
        assert_eq!(PartitionFlags::from_bits_truncate(0x0080), PartitionFlags::ARMED_MAX);
        assert_eq!(PartitionFlags::from_bits_truncate(0x0100), PartitionFlags::ALARM_FIRE);
        assert_eq!(PartitionFlags::from_bits_truncate(0x0040), PartitionFlags::empty());
    }

    #[test]
    fn test_flag_change_stamps_last_changed() {
        let mut part = PartitionState::new(1, "House");
        let update = PartitionUpdate::from_keypad(PartitionFlags::READY, "off", "Ready to Arm");
        assert!(part.apply(&update, T1));
        assert_eq!(part.last_changed.as_deref(), Some(T1));
        assert!(part.is_ready());
    }

    #[test]
    fn test_message_only_change_is_not_a_state_change() {
        let mut part = PartitionState::new(1, "House");
        part.apply(&PartitionUpdate::from_keypad(PartitionFlags::READY, "off", "Ready"), T1);

        let changed = part.apply(
            &PartitionUpdate::from_keypad(PartitionFlags::READY, "off", "Ready to Arm"),
            T2,
        );
        assert!(!changed);
        assert_eq!(part.message, "Ready to Arm");
        assert_eq!(part.last_changed.as_deref(), Some(T1));
    }

    #[test]
    fn test_status_only_change_is_not_a_state_change() {
        let mut part = PartitionState::new(1, "House");
        part.apply(&PartitionUpdate::from_status(PartitionStatus::NotReady), T1);
        // Initial flags were already empty, so only beep/status moved - status doesn't count
        assert_eq!(part.last_changed, None);
        assert_eq!(part.status, "NOT_READY");

        part.apply(&PartitionUpdate::from_status(PartitionStatus::ExitEntryDelay), T2);
        assert_eq!(part.last_changed, None);
        assert_eq!(part.status, "EXIT_ENTRY_DELAY");
    }

    #[test]
    fn test_status_code_leaves_unmasked_flags() {
        let mut part = PartitionState::new(1, "House");
        let keypad = PartitionFlags::AC_PRESENT | PartitionFlags::CHIME | PartitionFlags::READY;
        part.apply(&PartitionUpdate::from_keypad(keypad, "off", "Ready"), T1);

        assert!(part.apply(&PartitionUpdate::from_status(PartitionStatus::ArmedAway), T2));
        assert!(part.flags.contains(PartitionFlags::AC_PRESENT));
        assert!(part.flags.contains(PartitionFlags::CHIME));
        assert!(part.flags.contains(PartitionFlags::ARMED_AWAY));
        assert!(!part.is_ready());
        assert_eq!(part.status, "ARMED_AWAY");
    }

    #[test]
    fn test_beep_change_counts() {
        let mut part = PartitionState::new(1, "House");
        part.apply(&PartitionUpdate::from_keypad(PartitionFlags::empty(), "off", "x"), T1);
        assert!(part.apply(
            &PartitionUpdate::from_keypad(PartitionFlags::empty(), "beep 1 time", "x"),
            T2
        ));
        assert_eq!(part.last_changed.as_deref(), Some(T2));
    }

    #[test]
    fn test_fire_status_sets_both_fire_flags() {
        let flags = PartitionFlags::from_status(PartitionStatus::AlarmFire);
        assert_eq!(flags, PartitionFlags::ALARM_FIRE | PartitionFlags::FIRE);
        assert_eq!(PartitionFlags::from_status(PartitionStatus::NotReady), PartitionFlags::empty());
    }

    #[test]
    fn test_partition_serialization() {
        let mut part = PartitionState::new(1, "House");
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["name"], "House");
        assert_eq!(json["ready"], false);
        assert_eq!(json["armed_max"], false);
        assert!(json.get("lastChanged").is_none());

        part.apply(&PartitionUpdate::from_keypad(PartitionFlags::READY, "off", "Ready"), T1);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["ready"], true);
        assert_eq!(json["lastChanged"], T1);
        assert_eq!(json["message"], "Ready");
    }
}
