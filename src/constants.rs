// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

/// Marker opening an asynchronous TPI event (`%00,...$`).
pub const EVENT_MARKER: char = '%';
/// Marker opening a command response (`^00,...$`).
pub const RESPONSE_MARKER: char = '^';
/// Trailing frame terminator.
pub const FRAME_END: char = '$';
/// Outbound line terminator.
pub const LINE_END: &str = "\r\n";

/// Partition status reported by the `%02` partition state change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionStatus {
    NotUsed,
    Ready,
    ReadyBypass,
    NotReady,
    ArmedStay,
    ArmedAway,
    ArmedMax,
    ExitEntryDelay,
    InAlarm,
    AlarmInMemory,
    AlarmFire,
}

impl PartitionStatus {
    /// Look up a two-character status code (e.g. "01").
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "00" => Some(Self::NotUsed),
            "01" => Some(Self::Ready),
            "02" => Some(Self::ReadyBypass),
            "03" => Some(Self::NotReady),
            "04" => Some(Self::ArmedStay),
            "05" => Some(Self::ArmedAway),
            "06" => Some(Self::ArmedMax),
            "07" => Some(Self::ExitEntryDelay),
            "08" => Some(Self::InAlarm),
            "09" => Some(Self::AlarmInMemory),
            "0A" | "0a" => Some(Self::AlarmFire),
            _ => None,
        }
    }

    /// Name stored in the partition's `status` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotUsed => "NOT_USED",
            Self::Ready => "READY",
            Self::ReadyBypass => "READY_BYPASS",
            Self::NotReady => "NOT_READY",
            Self::ArmedStay => "ARMED_STAY",
            Self::ArmedAway => "ARMED_AWAY",
            Self::ArmedMax => "ARMED_MAX",
            Self::ExitEntryDelay => "EXIT_ENTRY_DELAY",
            Self::InAlarm => "IN_ALARM",
            Self::AlarmInMemory => "ALARM_IN_MEMORY",
            Self::AlarmFire => "ALARM_FIRE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NotUsed => "Partition is not used or doesn't exist",
            Self::Ready => "Ready",
            Self::ReadyBypass => "Ready to Arm (Zones are Bypassed)",
            Self::NotReady => "Not Ready",
            Self::ArmedStay => "Armed in Stay Mode",
            Self::ArmedAway => "Armed in Away Mode",
            Self::ArmedMax => "Armed in Away Mode with zero entry delay",
            Self::ExitEntryDelay => "Entry or Exit Delay",
            Self::InAlarm => "Partition is in Alarm",
            Self::AlarmInMemory => "Alarm Has Occurred (Alarm in Memory)",
            Self::AlarmFire => "Fire Alarm",
        }
    }
}

/// Describe the keypad beep code carried by a `%00` keypad update.
pub fn beep_description(code: &str) -> &'static str {
    match code {
        "00" => "off",
        "01" => "beep 1 time",
        "02" => "beep 2 times",
        "03" => "beep 3 times",
        "04" => "continous fast beep",
        "05" => "continuous slow beep",
        _ => "unknown",
    }
}

/// Contact-ID event qualifier (first digit of a `%03` payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CidQualifier {
    NewEvent,
    Restore,
    StillPresent,
}

impl CidQualifier {
    pub fn from_digit(d: u8) -> Option<Self> {
        match d {
            1 => Some(Self::NewEvent),
            3 => Some(Self::Restore),
            6 => Some(Self::StillPresent),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::NewEvent => "New Event or Opening",
            Self::Restore => "New Restore or Closing",
            Self::StillPresent => "Previously Reported Condition Still Present",
        }
    }
}

/// What the trailing three-digit field of a CID event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CidSubject {
    Zone,
    User,
}

/// Contact-ID event codes: (code, subject, label).
pub const CID_EVENTS: &[(u16, CidSubject, &str)] = &[
    (100, CidSubject::Zone, "Medical Alert"),
    (101, CidSubject::Zone, "Personal Emergency"),
    (102, CidSubject::Zone, "Failure to Report In"),
    (110, CidSubject::Zone, "Fire Alarm"),
    (111, CidSubject::Zone, "Smoke Alarm"),
    (117, CidSubject::Zone, "Flame Detected"),
    (118, CidSubject::Zone, "Near Alarm"),
    (120, CidSubject::Zone, "Panic Alarm"),
    (121, CidSubject::User, "Duress"),
    (122, CidSubject::Zone, "Alarm, 24-hour Silent"),
    (123, CidSubject::Zone, "Alarm, 24-hour Audible"),
    (130, CidSubject::Zone, "Burglary"),
    (131, CidSubject::Zone, "Alarm, Perimeter"),
    (132, CidSubject::Zone, "Alarm, Interior"),
    (133, CidSubject::Zone, "24 Hour (Safe)"),
    (134, CidSubject::Zone, "Alarm, Entry/Exit"),
    (135, CidSubject::Zone, "Alarm, Day/Night"),
    (137, CidSubject::Zone, "Tamper"),
    (143, CidSubject::Zone, "Expansion Module Failure"),
    (145, CidSubject::Zone, "ECP Module Cover Tamper"),
    (150, CidSubject::Zone, "24 Hour Non-Burglary"),
    (162, CidSubject::Zone, "Carbon Monoxide Detected"),
    (301, CidSubject::Zone, "AC Power"),
    (302, CidSubject::Zone, "Low System Battery"),
    (305, CidSubject::Zone, "System Reset"),
    (321, CidSubject::Zone, "Bell 1 Trouble"),
    (333, CidSubject::Zone, "Trouble, Expansion Module"),
    (344, CidSubject::Zone, "RF Receiver Jam"),
    (350, CidSubject::Zone, "Communication Trouble"),
    (373, CidSubject::Zone, "Fire Loop Trouble"),
    (380, CidSubject::Zone, "Sensor Trouble"),
    (381, CidSubject::Zone, "Loss of Supervision (RF)"),
    (383, CidSubject::Zone, "Sensor Tamper"),
    (384, CidSubject::Zone, "RF Transmitter Low Battery"),
    (401, CidSubject::User, "Arm/Disarm By User"),
    (403, CidSubject::User, "Schedule Arm/Disarm"),
    (406, CidSubject::User, "Cancel by User"),
    (407, CidSubject::User, "Remote Arm/Disarm"),
    (408, CidSubject::User, "Quick Arm"),
    (441, CidSubject::User, "Armed Stay"),
    (570, CidSubject::Zone, "Bypass"),
    (602, CidSubject::Zone, "Periodic Test Report"),
    (627, CidSubject::Zone, "Program Mode Entry"),
    (628, CidSubject::Zone, "Program Mode Exit"),
];

/// Look up a Contact-ID event code.
pub fn cid_event(code: u16) -> Option<(CidSubject, &'static str)> {
    CID_EVENTS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, subject, label)| (*subject, *label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_status_codes() {
        assert_eq!(PartitionStatus::from_code("00"), Some(PartitionStatus::NotUsed));
        assert_eq!(PartitionStatus::from_code("01").unwrap().name(), "READY");
        assert_eq!(PartitionStatus::from_code("06").unwrap().name(), "ARMED_MAX");
        assert_eq!(PartitionStatus::from_code("0A").unwrap().name(), "ALARM_FIRE");
        assert!(PartitionStatus::from_code("ZZ").is_none());
        assert!(PartitionStatus::from_code("1").is_none());
    }

    #[test]
    fn test_beep_description() {
        assert_eq!(beep_description("00"), "off");
        assert_eq!(beep_description("03"), "beep 3 times");
        assert_eq!(beep_description("99"), "unknown");
    }

    #[test]
    fn test_cid_lookup() {
        assert_eq!(cid_event(130), Some((CidSubject::Zone, "Burglary")));
        assert_eq!(cid_event(401).map(|(s, _)| s), Some(CidSubject::User));
        assert!(cid_event(999).is_none());
        assert_eq!(CidQualifier::from_digit(3), Some(CidQualifier::Restore));
        assert!(CidQualifier::from_digit(2).is_none());
    }
}
