// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::fmt;

use serde::Serialize;

/// Open/closed state of a zone as last reported by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    Uninitialized,
    Open,
    Closed,
}

impl ZoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single monitored zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    #[serde(skip)]
    pub id: u32,
    pub name: String,
    pub message: String,
    pub status: ZoneStatus,
    /// Seconds since the zone last closed; -1 until the panel tells us.
    pub closed_seconds: i64,
    /// Timestamp of the last transition, or `never`.
    pub last_changed: String,
}

impl ZoneState {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            message: ZoneStatus::Uninitialized.to_string(),
            status: ZoneStatus::Uninitialized,
            closed_seconds: -1,
            last_changed: "never".to_string(),
        }
    }

    /// Record a status report. Returns true if the status actually changed.
    pub fn update_status(&mut self, status: ZoneStatus, time_text: &str) -> bool {
        if self.status == status {
            return false;
        }
        self.message = format!("{} at {}", status, time_text);
        self.status = status;
        self.closed_seconds = 0;
        self.last_changed = time_text.to_string();
        true
    }

    pub fn is_open(&self) -> bool {
        self.status == ZoneStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == ZoneStatus::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_zone_is_uninitialized() {
        let zone = ZoneState::new(3, "Kitchen Window");
        assert_eq!(zone.status, ZoneStatus::Uninitialized);
        assert_eq!(zone.closed_seconds, -1);
        assert_eq!(zone.last_changed, "never");
        assert_eq!(zone.message, "uninitialized");
    }

    #[test]
    fn test_update_status_transition() {
        let mut zone = ZoneState::new(1, "Front Door");
        assert!(zone.update_status(ZoneStatus::Open, "2026-01-02 03:04:05"));
        assert!(zone.is_open());
        assert_eq!(zone.message, "open at 2026-01-02 03:04:05");
        assert_eq!(zone.last_changed, "2026-01-02 03:04:05");
        assert_eq!(zone.closed_seconds, 0);

        // Same status again is not a transition and leaves the record alone
        assert!(!zone.update_status(ZoneStatus::Open, "2026-01-02 03:09:00"));
        assert_eq!(zone.last_changed, "2026-01-02 03:04:05");
    }

    #[test]
    fn test_zone_serializes_camel_case() {
        let zone = ZoneState::new(1, "Front Door");
        let json = serde_json::to_value(&zone).unwrap();
        assert_eq!(json["name"], "Front Door");
        assert_eq!(json["status"], "uninitialized");
        assert_eq!(json["closedSeconds"], -1);
        assert_eq!(json["lastChanged"], "never");
        assert!(json.get("id").is_none());
    }
}
