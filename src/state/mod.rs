// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

//! In-memory alarm state: every configured zone and partition.

pub mod partition;
pub mod zone;

use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeDelta};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PanelConfig;
use crate::decode::ZoneDumpEntry;

pub use partition::{PartitionFlags, PartitionState, PartitionUpdate, PARTITION_FLAG_NAMES};
pub use zone::{ZoneState, ZoneStatus};

/// Closures reported by a zone timer dump younger than this are ignored.
pub const ZONE_DUMP_DEBOUNCE_SECS: i64 = 60;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a local time the way it is stored in state.
pub fn format_time(time: &DateTime<Local>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Current local time as stored in state.
pub fn time_text() -> String {
    format_time(&Local::now())
}

/// Zone and partition records, keyed by number.
///
/// Only named zones and partitions are tracked; everything the panel reports
/// about anything else is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlarmState {
    pub zone: BTreeMap<u32, ZoneState>,
    pub partition: BTreeMap<u32, PartitionState>,
}

impl AlarmState {
    pub fn from_config(config: &PanelConfig) -> Self {
        let zone = config
            .zone_names
            .iter()
            .map(|(id, name)| (*id, ZoneState::new(*id, name.clone())))
            .collect();
        let partition = config
            .partition_names
            .iter()
            .map(|(id, name)| (*id, PartitionState::new(*id, name.clone())))
            .collect();
        Self { zone, partition }
    }

    pub fn zone(&self, id: u32) -> Option<&ZoneState> {
        self.zone.get(&id)
    }

    pub fn partition(&self, id: u32) -> Option<&PartitionState> {
        self.partition.get(&id)
    }

    pub fn has_zone(&self, id: u32) -> bool {
        self.zone.contains_key(&id)
    }

    pub fn has_partition(&self, id: u32) -> bool {
        self.partition.contains_key(&id)
    }

    /// Set a zone's status. Untracked zones are ignored.
    ///
    /// Returns true if the zone changed.
    pub fn update_zone_status(&mut self, id: u32, status: ZoneStatus, time_text: &str) -> bool {
        let Some(zone) = self.zone.get_mut(&id) else {
            return false;
        };
        let changed = zone.update_status(status, time_text);
        if changed {
            info!("Zone {} ({}) {}", id, zone.name, status);
        }
        changed
    }

    /// Merge a partition update into the stored record.
    ///
    /// A ready partition cannot have open zones, so when the merged record is
    /// ready every tracked zone is marked closed. Returns true if anything
    /// other than the message or status changed.
    pub fn set_partition_status(&mut self, id: u32, update: &PartitionUpdate, time_text: &str) -> bool {
        let Some(part) = self.partition.get_mut(&id) else {
            return false;
        };

        let changed = part.apply(update, time_text);
        if changed {
            info!(
                "Partition {} ({}) state changed: [{}] {}",
                id,
                part.name,
                part.flags.names().join(", "),
                part.message
            );
        } else {
            debug!("Partition {} ({}) unchanged: {}", id, part.name, part.message);
        }

        if part.is_ready() {
            let ids: Vec<u32> = self.zone.keys().copied().collect();
            for zone in ids {
                self.update_zone_status(zone, ZoneStatus::Closed, time_text);
            }
        }
        changed
    }

    /// Apply a zone timer dump taken at `now`.
    ///
    /// Entries for untracked zones, entries that agree with the stored status
    /// and closures younger than [`ZONE_DUMP_DEBOUNCE_SECS`] are skipped.
    /// Returns the number of zones updated.
    pub fn apply_zone_dump(&mut self, entries: &[ZoneDumpEntry], now: DateTime<Local>) -> usize {
        let mut applied = 0;
        for entry in entries {
            let Some(zone) = self.zone.get_mut(&entry.zone) else {
                continue;
            };
            if zone.status == entry.status {
                continue;
            }
            if entry.status == ZoneStatus::Closed && entry.closed_seconds < ZONE_DUMP_DEBOUNCE_SECS {
                debug!(
                    "Zone {} ({}) closed {}s ago, ignoring until it settles",
                    entry.zone, zone.name, entry.closed_seconds
                );
                continue;
            }

            let changed_at = TimeDelta::try_seconds(entry.closed_seconds)
                .and_then(|ago| now.checked_sub_signed(ago))
                .unwrap_or(now);

            info!("Zone {} ({}) {}: {}", entry.zone, zone.name, entry.status, entry.message);
            zone.status = entry.status;
            zone.message.clone_from(&entry.message);
            zone.closed_seconds = entry.closed_seconds;
            zone.last_changed = format_time(&changed_at);
            applied += 1;
        }
        applied
    }
}
