// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Highest zone number the TPI can report.
pub const MAX_ZONES: u32 = 128;
/// Highest partition number the TPI can report.
pub const MAX_PARTITIONS: u32 = 16;
/// Highest alarm user number used by CID events.
pub const MAX_ALARM_USERS: u32 = 47;

/// Configuration for the panel connection and its session timers.
///
/// Populated by the binary from the TOML file; the library only consumes
/// already-typed values.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Envisalink host name or IP
    pub host: String,
    /// TPI port (default: 4025)
    pub port: u16,
    /// TPI password, sent in reply to the login prompt
    pub password: String,
    /// Interval between `00` poll commands; zero disables polling
    pub poll_interval: Duration,
    /// Interval between zone timer dump requests
    pub zone_dump_interval: Duration,
    /// Minimum spacing between applied keypad updates
    pub keypad_update_interval: Duration,
    /// How long a command may stay unanswered before the link is reset
    pub command_timeout: Duration,
    /// How long the panel may go without a keypad update before the link is reset
    pub keypad_event_timeout: Duration,
    /// Zone names by zone number (1-128). Unnamed zones are not tracked.
    pub zone_names: BTreeMap<u32, String>,
    /// Partition names by partition number (1-16). Unnamed partitions are not tracked.
    pub partition_names: BTreeMap<u32, String>,
    /// Alarm user names by user number (1-47), used when logging CID events
    pub user_names: BTreeMap<u32, String>,
    /// Reconnection backoff policy
    pub backoff: BackoffConfig,
    /// Upper bound on a single TCP connect attempt
    pub connect_timeout: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            host: "envisalink".to_string(),
            port: 4025,
            password: "user".to_string(),
            poll_interval: Duration::ZERO,
            zone_dump_interval: Duration::from_secs(60),
            keypad_update_interval: Duration::from_secs(60),
            command_timeout: Duration::from_secs(30),
            keypad_event_timeout: Duration::from_secs(45),
            zone_names: BTreeMap::new(),
            partition_names: BTreeMap::new(),
            user_names: BTreeMap::new(),
            backoff: BackoffConfig::default(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl PanelConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> PanelConfigBuilder {
        PanelConfigBuilder::default()
    }

    /// Address suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn zone_name(&self, zone: u32) -> Option<&str> {
        self.zone_names.get(&zone).map(String::as_str)
    }

    pub fn partition_name(&self, partition: u32) -> Option<&str> {
        self.partition_names.get(&partition).map(String::as_str)
    }

    pub fn user_name(&self, user: u32) -> Option<&str> {
        self.user_names.get(&user).map(String::as_str)
    }

    /// Reject name tables with ids the panel can never report.
    pub fn validate(&self) -> Result<()> {
        check_ids("zone", &self.zone_names, MAX_ZONES)?;
        check_ids("partition", &self.partition_names, MAX_PARTITIONS)?;
        check_ids("user", &self.user_names, MAX_ALARM_USERS)?;
        if self.backoff.factor < 1.0 {
            return Err(BridgeError::InvalidConfig {
                details: format!("backoff factor must be >= 1, got {}", self.backoff.factor),
            });
        }
        Ok(())
    }
}

fn check_ids(kind: &str, names: &BTreeMap<u32, String>, max: u32) -> Result<()> {
    match names.keys().find(|id| **id == 0 || **id > max) {
        Some(id) => Err(BridgeError::InvalidConfig {
            details: format!("{kind} id {id} out of range 1-{max}"),
        }),
        None => Ok(()),
    }
}

/// Exponential reconnect delay policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Growth factor per consecutive failure
    pub factor: f64,
    /// Ceiling for the delay
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            factor: std::f64::consts::E,
            max_delay: Duration::from_secs(3600),
        }
    }
}

/// Builder for PanelConfig.
#[derive(Debug, Clone, Default)]
pub struct PanelConfigBuilder {
    config: PanelConfig,
}

impl PanelConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn zone_dump_interval(mut self, interval: Duration) -> Self {
        self.config.zone_dump_interval = interval;
        self
    }

    pub fn keypad_update_interval(mut self, interval: Duration) -> Self {
        self.config.keypad_update_interval = interval;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    pub fn keypad_event_timeout(mut self, timeout: Duration) -> Self {
        self.config.keypad_event_timeout = timeout;
        self
    }

    pub fn zone_name(mut self, zone: u32, name: impl Into<String>) -> Self {
        self.config.zone_names.insert(zone, name.into());
        self
    }

    pub fn zone_names(mut self, names: BTreeMap<u32, String>) -> Self {
        self.config.zone_names = names;
        self
    }

    pub fn partition_name(mut self, partition: u32, name: impl Into<String>) -> Self {
        self.config.partition_names.insert(partition, name.into());
        self
    }

    pub fn partition_names(mut self, names: BTreeMap<u32, String>) -> Self {
        self.config.partition_names = names;
        self
    }

    pub fn user_names(mut self, names: BTreeMap<u32, String>) -> Self {
        self.config.user_names = names;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> PanelConfig {
        self.config
    }
}

/// Configuration for the outbound notification endpoint.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Base URL, e.g. `https://graph.api.smartthings.com/api/smartapps/installations`
    pub base_url: String,
    /// App id appended to the base URL
    pub app_id: String,
    /// Access token sent as the `access_token` query parameter
    pub access_token: String,
    /// Per-request HTTP timeout
    pub api_timeout: Duration,
    /// Maximum queued notifications before the oldest is dropped
    pub queue_size: usize,
    /// Identical payloads sent within this window are suppressed
    pub repeat_update_interval: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: "not_provided".to_string(),
            app_id: "not_provided".to_string(),
            access_token: "not_provided".to_string(),
            api_timeout: Duration::from_secs(10),
            queue_size: 100,
            repeat_update_interval: Duration::from_secs(55),
        }
    }
}

impl NotifyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(BridgeError::InvalidConfig {
                details: "queue_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// `{base_url}/{app_id}`, the prefix every delivery path is appended to.
    pub fn url_base(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.app_id.trim_matches('/')
        )
    }
}
