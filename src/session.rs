// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

//! TPI session state machine.
//!
//! The session does no I/O of its own. The connection loop feeds it inbound
//! lines and a 1-second tick, then writes whatever it queued for sending and
//! closes the socket when it asks to. Every method takes the current
//! [`Instant`] so timing behaviour is deterministic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::config::PanelConfig;
use crate::constants::{cid_event, CidSubject, PartitionStatus};
use crate::decode::{
    decode_cid_event, decode_keypad_update, decode_partition_status, decode_zone_bitmap,
    decode_zone_dump,
};
use crate::error::TpiResponseCode;
use crate::notify::Notifier;
use crate::protocol::{Command, Message, ResponseCode};
use crate::state::{time_text, AlarmState, PartitionUpdate, ZoneStatus};

/// Highest partition `change_partition` and keypresses accept.
pub const MAX_KEYPAD_PARTITION: u8 = 8;

const COMMAND_TIMEOUT_MESSAGE: &str =
    "Timed out waiting for command response, resetting connection...";
const KEYPAD_TIMEOUT_MESSAGE: &str =
    "No recent keypad updates from envisalink, resetting connection...";

/// Connection phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    AwaitingLogin,
    LoggedIn,
}

/// The one command allowed in flight.
#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    code: &'static str,
    sent_at: Instant,
}

/// One TPI session, from TCP connect to logout.
///
/// Owns the [`AlarmState`] while connected; the supervisor takes it back with
/// [`PanelSession::into_state`] so state survives reconnects.
pub struct PanelSession {
    config: Arc<PanelConfig>,
    state: AlarmState,
    notifier: Arc<dyn Notifier>,
    session_state: SessionState,
    pending: Option<PendingCommand>,
    last_command_response: Option<Instant>,
    last_poll: Option<Instant>,
    last_poll_response: Option<Instant>,
    last_zone_dump: Option<Instant>,
    last_keypad_update: Instant,
    last_partition_update: Option<Instant>,
    outbox: VecDeque<String>,
    close_requested: bool,
}

impl PanelSession {
    /// Start a session on a freshly connected socket.
    pub fn new(
        config: Arc<PanelConfig>,
        state: AlarmState,
        notifier: Arc<dyn Notifier>,
        now: Instant,
    ) -> Self {
        Self {
            config,
            state,
            notifier,
            session_state: SessionState::AwaitingLogin,
            pending: None,
            last_command_response: None,
            last_poll: None,
            last_poll_response: None,
            last_zone_dump: None,
            last_keypad_update: now,
            last_partition_update: None,
            outbox: VecDeque::new(),
            close_requested: false,
        }
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn into_state(self) -> AlarmState {
        self.state
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn is_logged_in(&self) -> bool {
        self.session_state == SessionState::LoggedIn
    }

    /// Whether a tracked command is awaiting its response.
    pub fn command_in_progress(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_command_response(&self) -> Option<Instant> {
        self.last_command_response
    }

    pub fn last_poll_response(&self) -> Option<Instant> {
        self.last_poll_response
    }

    /// Drain lines queued for the socket. The caller appends the line ending.
    pub fn take_outbound(&mut self) -> Vec<String> {
        self.outbox.drain(..).collect()
    }

    /// True once the session has logged out and the socket should close.
    pub fn wants_close(&self) -> bool {
        self.close_requested
    }

    /// End the session. The connection loop closes the socket and the
    /// supervisor reconnects.
    pub fn logout(&mut self) {
        debug!("Ending Envisalink client connection...");
        self.session_state = SessionState::Disconnected;
        self.pending = None;
        self.close_requested = true;
    }

    fn send_raw(&mut self, line: String) {
        debug!("TX > {}", line);
        self.outbox.push_back(line);
    }

    // ---- inbound ----

    /// Handle one line received from the panel.
    pub fn handle_line(&mut self, line: &str, now: Instant) {
        let Some(msg) = Message::parse(line) else {
            return;
        };
        debug!("RX < {}", line);

        let handler = if self.session_state == SessionState::AwaitingLogin && !msg.framed {
            // Anything unframed before login that isn't a login result is the prompt
            Some(match ResponseCode::from_code(&msg.code) {
                Some(
                    code @ (ResponseCode::LoginSuccess
                    | ResponseCode::LoginFailure
                    | ResponseCode::LoginTimeout),
                ) => code,
                _ => ResponseCode::LoginPrompt,
            })
        } else {
            ResponseCode::from_code(&msg.code)
        };

        let Some(handler) = handler else {
            warn!("No handler defined for {}, skipping...", msg.code);
            return;
        };

        match handler {
            ResponseCode::LoginPrompt => self.handle_login(),
            ResponseCode::LoginSuccess => self.handle_login_success(),
            ResponseCode::LoginFailure => self.handle_login_failure(),
            ResponseCode::LoginTimeout => self.handle_login_timeout(),
            ResponseCode::KeypadUpdate => self.handle_keypad_update(&msg.data, now),
            ResponseCode::ZoneStateChange => self.handle_zone_state_change(&msg.data),
            ResponseCode::PartitionStateChange => self.handle_partition_state_change(&msg.data),
            ResponseCode::RealtimeCidEvent => self.handle_realtime_cid_event(&msg.data),
            ResponseCode::ZoneTimerDump => self.handle_zone_timer_dump(&msg.data),
            ResponseCode::PollResponse => self.handle_poll_response(&msg.data, now),
            ResponseCode::CommandResponse => self.handle_command_response(&msg.data, now),
        }
    }

    fn handle_login(&mut self) {
        let password = self.config.password.clone();
        self.send_raw(password);
    }

    fn handle_login_success(&mut self) {
        self.session_state = SessionState::LoggedIn;
        info!("Password accepted, session created");
    }

    fn handle_login_failure(&mut self) {
        error!("Password is incorrect. Server is closing socket connection.");
        self.logout();
    }

    fn handle_login_timeout(&mut self) {
        error!("Envisalink timed out waiting for password. Server is closing socket connection.");
        self.logout();
    }

    fn handle_poll_response(&mut self, data: &str, now: Instant) {
        self.last_poll_response = Some(now);
        self.handle_command_response(data, now);
    }

    fn handle_command_response(&mut self, data: &str, now: Instant) {
        if let Some(pending) = self.pending.take() {
            debug!(
                "Command {} answered after {:?}",
                pending.code,
                now.saturating_duration_since(pending.sent_at)
            );
        }
        self.last_command_response = Some(now);

        match TpiResponseCode::from_code(data) {
            Some(code) if code.is_success() => debug!("Envisalink response: {}", code),
            Some(code) => error!("Error sending command to envisalink. Response was: {}", code),
            None => error!("Unknown envisalink response code: {:?}", data),
        }
    }

    fn handle_keypad_update(&mut self, data: &str, now: Instant) {
        self.last_keypad_update = now;

        let update = match decode_keypad_update(data) {
            Ok(update) => update,
            Err(e) => {
                error!("Data format invalid from Envisalink, ignoring: {}", e);
                return;
            }
        };

        if !self.state.has_partition(update.partition) {
            debug!("Skipping partition {}", update.partition);
            return;
        }

        if let Some(last) = self.last_partition_update
            && now.saturating_duration_since(last) < self.config.keypad_update_interval
        {
            debug!("Skipping keypad update within update interval");
            return;
        }

        if self.pending.is_some() {
            warn!("Keypad update while command in progress");
        }
        self.last_partition_update = Some(now);
        debug!(
            "Keypad update: partition {} zone/user {} flags [{}] beep {}",
            update.partition,
            update.user_or_zone,
            update.flags.names().join(", "),
            update.beep
        );

        let time = time_text();
        if let Some(zone) = update.fault_zone() {
            self.state.update_zone_status(zone, ZoneStatus::Open, &time);
        }
        let partition_update = PartitionUpdate::from_keypad(update.flags, update.beep, &update.alpha);
        self.state
            .set_partition_status(update.partition, &partition_update, &time);

        self.notifier.send_update(&self.state);
    }

    fn handle_zone_state_change(&mut self, data: &str) {
        let zones = match decode_zone_bitmap(data) {
            Ok(zones) => zones,
            Err(e) => {
                error!("Invalid zone state change {:?}: {}", data, e);
                return;
            }
        };

        // Open reports from the bitmap lag reality; keypad faults are
        // the source of truth for open zones.
        let time = time_text();
        for (zone, status) in zones {
            if status == ZoneStatus::Closed {
                self.state.update_zone_status(zone, status, &time);
            }
        }
    }

    fn handle_partition_state_change(&mut self, data: &str) {
        let entries = match decode_partition_status(data) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Invalid partition state change {:?}: {}", data, e);
                return;
            }
        };

        let time = time_text();
        for entry in entries {
            let status = match entry.status {
                Some(PartitionStatus::NotUsed) => continue,
                Some(status) => status,
                None => {
                    warn!(
                        "Unknown status code {:?} for partition {}, skipping",
                        entry.code, entry.partition
                    );
                    continue;
                }
            };
            if !self.state.has_partition(entry.partition) {
                continue;
            }
            debug!(
                "Partition {} status update: {} ({})",
                entry.partition,
                status.name(),
                status.description()
            );
            self.state
                .set_partition_status(entry.partition, &PartitionUpdate::from_status(status), &time);
        }
    }

    fn handle_realtime_cid_event(&self, data: &str) {
        let event = match decode_cid_event(data) {
            Ok(event) => event,
            Err(e) => {
                error!("Invalid CID event {:?}: {}", data, e);
                return;
            }
        };

        let qualifier = event.qualifier.map_or("Unknown qualifier", |q| q.description());
        match cid_event(event.code) {
            Some((CidSubject::User, label)) => {
                let user = self
                    .config
                    .user_name(event.zone_or_user)
                    .map_or_else(|| event.zone_or_user.to_string(), str::to_string);
                info!(
                    "CID {}: {} ({}) partition {} user {}",
                    event.code, label, qualifier, event.partition, user
                );
            }
            Some((CidSubject::Zone, label)) => {
                let zone = self
                    .config
                    .zone_name(event.zone_or_user)
                    .map_or_else(|| event.zone_or_user.to_string(), str::to_string);
                info!(
                    "CID {}: {} ({}) partition {} zone {}",
                    event.code, label, qualifier, event.partition, zone
                );
            }
            None => warn!(
                "Unknown CID event {} ({}) partition {} value {}",
                event.code, qualifier, event.partition, event.zone_or_user
            ),
        }
    }

    // A dump request produces both a command response and this event
    fn handle_zone_timer_dump(&mut self, data: &str) {
        match decode_zone_dump(data) {
            Ok(entries) => {
                let applied = self.state.apply_zone_dump(&entries, Local::now());
                debug!("Zone timer dump: {} entries, {} applied", entries.len(), applied);
            }
            Err(e) => error!("Invalid zone timer dump: {}", e),
        }
    }

    // ---- outbound ----

    /// Send a tracked command. Ignored unless logged in with nothing in flight.
    ///
    /// Returns true if the command was queued.
    pub fn send_command(&mut self, command: &Command, now: Instant) -> bool {
        if !self.is_logged_in() {
            error!("Not connected to Envisalink - ignoring command {}", command.code());
            return false;
        }
        if self.pending.is_some() {
            error!("Command already in progress - ignoring command {}", command.code());
            return false;
        }
        self.pending = Some(PendingCommand {
            code: command.code(),
            sent_at: now,
        });
        self.send_raw(command.to_frame());
        true
    }

    pub fn change_partition(&mut self, partition: u8, now: Instant) -> bool {
        if !(1..=MAX_KEYPAD_PARTITION).contains(&partition) {
            error!(
                "Invalid Partition Number {} specified when trying to change partition, ignoring.",
                partition
            );
            return false;
        }
        self.send_command(&Command::ChangePartition { partition }, now)
    }

    pub fn dump_zone_timers(&mut self, now: Instant) -> bool {
        self.send_command(&Command::DumpZoneTimers, now)
    }

    /// Send keys to the default partition as raw text.
    pub fn keypresses_to_default_partition(&mut self, keys: &str) {
        self.send_raw(keys.to_string());
    }

    /// Send keys to a partition, one `03` frame per key. Keypresses are not
    /// tracked as in-flight commands.
    pub fn keypresses_to_partition(&mut self, partition: u8, keys: &str) {
        for key in keys.chars() {
            self.send_raw(Command::Keypress { partition, key }.to_frame());
        }
    }

    // ---- liveness ----

    /// Periodic housekeeping, called about once a second while connected.
    pub fn check_alive(&mut self, now: Instant) {
        if !self.is_logged_in() {
            return;
        }

        if let Some(pending) = self.pending
            && now.saturating_duration_since(pending.sent_at) > self.config.command_timeout
        {
            error!("{}", COMMAND_TIMEOUT_MESSAGE);
            self.notifier.send_error(COMMAND_TIMEOUT_MESSAGE);
            self.logout();
            return;
        }

        let poll_interval = self.config.poll_interval;
        if !poll_interval.is_zero()
            && self.pending.is_none()
            && elapsed_beyond(self.last_poll, now, poll_interval)
        {
            self.last_poll = Some(now);
            self.send_command(&Command::Poll, now);
        }

        if self.pending.is_none()
            && elapsed_beyond(self.last_zone_dump, now, self.config.zone_dump_interval)
        {
            self.last_zone_dump = Some(now);
            self.dump_zone_timers(now);
        }

        if now.saturating_duration_since(self.last_keypad_update) > self.config.keypad_event_timeout {
            error!("{}", KEYPAD_TIMEOUT_MESSAGE);
            self.notifier.send_error(KEYPAD_TIMEOUT_MESSAGE);
            self.logout();
        }
    }
}

/// True if `last` is unset or more than `interval` before `now`.
fn elapsed_beyond(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.is_none_or(|last| now.saturating_duration_since(last) > interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PartitionFlags, ZoneState};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        updates: Mutex<Vec<AlarmState>>,
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn send_update(&self, state: &AlarmState) {
            self.updates.lock().push(state.clone());
        }

        fn send_error(&self, message: &str) {
            self.errors.lock().push(message.to_string());
        }
    }

    fn config() -> PanelConfig {
        PanelConfig::builder()
            .password("secret")
            .zone_name(1, "Front Door")
            .zone_name(2, "Back Door")
            .zone_name(7, "Kitchen Window")
            .partition_name(1, "House")
            .keypad_update_interval(Duration::ZERO)
            .build()
    }

    fn session_with(config: PanelConfig, now: Instant) -> (PanelSession, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AlarmState::from_config(&config);
        let session = PanelSession::new(Arc::new(config), state, notifier.clone(), now);
        (session, notifier)
    }

    fn logged_in(config: PanelConfig, now: Instant) -> (PanelSession, Arc<RecordingNotifier>) {
        let (mut session, notifier) = session_with(config, now);
        session.handle_line("Login:", now);
        session.handle_line("OK", now);
        session.take_outbound();
        (session, notifier)
    }

    #[test]
    fn test_login_handshake() {
        let now = Instant::now();
        let (mut session, _) = session_with(config(), now);
        assert_eq!(session.session_state(), SessionState::AwaitingLogin);

        session.handle_line("login", now);
        assert_eq!(session.take_outbound(), vec!["secret".to_string()]);

        session.handle_line("OK", now);
        assert_eq!(session.session_state(), SessionState::LoggedIn);
        assert!(!session.wants_close());
    }

    #[test]
    fn test_login_failure_closes() {
        let now = Instant::now();
        let (mut session, _) = session_with(config(), now);
        session.handle_line("Login:", now);
        session.handle_line("FAILED", now);
        assert_eq!(session.session_state(), SessionState::Disconnected);
        assert!(session.wants_close());

        let (mut session, _) = session_with(config(), now);
        session.handle_line("Timed Out!", now);
        assert!(session.wants_close());
    }

    #[test]
    fn test_ready_keypad_update_closes_zones() {
        let now = Instant::now();
        let (mut session, notifier) = logged_in(config(), now);

        session.handle_line("%00,01,0008,07,00,FAULT 07 KITCHEN WINDOW$", now);
        assert!(session.state().zone(7).is_some_and(ZoneState::is_open));

        session.handle_line("%00,01,1C08,00,00,****DISARMED****  Ready to Arm  $", now);
        assert!(session.state().zone.values().all(ZoneState::is_closed));
        assert!(session.state().partition(1).is_some_and(|p| p.is_ready()));

        let updates = notifier.updates.lock();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].zone.values().all(ZoneState::is_closed));
    }

    #[test]
    fn test_keypad_update_rate_limit() {
        let now = Instant::now();
        let config = PanelConfig::builder()
            .zone_name(1, "Front Door")
            .partition_name(1, "House")
            .keypad_update_interval(Duration::from_secs(60))
            .build();
        let (mut session, notifier) = logged_in(config, now);

        session.handle_line("%00,01,1C08,00,00,Ready$", now);
        session.handle_line("%00,01,0008,01,00,FAULT 01 FRONT DOOR$", now + Duration::from_secs(10));
        assert_eq!(notifier.updates.lock().len(), 1);
        assert!(session.state().zone(1).is_some_and(ZoneState::is_closed));

        session.handle_line("%00,01,0008,01,00,FAULT 01 FRONT DOOR$", now + Duration::from_secs(61));
        assert_eq!(notifier.updates.lock().len(), 2);
        assert!(session.state().zone(1).is_some_and(ZoneState::is_open));
    }

    #[test]
    fn test_malformed_keypad_update_still_feeds_watchdog() {
        let start = Instant::now();
        let (mut session, notifier) = logged_in(config(), start);

        let later = start + Duration::from_secs(40);
        session.handle_line("%00,01,1C08,00$", later);
        assert!(notifier.updates.lock().is_empty());

        session.check_alive(start + Duration::from_secs(80));
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_untracked_partition_keypad_update_ignored() {
        let now = Instant::now();
        let (mut session, notifier) = logged_in(config(), now);
        session.handle_line("%00,02,1C08,00,00,Ready$", now);
        assert!(notifier.updates.lock().is_empty());
        assert!(session.state().zone.values().all(|z| z.status == ZoneStatus::Uninitialized));
    }

    #[test]
    fn test_zone_bitmap_applies_closed_only() {
        let now = Instant::now();
        let (mut session, _) = logged_in(config(), now);
        // Zone 1 open, everything else closed
        session.handle_line("%01,0100000000000000$", now);
        assert_eq!(session.state().zone(1).map(|z| z.status), Some(ZoneStatus::Uninitialized));
        assert!(session.state().zone(2).is_some_and(ZoneState::is_closed));
        assert!(session.state().zone(7).is_some_and(ZoneState::is_closed));
    }

    #[test]
    fn test_partition_state_change() {
        let now = Instant::now();
        let (mut session, _) = logged_in(config(), now);
        session.handle_line("%02,0500000000000000$", now);
        let part = session.state().partition(1).unwrap();
        assert_eq!(part.status, "ARMED_AWAY");
        assert!(part.flags.contains(PartitionFlags::ARMED_AWAY));

        // Unknown code leaves the partition alone
        session.handle_line("%02,ZZ00000000000000$", now);
        assert_eq!(session.state().partition(1).unwrap().status, "ARMED_AWAY");
    }

    #[test]
    fn test_single_command_in_flight() {
        let now = Instant::now();
        let (mut session, _) = logged_in(config(), now);

        assert!(session.send_command(&Command::Poll, now));
        assert!(!session.dump_zone_timers(now));
        assert_eq!(session.take_outbound(), vec!["^00,$".to_string()]);

        session.handle_line("^00,00$", now);
        assert!(!session.command_in_progress());
        assert_eq!(session.last_poll_response(), Some(now));
        assert!(session.dump_zone_timers(now));
        assert_eq!(session.take_outbound(), vec!["^02,$".to_string()]);

        // Error responses still clear the in-flight command
        session.handle_line("^02,02$", now);
        assert!(!session.command_in_progress());
    }

    #[test]
    fn test_commands_require_login() {
        let now = Instant::now();
        let (mut session, _) = session_with(config(), now);
        assert!(!session.send_command(&Command::Poll, now));
        assert!(session.take_outbound().is_empty());
    }

    #[test]
    fn test_change_partition_range() {
        let now = Instant::now();
        let (mut session, _) = logged_in(config(), now);
        assert!(!session.change_partition(0, now));
        assert!(!session.change_partition(9, now));
        assert!(session.change_partition(2, now));
        assert_eq!(session.take_outbound(), vec!["^01,2$".to_string()]);
    }

    #[test]
    fn test_keypresses() {
        let now = Instant::now();
        let (mut session, _) = logged_in(config(), now);
        session.keypresses_to_partition(1, "12*");
        session.keypresses_to_default_partition("1234");
        assert_eq!(
            session.take_outbound(),
            vec!["^03,1,1$", "^03,1,2$", "^03,1,*$", "1234"]
        );
        assert!(!session.command_in_progress());
    }

    #[test]
    fn test_check_alive_schedules_zone_dump_then_poll() {
        let start = Instant::now();
        let config = PanelConfig::builder()
            .poll_interval(Duration::from_secs(5))
            .zone_dump_interval(Duration::from_secs(60))
            .keypad_event_timeout(Duration::from_secs(3600))
            .build();
        let (mut session, _) = logged_in(config, start);

        // First tick: poll goes out, dump waits for the slot
        session.check_alive(start);
        assert_eq!(session.take_outbound(), vec!["^00,$".to_string()]);

        session.handle_line("^00,00$", start);
        session.check_alive(start + Duration::from_secs(1));
        assert_eq!(session.take_outbound(), vec!["^02,$".to_string()]);

        session.handle_line("^02,00$", start);
        session.check_alive(start + Duration::from_secs(3));
        assert!(session.take_outbound().is_empty());

        session.check_alive(start + Duration::from_secs(6));
        assert_eq!(session.take_outbound(), vec!["^00,$".to_string()]);
    }

    #[test]
    fn test_command_timeout_forces_logout() {
        let start = Instant::now();
        let (mut session, notifier) = logged_in(config(), start);
        session.send_command(&Command::Poll, start);

        session.check_alive(start + Duration::from_secs(30));
        assert!(session.is_logged_in());

        session.check_alive(start + Duration::from_secs(31));
        assert!(session.wants_close());
        assert_eq!(session.session_state(), SessionState::Disconnected);
        assert_eq!(notifier.errors.lock().as_slice(), [COMMAND_TIMEOUT_MESSAGE]);
    }

    #[test]
    fn test_keypad_watchdog_forces_logout() {
        let start = Instant::now();
        let (mut session, notifier) = logged_in(config(), start);
        session.handle_line("^02,00$", start);
        session.handle_line("%00,01,1C08,00,00,Ready$", start + Duration::from_secs(30));

        session.check_alive(start + Duration::from_secs(70));
        assert!(session.is_logged_in());
        session.handle_line("^02,00$", start);

        session.check_alive(start + Duration::from_secs(76));
        assert!(session.wants_close());
        assert_eq!(notifier.errors.lock().as_slice(), [KEYPAD_TIMEOUT_MESSAGE]);
    }

    #[test]
    fn test_check_alive_idle_before_login() {
        let start = Instant::now();
        let (mut session, notifier) = session_with(config(), start);
        session.check_alive(start + Duration::from_secs(3600));
        assert!(!session.wants_close());
        assert!(notifier.errors.lock().is_empty());
    }

    #[test]
    fn test_unknown_code_is_ignored() {
        let now = Instant::now();
        let (mut session, _) = logged_in(config(), now);
        let before = session.state().clone();
        session.handle_line("%AB,whatever$", now);
        session.handle_line("%03,113001001$", now);
        assert_eq!(session.state(), &before);
        assert!(session.is_logged_in());
    }
}
