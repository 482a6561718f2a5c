// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::PanelConfig;
use crate::error::BridgeError;
use crate::notify::Notifier;
use crate::session::PanelSession;
use crate::state::AlarmState;

use super::Backoff;
use super::direct::DirectTcpTransport;

/// Keeps a panel session connected, reconnecting with backoff.
///
/// Alarm state outlives individual connections: each new session starts
/// from whatever the previous one left behind.
pub struct Supervisor {
    config: Arc<PanelConfig>,
    notifier: Arc<dyn Notifier>,
    state: AlarmState,
    backoff: Backoff,
}

impl Supervisor {
    pub fn new(config: PanelConfig, notifier: Arc<dyn Notifier>) -> Self {
        let state = AlarmState::from_config(&config);
        let backoff = Backoff::new(config.backoff);
        Self {
            config: Arc::new(config),
            notifier,
            state,
            backoff,
        }
    }

    /// State as of the last completed session.
    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    /// Connect and reconnect until `shutdown` turns true.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            if attempt > 0 {
                let delay = self.backoff.next_delay();
                info!(
                    "Reconnecting to Envisalink in {:.1}s (attempt {})",
                    delay.as_secs_f64(),
                    attempt + 1
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => continue,
                }
            }
            attempt += 1;

            let connected = tokio::select! {
                connected = DirectTcpTransport::connect(&self.config) => connected,
                _ = shutdown.changed() => continue,
            };
            let mut transport = match connected {
                Ok(transport) => transport,
                Err(e) => {
                    log_failure("Connection failed to Envisalink", &e);
                    continue;
                }
            };
            self.backoff.reset();
            attempt = 1;

            let mut session = PanelSession::new(
                self.config.clone(),
                std::mem::take(&mut self.state),
                self.notifier.clone(),
                Instant::now(),
            );
            let result = transport.run(&mut session, &mut shutdown).await;
            self.state = session.into_state();

            if *shutdown.borrow() {
                debug!("Panel connection closed for shutdown");
                break;
            }
            match result {
                Ok(()) => info!("Disconnected from {}", self.config.address()),
                Err(e) => log_failure("Lost connection to Envisalink", &e),
            }
        }
        info!("Panel supervisor stopped");
    }
}

/// Retryable failures log at warn, anything else at error.
fn log_failure(context: &str, e: &BridgeError) {
    if e.is_retryable() {
        warn!("{}: {}", context, e);
    } else {
        error!("{} with unexpected error: {}", context, e);
    }
}
