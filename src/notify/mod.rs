// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

//! Outbound notifications to the webhook endpoint.
//!
//! Producers serialize a payload and push it onto a bounded queue; a single
//! background worker delivers it. A slow endpoint therefore never stalls the
//! panel connection.

pub mod dedup;
pub mod queue;
pub mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::NotifyConfig;
use crate::error::Result;
use crate::state::AlarmState;

pub use dedup::DedupCache;
pub use queue::{DispatchQueue, PushOutcome, QueueItem};
pub use worker::{Delivery, DeliveryWorker};

/// Path for full alarm state snapshots.
pub const UPDATE_PATH: &str = "update";
/// Path for connection error reports.
pub const PANEL_PATH: &str = "panel";

/// Receiver of state snapshots and error reports from the panel session.
pub trait Notifier: Send + Sync {
    fn send_update(&self, state: &AlarmState);
    fn send_error(&self, message: &str);
}

#[derive(Debug, Serialize)]
struct ErrorNotice<'a> {
    status: &'a str,
    message: String,
}

/// Handle used to enqueue notifications and stop the worker.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    queue: Arc<DispatchQueue>,
    exit: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Build a dispatcher and its (not yet running) worker.
    pub fn new(config: &NotifyConfig) -> Result<(Self, DeliveryWorker)> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()?;
        let queue = Arc::new(DispatchQueue::new(config.queue_size));
        let exit = Arc::new(AtomicBool::new(false));

        let worker = DeliveryWorker::new(
            client,
            config.url_base(),
            config.access_token.clone(),
            config.repeat_update_interval,
            queue.clone(),
            exit.clone(),
        );
        Ok((Self { queue, exit }, worker))
    }

    /// Build a dispatcher and spawn its worker on the runtime.
    pub fn spawn(config: &NotifyConfig) -> Result<(Self, JoinHandle<()>)> {
        let (dispatcher, worker) = Self::new(config)?;
        let handle = tokio::spawn(worker.run());
        info!(
            "Notification dispatcher started (queue size {})",
            config.queue_size
        );
        Ok((dispatcher, handle))
    }

    /// Serialize `payload` now and queue it for `path`.
    pub fn enqueue<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<()> {
        let body = serde_json::to_string(payload)?;
        match self.queue.push(QueueItem::new(path, body)) {
            PushOutcome::Queued | PushOutcome::DroppedOldest(_) => {
                debug!("Queued {} notification", path);
            }
            PushOutcome::Rejected(_) => {
                warn!("Notification queue has no capacity, dropped {} notification", path);
            }
        }
        Ok(())
    }

    /// Ask the worker to stop. Does not wait for the queue to drain.
    pub fn shutdown(&self) {
        debug!("Stopping notification worker");
        self.exit.store(true, Ordering::Release);
        self.queue.push(QueueItem::wake());
    }

    pub fn queue(&self) -> &Arc<DispatchQueue> {
        &self.queue
    }
}

impl Notifier for Dispatcher {
    fn send_update(&self, state: &AlarmState) {
        if let Err(e) = self.enqueue(UPDATE_PATH, state) {
            error!("Failed to queue state update: {}", e);
        }
    }

    fn send_error(&self, message: &str) {
        let notice = ErrorNotice {
            status: "ERROR",
            message: format!("Envisalink became unresponsive: {}", message),
        };
        if let Err(e) = self.enqueue(PANEL_PATH, &notice) {
            error!("Failed to queue error notice: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn dispatcher(queue_size: usize) -> Dispatcher {
        let config = NotifyConfig {
            queue_size,
            ..NotifyConfig::default()
        };
        let (dispatcher, _worker) = Dispatcher::new(&config).unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_error_notice_payload() {
        let dispatcher = dispatcher(10);
        dispatcher.send_error("No recent keypad updates");

        let item = dispatcher
            .queue()
            .pop_timeout(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(item.path, "panel");
        let body: serde_json::Value = serde_json::from_str(&item.payload).unwrap();
        assert_eq!(body["status"], "ERROR");
        assert_eq!(
            body["message"],
            "Envisalink became unresponsive: No recent keypad updates"
        );
    }

    #[tokio::test]
    async fn test_update_payload_is_snapshot() {
        let dispatcher = dispatcher(10);
        let mut state = AlarmState::default();
        dispatcher.send_update(&state);
        state.zone.insert(1, crate::state::ZoneState::new(1, "Front Door"));

        let item = dispatcher
            .queue()
            .pop_timeout(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(item.path, "update");
        assert_eq!(item.payload, r#"{"zone":{},"partition":{}}"#);
    }

    #[test]
    fn test_queue_never_exceeds_capacity() {
        let dispatcher = dispatcher(3);
        for i in 0..10 {
            dispatcher.enqueue("update", &i).unwrap();
        }
        assert_eq!(dispatcher.queue().len(), 3);
    }

    #[test]
    fn test_zero_queue_size_is_rejected() {
        let config = NotifyConfig {
            queue_size: 0,
            ..NotifyConfig::default()
        };
        assert!(matches!(
            Dispatcher::new(&config),
            Err(crate::error::BridgeError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let (dispatcher, handle) = Dispatcher::spawn(&NotifyConfig::default()).unwrap();
        dispatcher.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
