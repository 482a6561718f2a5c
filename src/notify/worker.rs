// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info};

use crate::error::{BridgeError, Result};

use super::dedup::DedupCache;
use super::queue::{DispatchQueue, QueueItem};

/// How long the worker waits on the queue before re-checking the exit flag.
const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// What happened to a delivered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Identical payload already sent within the repeat window
    Suppressed,
}

/// Single consumer that POSTs queued notifications.
///
/// Delivery is at-most-once: failures are logged and the item is dropped.
pub struct DeliveryWorker {
    client: reqwest::Client,
    url_base: String,
    access_token: String,
    queue: Arc<DispatchQueue>,
    dedup: DedupCache,
    exit: Arc<AtomicBool>,
}

impl DeliveryWorker {
    pub fn new(
        client: reqwest::Client,
        url_base: String,
        access_token: String,
        repeat_window: Duration,
        queue: Arc<DispatchQueue>,
        exit: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            url_base,
            access_token,
            queue,
            dedup: DedupCache::new(repeat_window),
            exit,
        }
    }

    /// Deliver items until the exit flag is raised.
    pub async fn run(mut self) {
        debug!("Notification worker started");
        while !self.exit.load(Ordering::Acquire) {
            let Some(item) = self.queue.pop_timeout(POP_TIMEOUT).await else {
                continue;
            };
            if item.is_wake() {
                continue;
            }
            if let Err(e) = self.deliver(&item).await {
                error!("Error sending {} notification: {}", item.path, e);
            }
        }
        info!("Notification worker stopped");
    }

    /// POST one item to `{url_base}/{path}?access_token=...`.
    pub async fn deliver(&mut self, item: &QueueItem) -> Result<Delivery> {
        let now = Instant::now();
        if self.dedup.is_recent(&item.payload, now) {
            debug!("Suppressing repeat {} notification", item.path);
            return Ok(Delivery::Suppressed);
        }

        let url = format!("{}/{}", self.url_base, item.path);
        debug!("POST {} {}", url, item.payload);
        let response = self
            .client
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .body(item.payload.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        if !matches!(status, 200..=202) {
            return Err(BridgeError::DeliveryRejected { status });
        }

        debug!("Notification {} accepted ({})", item.path, status);
        self.dedup.record(&item.payload, now);
        Ok(Delivery::Sent)
    }
}
