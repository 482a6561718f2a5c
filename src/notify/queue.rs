// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

/// A serialized notification waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Path appended to the endpoint URL; empty for the wake-up sentinel
    pub path: String,
    pub payload: String,
}

impl QueueItem {
    pub fn new(path: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload: payload.into(),
        }
    }

    /// Item that only wakes the worker.
    pub fn wake() -> Self {
        Self::new("", "")
    }

    pub fn is_wake(&self) -> bool {
        self.path.is_empty()
    }
}

/// Result of a [`DispatchQueue::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue was full; the oldest item was evicted to make room
    DroppedOldest(QueueItem),
    /// Queue has no room at all; the new item was dropped
    Rejected(QueueItem),
}

/// Bounded FIFO shared between producers and the delivery worker.
///
/// Pushing never blocks: when full, the oldest entry is evicted.
#[derive(Debug)]
pub struct DispatchQueue {
    items: Mutex<VecDeque<QueueItem>>,
    capacity: usize,
    ready: Notify,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ready: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn push(&self, item: QueueItem) -> PushOutcome {
        let outcome = {
            let mut items = self.items.lock();
            if self.capacity == 0 {
                return PushOutcome::Rejected(item);
            }
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            match evicted {
                Some(old) => PushOutcome::DroppedOldest(old),
                None => PushOutcome::Queued,
            }
        };

        if let PushOutcome::DroppedOldest(old) = &outcome {
            warn!("Notification queue full, dropped oldest {} notification", old.path);
        }
        self.ready.notify_one();
        outcome
    }

    /// Take the next item, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<QueueItem> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.items.lock().pop_front() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, self.ready.notified())
                .await
                .is_err()
            {
                return self.items.lock().pop_front();
            }
        }
    }
}
