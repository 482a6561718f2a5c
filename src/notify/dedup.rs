// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Remembers recently delivered payloads so identical ones are not resent
/// within `window`.
#[derive(Debug, Clone)]
pub struct DedupCache {
    window: Duration,
    sent: HashMap<String, Instant>,
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            sent: HashMap::new(),
        }
    }

    /// True if this exact payload was delivered within the window.
    pub fn is_recent(&self, payload: &str, now: Instant) -> bool {
        self.sent
            .get(payload)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.window)
    }

    /// Record a successful delivery. A payload not seen before also prunes
    /// entries that have aged out of the window.
    pub fn record(&mut self, payload: &str, now: Instant) {
        if let Some(at) = self.sent.get_mut(payload) {
            *at = now;
            return;
        }
        let window = self.window;
        self.sent
            .retain(|_, at| now.saturating_duration_since(*at) < window);
        self.sent.insert(payload.to_string(), now);
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppresses_within_window() {
        let start = Instant::now();
        let mut cache = DedupCache::new(Duration::from_secs(55));
        assert!(!cache.is_recent("a", start));

        cache.record("a", start);
        assert!(cache.is_recent("a", start + Duration::from_secs(54)));
        assert!(!cache.is_recent("a", start + Duration::from_secs(55)));
        assert!(!cache.is_recent("b", start));
    }

    #[test]
    fn test_new_payload_prunes_stale_entries() {
        let start = Instant::now();
        let mut cache = DedupCache::new(Duration::from_secs(10));
        cache.record("a", start);
        cache.record("b", start + Duration::from_secs(5));
        assert_eq!(cache.len(), 2);

        cache.record("c", start + Duration::from_secs(12));
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_recent("a", start + Duration::from_secs(12)));
        assert!(cache.is_recent("b", start + Duration::from_secs(12)));
    }

    #[test]
    fn test_repeat_refreshes_timestamp() {
        let start = Instant::now();
        let mut cache = DedupCache::new(Duration::from_secs(10));
        cache.record("a", start);
        cache.record("a", start + Duration::from_secs(8));
        assert!(cache.is_recent("a", start + Duration::from_secs(15)));
    }
}
