// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

pub mod direct;
pub mod supervisor;

use std::time::Duration;

use crate::config::BackoffConfig;

pub use direct::DirectTcpTransport;
pub use supervisor::Supervisor;

/// Exponential reconnect delay, reset whenever a connection succeeds.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current: config.initial_delay,
            config,
        }
    }

    /// Delay before the next attempt. Each call grows the following delay by
    /// the configured factor, up to the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.config.max_delay);
        let grown = self.current.as_secs_f64() * self.config.factor;
        self.current = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial_delay;
    }
}
