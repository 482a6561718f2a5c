// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge
//
//! # envisalink-bridge
//!
//! Keeps a session open to an Envisalink TPI (the TCP interface of the
//! Envisalink alarm panel module), tracks zone and partition state from its
//! event stream, and forwards state changes to a webhook.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use envisalink_bridge::{Dispatcher, NotifyConfig, PanelConfig, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PanelConfig::builder()
//!         .host("192.168.0.50")
//!         .password("user")
//!         .zone_name(1, "Front Door")
//!         .partition_name(1, "House")
//!         .build();
//!
//!     let (dispatcher, _worker) = Dispatcher::spawn(&NotifyConfig::default())?;
//!     let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let mut supervisor = Supervisor::new(config, Arc::new(dispatcher.clone()));
//!     let handle = tokio::spawn(async move { supervisor.run(shutdown_rx).await });
//!
//!     tokio::signal::ctrl_c().await?;
//!     shutdown_tx.send(true)?;
//!     handle.await?;
//!     dispatcher.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use config::{BackoffConfig, NotifyConfig, PanelConfig, PanelConfigBuilder};
pub use error::{BridgeError, DecodeError, Result, TpiResponseCode};
pub use notify::{Dispatcher, Notifier};
pub use protocol::{Command, Message, ResponseCode};
pub use session::{PanelSession, SessionState};
pub use state::{AlarmState, PartitionFlags, PartitionState, ZoneState, ZoneStatus};
pub use transport::{Backoff, Supervisor};
