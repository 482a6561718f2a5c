// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::PanelConfig;
use crate::constants::LINE_END;
use crate::error::{BridgeError, Result};
use crate::session::PanelSession;

/// Cadence of [`PanelSession::check_alive`].
pub const CHECK_ALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Longest line accepted from the panel; anything longer is discarded.
pub const MAX_LINE_LEN: usize = 4096;

/// Line-oriented TCP connection to the Envisalink TPI port.
pub struct DirectTcpTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Bytes of the line being assembled. Kept across calls so a cancelled
    /// read loses nothing.
    partial: Vec<u8>,
    /// Set while skipping the rest of an over-long line
    discarding: bool,
}

impl DirectTcpTransport {
    /// Open the TCP connection, bounded by the configured connect timeout.
    pub async fn connect(config: &PanelConfig) -> Result<Self> {
        let address = config.address();
        debug!("Connecting to {}", address);

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| BridgeError::ConnectionTimeout)?
            .map_err(|e| {
                error!("TCP connect to {} failed: {}", address, e);
                BridgeError::Io(e)
            })?;
        stream.set_nodelay(true)?;

        info!("Connected to {}", address);
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            partial: Vec::new(),
            discarding: false,
        })
    }

    /// Drive `session` until the socket closes, the session logs out, or
    /// shutdown is signalled.
    ///
    /// The liveness ticker lives only as long as this call, so it can never
    /// fire against a later session.
    pub async fn run(
        &mut self,
        session: &mut PanelSession,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(CHECK_ALIVE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                line = self.next_line() => match line? {
                    Some(line) => session.handle_line(&line, Instant::now()),
                    None => {
                        debug!("Connection closed by Envisalink");
                        return Err(BridgeError::Disconnected);
                    }
                },
                _ = ticker.tick() => session.check_alive(Instant::now()),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Shutdown requested, closing panel connection");
                        session.logout();
                    }
                }
            }

            self.flush(session).await?;
            if session.wants_close() {
                if let Err(e) = self.writer.shutdown().await {
                    debug!("Socket shutdown: {}", e);
                }
                return Ok(());
            }
        }
    }

    /// Next complete line with its terminator stripped, or `None` at EOF.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than treated as a
    /// read error, and lines over [`MAX_LINE_LEN`] are dropped.
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            let (used, complete) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    return Ok(None);
                }
                match available.iter().position(|b| *b == b'\n') {
                    Some(end) => {
                        if !self.discarding {
                            self.partial.extend_from_slice(&available[..end]);
                        }
                        (end + 1, true)
                    }
                    None => {
                        if !self.discarding {
                            self.partial.extend_from_slice(available);
                        }
                        (available.len(), false)
                    }
                }
            };
            self.reader.consume(used);

            if self.partial.len() > MAX_LINE_LEN {
                warn!("Dropping line longer than {} bytes", MAX_LINE_LEN);
                self.partial.clear();
                self.discarding = true;
            }
            if !complete {
                continue;
            }
            if self.discarding {
                self.discarding = false;
                continue;
            }

            let raw = std::mem::take(&mut self.partial);
            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Line from Envisalink is not valid UTF-8, replacing invalid bytes");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            return Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()));
        }
    }

    /// Write everything the session has queued.
    async fn flush(&mut self, session: &mut PanelSession) -> Result<()> {
        for line in session.take_outbound() {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(LINE_END.as_bytes()).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }
}
