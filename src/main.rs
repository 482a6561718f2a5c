// MIT License - Copyright (c) 2026 The envisalink-bridge developers
// Envisalink bridge

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use envisalink_bridge::{BackoffConfig, Dispatcher, NotifyConfig, PanelConfig, Supervisor};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "envisalink-bridge")]
#[command(about = "Bridge between an Envisalink alarm panel interface and a webhook")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "alarmserver.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    envisalink: EnvisalinkToml,
    #[serde(default)]
    alarmserver: AlarmServerToml,
    #[serde(default)]
    smartthings: SmartThingsToml,
}

/// Zone, partition and user tables are keyed by string ids in TOML.
fn deserialize_id_names<'de, D>(deserializer: D) -> Result<BTreeMap<u32, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let string_map: HashMap<String, String> = HashMap::deserialize(deserializer)?;
    string_map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<u32>()
                .map(|id| (id, v))
                .map_err(|_| serde::de::Error::custom(format!("invalid id: {k}")))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct EnvisalinkToml {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_pass")]
    pass: String,
    /// Seconds; 0 disables polling
    #[serde(default)]
    pollinterval: u64,
    #[serde(default = "default_zone_dump_interval")]
    zonedumpinterval: u64,
    #[serde(default = "default_keypad_update_interval")]
    keypadupdateinterval: u64,
    #[serde(default = "default_command_timeout")]
    commandtimeout: u64,
    #[serde(default = "default_keypad_event_timeout")]
    kpeventtimeout: u64,
    #[serde(default = "default_reconnect_initial_delay")]
    reconnect_initial_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay")]
    reconnect_max_delay_secs: u64,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_secs: u64,
}

impl Default for EnvisalinkToml {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pass: default_pass(),
            pollinterval: 0,
            zonedumpinterval: default_zone_dump_interval(),
            keypadupdateinterval: default_keypad_update_interval(),
            commandtimeout: default_command_timeout(),
            kpeventtimeout: default_keypad_event_timeout(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay(),
            reconnect_max_delay_secs: default_reconnect_max_delay(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_host() -> String {
    "envisalink".to_string()
}
fn default_port() -> u16 {
    4025
}
fn default_pass() -> String {
    "user".to_string()
}
fn default_zone_dump_interval() -> u64 {
    60
}
fn default_keypad_update_interval() -> u64 {
    60
}
fn default_command_timeout() -> u64 {
    30
}
fn default_keypad_event_timeout() -> u64 {
    45
}
fn default_reconnect_initial_delay() -> u64 {
    1000
}
fn default_reconnect_max_delay() -> u64 {
    3600
}
fn default_connect_timeout() -> u64 {
    30
}

#[derive(Debug, Default, Deserialize)]
struct AlarmServerToml {
    /// Used when RUST_LOG is unset
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id_names")]
    zones: BTreeMap<u32, String>,
    #[serde(default, deserialize_with = "deserialize_id_names")]
    partitions: BTreeMap<u32, String>,
    #[serde(default, deserialize_with = "deserialize_id_names")]
    users: BTreeMap<u32, String>,
}

#[derive(Debug, Deserialize)]
struct SmartThingsToml {
    #[serde(default = "not_provided")]
    callbackurl_base: String,
    #[serde(default = "not_provided")]
    callbackurl_app_id: String,
    #[serde(default = "not_provided")]
    callbackurl_access_token: String,
    #[serde(default = "default_api_timeout")]
    api_timeout: u64,
    #[serde(default = "default_queue_size")]
    queue_size: usize,
    #[serde(default = "default_repeat_update_interval")]
    repeat_update_interval: u64,
}

impl Default for SmartThingsToml {
    fn default() -> Self {
        Self {
            callbackurl_base: not_provided(),
            callbackurl_app_id: not_provided(),
            callbackurl_access_token: not_provided(),
            api_timeout: default_api_timeout(),
            queue_size: default_queue_size(),
            repeat_update_interval: default_repeat_update_interval(),
        }
    }
}

fn not_provided() -> String {
    "not_provided".to_string()
}
fn default_api_timeout() -> u64 {
    10
}
fn default_queue_size() -> usize {
    100
}
fn default_repeat_update_interval() -> u64 {
    55
}

fn build_panel_config(config: &Config) -> Result<PanelConfig> {
    let evl = &config.envisalink;
    let panel_config = PanelConfig::builder()
        .host(&evl.host)
        .port(evl.port)
        .password(&evl.pass)
        .poll_interval(Duration::from_secs(evl.pollinterval))
        .zone_dump_interval(Duration::from_secs(evl.zonedumpinterval))
        .keypad_update_interval(Duration::from_secs(evl.keypadupdateinterval))
        .command_timeout(Duration::from_secs(evl.commandtimeout))
        .keypad_event_timeout(Duration::from_secs(evl.kpeventtimeout))
        .zone_names(config.alarmserver.zones.clone())
        .partition_names(config.alarmserver.partitions.clone())
        .user_names(config.alarmserver.users.clone())
        .backoff(BackoffConfig {
            initial_delay: Duration::from_millis(evl.reconnect_initial_delay_ms),
            max_delay: Duration::from_secs(evl.reconnect_max_delay_secs),
            ..BackoffConfig::default()
        })
        .connect_timeout(Duration::from_secs(evl.connect_timeout_secs))
        .build();
    panel_config.validate().context("Invalid [envisalink]/[alarmserver] config")?;
    Ok(panel_config)
}

fn build_notify_config(toml: &SmartThingsToml) -> Result<NotifyConfig> {
    let notify_config = NotifyConfig {
        base_url: toml.callbackurl_base.clone(),
        app_id: toml.callbackurl_app_id.clone(),
        access_token: toml.callbackurl_access_token.clone(),
        api_timeout: Duration::from_secs(toml.api_timeout),
        queue_size: toml.queue_size,
        repeat_update_interval: Duration::from_secs(toml.repeat_update_interval),
    };
    notify_config.validate().context("Invalid [smartthings] config")?;
    Ok(notify_config)
}

fn load_config(path: &str) -> Result<Config> {
    let config_text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&config_text).context("Failed to parse config file")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=envisalink_bridge=trace).
    // Falls back to alarmserver.log_level, then info.
    let default_level = config.alarmserver.log_level.as_deref().unwrap_or("info");
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let panel_config = build_panel_config(&config)?;
    let notify_config = build_notify_config(&config.smartthings)?;
    info!(
        "Tracking {} zones and {} partitions on {}",
        panel_config.zone_names.len(),
        panel_config.partition_names.len(),
        panel_config.address()
    );

    let (dispatcher, worker_handle) =
        Dispatcher::spawn(&notify_config).context("Failed to start notification dispatcher")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut supervisor = Supervisor::new(panel_config, Arc::new(dispatcher.clone()));
    let supervisor_handle = tokio::spawn(async move {
        supervisor.run(shutdown_rx).await;
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    info!("Envisalink bridge running. Send SIGINT/SIGTERM to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
    }

    // Suppress reconnects, drop the panel link, then stop the worker
    let _ = shutdown_tx.send(true);
    if let Err(e) = supervisor_handle.await {
        warn!("Panel supervisor task failed: {e}");
    }
    dispatcher.shutdown();
    if tokio::time::timeout(Duration::from_secs(2), worker_handle).await.is_err() {
        warn!("Notification worker still busy at exit");
    }

    info!("Shutdown complete");
    Ok(())
}
