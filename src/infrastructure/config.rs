//! Configuration management
//!
//! Loaded from config.toml at startup (path overridable via CONFIG_PATH).
//! Every cadence and bound the components use lives here so nothing is
//! hardcoded at call sites; a missing file means defaults.

use crate::core::Exchange;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub premium: PremiumSettings,
}

/// Which delivery path feeds the multiplexer. Chosen here explicitly, not
/// by runtime environment sniffing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote WebSocket stream
    #[default]
    Socket,
    /// Process-local push from an execution host
    Bridge,
}

/// Stream transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSettings {
    /// WebSocket endpoint of the data stream
    #[serde(default = "default_stream_url")]
    pub url: String,

    /// REST base URL for the one-shot bootstrap pulls; no pulls when unset
    #[serde(default)]
    pub rest_url: Option<String>,

    #[serde(default)]
    pub source: SourceKind,

    /// Fixed reconnect delay after an abnormal close
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Store cadences and ranked-view bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSettings {
    /// Snapshot publish cadence (10 updates/second)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Cadence at which displayed opportunity ages are refreshed
    #[serde(default = "default_age_refresh_ms")]
    pub age_refresh_ms: u64,

    /// Stale-opportunity sweep cadence
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Opportunity retention before eviction
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// Ranked view size bound
    #[serde(default = "default_max_ranked")]
    pub max_ranked: usize,

    /// Minimum raw premium surfaced by the ranked view, in bps
    #[serde(default = "default_min_premium_bps")]
    pub min_premium_bps: i64,
}

/// Premium engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PremiumSettings {
    /// Venue whose USDT/KRW rate anchors the kimchi-mode ratio
    #[serde(default = "default_reference_venue")]
    pub reference_venue: Exchange,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
            rest_url: None,
            source: SourceKind::default(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            age_refresh_ms: default_age_refresh_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            retention_ms: default_retention_ms(),
            max_ranked: default_max_ranked(),
            min_premium_bps: default_min_premium_bps(),
        }
    }
}

impl Default for PremiumSettings {
    fn default() -> Self {
        Self {
            reference_venue: default_reference_venue(),
        }
    }
}

fn default_stream_url() -> String {
    "ws://127.0.0.1:8899/stream".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_age_refresh_ms() -> u64 {
    1_000
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

fn default_retention_ms() -> u64 {
    60_000
}

fn default_max_ranked() -> usize {
    50
}

fn default_min_premium_bps() -> i64 {
    30
}

fn default_reference_venue() -> Exchange {
    Exchange::Upbit
}

impl StreamSettings {
    #[inline]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl StoreSettings {
    #[inline]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[inline]
    pub fn age_refresh(&self) -> Duration {
        Duration::from_millis(self.age_refresh_ms)
    }

    #[inline]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    #[inline]
    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}

impl Config {
    /// Load configuration from config.toml (or $CONFIG_PATH). A missing
    /// file yields defaults; a present but invalid file is an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|e| SyncError::Config(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(SyncError::Io(e)),
        }
    }
}
