/**
 * BROKER CONFIG - YAML configuration of the broker
 *
 * ROLE : broadcast listener settings, control timeouts, journal location
 * and the static routing table (station id -> host:port).
 *
 * Located by METEO_BROKER_CONFIG (default `broker.yaml`). A missing, empty
 * or invalid file falls back to the defaults, never aborts startup.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::warn;

pub const ENV_CONFIG_PATH: &str = "METEO_BROKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "broker.yaml";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrokerConfig {
    pub broadcast_port: u16,
    pub receive_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub receive_buffer_bytes: usize,
    pub journal_dir: Option<PathBuf>,
    pub stations: HashMap<String, StationRoute>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StationRoute {
    pub host: String,
    pub port: u16,
}

impl StationRoute {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let stations = [("S1", 5001), ("S2", 5002), ("S3", 5003)]
            .into_iter()
            .map(|(id, port)| (id.to_string(), StationRoute::new("localhost", port)))
            .collect();
        Self {
            broadcast_port: meteo_protocol::BROADCAST_PORT,
            receive_timeout_ms: 5000,
            command_timeout_ms: 5000,
            receive_buffer_bytes: meteo_protocol::MAX_DATAGRAM_SIZE,
            journal_dir: None,
            stations,
        }
    }
}

impl BrokerConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

pub async fn load_config() -> BrokerConfig {
    let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_config_from(Path::new(&path)).await
}

pub async fn load_config_from(path: &Path) -> BrokerConfig {
    if !path.exists() {
        warn!("no {}, using default config", path.display());
        return BrokerConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!("cannot read {}: {e}, using default config", path.display());
            return BrokerConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return BrokerConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!("invalid config {}: {e}", path.display());
        BrokerConfig::default()
    })
}
