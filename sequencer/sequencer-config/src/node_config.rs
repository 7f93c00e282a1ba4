// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use aptos_in_memory_cache::Eviction;
use sequencer_types::NodeId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn default_election_timeout_ms() -> [u64; 2] {
    [150, 300]
}

fn default_heartbeat_ms() -> u64 {
    50
}

fn default_snapshot_threshold_entries() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    50_000
}

fn default_queue_backpressure_threshold() -> usize {
    40_000
}

fn default_batch_max_size() -> usize {
    500
}

fn default_batch_timeout_ms() -> u64 {
    100
}

fn default_rotation_interval_days() -> u64 {
    90
}

fn default_overlap_hours() -> u64 {
    24
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    Lru,
    Fifo,
}

impl EvictionPolicy {
    pub fn to_eviction(self) -> Eviction {
        match self {
            EvictionPolicy::Lru => Eviction::Lru,
            EvictionPolicy::Fifo => Eviction::Fifo,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HsmEndpointConfig {
    pub provider: String,
    pub endpoint: String,
    #[serde(default)]
    pub key_label: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max: u32,
    pub initial_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max: 5,
            initial_ms: 50,
            factor: 2.0,
            max_ms: 5_000,
            jitter: 0.2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheLevelConfig {
    pub capacity: usize,
    pub ttl_ms: Option<u64>,
    pub eviction: EvictionPolicy,
}

/// Everything a node reads at startup (§6's "Configuration" list). Deployed
/// as a single TOML file per node; every field with a sensible cluster-wide
/// default is `#[serde(default = ...)]` so an operator's file only needs to
/// spell out what is unique to that node — `node_id`, `peers`, directories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: Uuid,
    pub peers: Vec<Uuid>,

    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: [u64; 2],
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_snapshot_threshold_entries")]
    pub snapshot_threshold_entries: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_queue_backpressure_threshold")]
    pub queue_backpressure_threshold: usize,
    #[serde(default = "default_batch_max_size")]
    pub batch_max_size: usize,
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    pub hsm_primary: HsmEndpointConfig,
    #[serde(default)]
    pub hsm_secondary: Option<HsmEndpointConfig>,
    #[serde(default = "default_rotation_interval_days")]
    pub rotation_interval_days: u64,
    #[serde(default = "default_overlap_hours")]
    pub overlap_hours: u64,

    #[serde(default)]
    pub circuit_breaker_default: CircuitBreakerConfig,
    #[serde(default)]
    pub retry_default: RetryConfig,
    #[serde(default)]
    pub cache_levels: Vec<CacheLevelConfig>,

    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl NodeConfig {
    pub fn node_id(&self) -> NodeId {
        NodeId(self.node_id)
    }

    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.peers.iter().copied().map(NodeId).collect()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks TOML deserialization alone cannot express: ordering
    /// between the election timeout bounds, the backpressure threshold sitting
    /// below capacity, and every declared cache level having room to hold
    /// something.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [min, max] = self.election_timeout_ms;
        if min >= max {
            return Err(ConfigError::Validation(format!(
                "election_timeout_ms minimum {} must be less than maximum {}",
                min, max
            )));
        }
        if self.queue_backpressure_threshold > self.queue_capacity {
            return Err(ConfigError::Validation(format!(
                "queue_backpressure_threshold {} exceeds queue_capacity {}",
                self.queue_backpressure_threshold, self.queue_capacity
            )));
        }
        if self.batch_max_size == 0 {
            return Err(ConfigError::Validation(
                "batch_max_size must be greater than zero".to_string(),
            ));
        }
        for level in &self.cache_levels {
            if level.capacity == 0 {
                return Err(ConfigError::Validation(
                    "cache level capacity must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_toml() -> &'static str {
        r#"
        node_id = "11111111-1111-1111-1111-111111111111"
        peers = ["22222222-2222-2222-2222-222222222222"]
        log_dir = "/var/log/sequencer"
        state_dir = "/var/lib/sequencer"

        [hsm_primary]
        provider = "software"
        endpoint = "local"
        "#
    }

    #[test]
    fn loads_minimal_config_with_defaults_filled_in() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_toml().as_bytes()).unwrap();
        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.queue_capacity, default_queue_capacity());
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.circuit_breaker_default.failure_threshold, 5);
    }

    #[test]
    fn rejects_backwards_election_timeout() {
        let mut config: NodeConfig = {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(minimal_toml().as_bytes()).unwrap();
            NodeConfig::load(file.path()).unwrap()
        };
        config.election_timeout_ms = [300, 150];
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_backpressure_threshold_above_capacity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_toml().as_bytes()).unwrap();
        let mut config = NodeConfig::load(file.path()).unwrap();
        config.queue_backpressure_threshold = config.queue_capacity + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = NodeConfig::load("/nonexistent/path/sequencer.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
