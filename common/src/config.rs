use std::{fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Network-wide consensus timing knobs. Values are grounded in the
/// CryptoNote-lineage reference daemon this project descends from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Target seconds between blocks.
    pub difficulty_target: u64,
    /// LWMA-2 window size for the V5 difficulty algorithm.
    pub difficulty_window: u64,
    /// LWMA-2 window size for the V3/V4 difficulty algorithms.
    pub difficulty_window_v1: u64,
    /// Maximum permitted future drift of a block timestamp, in seconds.
    pub block_future_time_limit: u64,
    /// Height at which tighter mixin bounds take effect.
    pub mixin_limits_v1_height: u64,
    /// Height at which the soft-shell long-hash family activates.
    pub soft_shell_activation_height: u64,
    /// Depth beyond which an orphaned alternative chain is discarded.
    pub max_alt_chain_depth: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            difficulty_target: 120,
            difficulty_window: 60,
            difficulty_window_v1: 60,
            block_future_time_limit: 7200,
            mixin_limits_v1_height: 0,
            soft_shell_activation_height: u64::MAX,
            max_alt_chain_depth: 2000,
        }
    }
}

/// On-disk storage location configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Initial LMDB map size, in megabytes.
    pub lmdb_map_size_mb: u64,
    /// Grow the map by this many megabytes when free space runs low.
    pub lmdb_growth_step_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            lmdb_map_size_mb: 512,
            lmdb_growth_step_mb: 256,
        }
    }
}

/// P2P listener, peer-list and rate-limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    pub listen_port: u16,
    pub network_id: [u8; 16],
    pub max_white_peers: usize,
    pub max_gray_peers: usize,
    /// Fraction (0..=100) of connection attempts steered at the white list.
    pub white_list_attempt_weight: u8,
    pub allow_local_ip: bool,
    pub max_tx_pushes_per_peer: u32,
    pub tx_push_window_secs: u64,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_port: 18080,
            network_id: *b"ember-mainnet-01",
            max_white_peers: 1000,
            max_gray_peers: 5000,
            white_list_attempt_weight: 70,
            allow_local_ip: false,
            max_tx_pushes_per_peer: 15,
            tx_push_window_secs: 240,
        }
    }
}

/// The aggregate node configuration, deserialized from a single TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmberConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub p2p: P2pConfig,
}

impl EmberConfig {
    /// Load configuration from `path`, falling back to defaults for any
    /// field the file omits.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Returns the default config directory (`~/.ember`), used when no
    /// explicit config path is given.
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        dirs_next::home_dir()
            .map(|home| home.join(".ember"))
            .ok_or(ConfigError::NoBaseDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_roundtrip_through_toml() {
        let cfg = EmberConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: EmberConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.difficulty_target, cfg.network.difficulty_target);
        assert_eq!(parsed.p2p.listen_port, cfg.p2p.listen_port);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.toml");
        std::fs::write(&path, "[p2p]\nlisten_port = 9999\n").unwrap();
        let cfg = EmberConfig::load(&path).unwrap();
        assert_eq!(cfg.p2p.listen_port, 9999);
        assert_eq!(cfg.network.difficulty_target, NetworkConfig::default().difficulty_target);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = EmberConfig::load(Path::new("/nonexistent/ember.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
