//! # Node Configuration
//!
//! One TOML file with an `[execution]`, `[engine]`, `[storage]` and `[genesis]`
//! table. Every table and field is optional. `QC_*` environment variables
//! override the file.

use qc_11_execution_layer::ExecutionLayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CONFIG: &str = "QC_CONFIG";
pub const ENV_ENGINE_URL: &str = "QC_ENGINE_URL";
pub const ENV_DATA_DIR: &str = "QC_DATA_DIR";
pub const ENV_CHAINSPEC: &str = "QC_CHAINSPEC";
pub const ENV_DEV: &str = "QC_DEV";
pub const ENV_REPLAY: &str = "QC_REPLAY";

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub execution: ExecutionLayerConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub genesis: GenesisSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// External engine over JSON-RPC at `execution.engine_url`
    #[default]
    JsonRpc,
    /// In-process deterministic engine, for development only
    Deterministic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    RocksDb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding the state-hash database
    pub data_dir: PathBuf,
    /// fsync every write
    pub sync_writes: bool,
    /// Allow finalized state hashes to be rewritten while re-executing history
    pub replay: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
            replay: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisSection {
    /// Chain-spec manifest used when the store has no genesis yet
    pub chain_spec: PathBuf,
}

impl Default for GenesisSection {
    fn default() -> Self {
        Self {
            chain_spec: PathBuf::from("./chainspec/manifest.toml"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Could not read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Could not parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidEnv { var: String, message: String },
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `QC_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_ENGINE_URL) {
            self.execution.engine_url = url;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_CHAINSPEC) {
            self.genesis.chain_spec = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_DEV) {
            if parse_flag(ENV_DEV, &value)? {
                self.engine.kind = EngineKind::Deterministic;
                self.storage.backend = StorageBackend::Memory;
            }
        }
        if let Some(value) = lookup(ENV_REPLAY) {
            self.storage.replay = parse_flag(ENV_REPLAY, &value)?;
        }
        Ok(())
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
