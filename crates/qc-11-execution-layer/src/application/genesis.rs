//! Genesis
//!
//! Runs genesis on the engine once per data directory and records the result.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use super::keeper::StateHashKeeper;
use super::service::ExecutionLayerService;
use crate::chainspec::GenesisConfig;
use crate::domain::errors::{ChainSpecError, EngineError, ExecutionLayerError, KeeperError};
use crate::domain::value_objects::{BlockId, StateHash};
use crate::ports::inbound::BlockLifecycleApi;
use crate::ports::outbound::{ExecutionEngine, KeyValueStore};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Chain spec: {0}")]
    ChainSpec(#[from] ChainSpecError),

    #[error("Genesis: {0}")]
    Genesis(#[from] ExecutionLayerError),
}

/// Ask the engine for the genesis state and persist it with the genesis facts.
pub async fn run_genesis<S: KeyValueStore>(
    engine: &dyn ExecutionEngine,
    keeper: &StateHashKeeper<S>,
    config: &GenesisConfig,
    deadline: Duration,
) -> Result<StateHash, ExecutionLayerError> {
    if let Some(existing) = keeper.genesis_state_hash()? {
        if !keeper.is_replay() {
            error!(
                kind = "invariant",
                state_hash = %existing,
                "[qc-11] Genesis already recorded"
            );
            return Err(KeeperError::AlreadyFinalized {
                block: BlockId::genesis().to_string(),
            }
            .into());
        }
    }

    let hash = tokio::time::timeout(deadline, engine.run_genesis(config))
        .await
        .map_err(|_| EngineError::Timeout(deadline))??;
    keeper.record_genesis(config, hash)?;

    info!(
        chain_name = %config.name,
        protocol_version = %config.protocol_version,
        accounts = config.accounts.len(),
        state_hash = %hash,
        "[qc-11] Genesis recorded"
    );
    Ok(hash)
}

/// Run genesis from a chain-spec file unless this store already has it.
pub async fn bootstrap<S: KeyValueStore + 'static>(
    service: &ExecutionLayerService<S>,
    chain_spec: impl AsRef<Path>,
) -> Result<StateHash, BootstrapError> {
    if let Some(hash) = service.genesis_state_hash()? {
        info!(state_hash = %hash, "[qc-11] Genesis already initialized");
        return Ok(hash);
    }

    let path = chain_spec.as_ref();
    info!(path = %path.display(), "[qc-11] Loading chain spec");
    let config = GenesisConfig::from_chain_spec(path)?;
    Ok(service.init_genesis(config).await?)
}
