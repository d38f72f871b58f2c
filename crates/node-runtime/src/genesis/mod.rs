//! # Genesis
//!
//! Runs genesis from the configured chain spec the first time a node starts on
//! an empty store. Failure here stops the node.

use anyhow::{Context, Result};
use qc_11_execution_layer::{bootstrap, ExecutionLayerService, KeyValueStore, StateHash};
use std::path::Path;
use tracing::info;

pub async fn initialize<S: KeyValueStore + 'static>(
    service: &ExecutionLayerService<S>,
    chain_spec: &Path,
) -> Result<StateHash> {
    info!("Checking for genesis state...");
    let hash = bootstrap(service, chain_spec)
        .await
        .with_context(|| format!("genesis from {} failed", chain_spec.display()))?;
    info!(state_hash = %hash, "Genesis state ready");
    Ok(hash)
}
