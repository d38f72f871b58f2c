//! Inbound Ports (Driving Ports / API)
//!
//! The block lifecycle as driven by consensus.

use async_trait::async_trait;

use crate::application::service::{BlockHeader, EndBlockOutcome, GenesisState};
use crate::chainspec::GenesisConfig;
use crate::domain::deploy::DeployOutcome;
use crate::domain::errors::ExecutionLayerError;
use crate::domain::value_objects::{DeployKey, QueryKey, StateHash};
use crate::domain::DeployPayload;
use tokio::sync::oneshot;

/// Primary Execution Layer API
#[async_trait]
pub trait BlockLifecycleApi: Send + Sync {
    /// Inherit the parent's state hash and open a candidate block.
    async fn begin_block(&self, header: BlockHeader) -> Result<(), ExecutionLayerError>;

    /// Announce how many deploys transaction `tx_index` carries so they can
    /// run before the block is sealed.
    fn expect_transaction(&self, tx_index: u32, deploy_count: u32)
        -> Result<(), ExecutionLayerError>;

    /// Queue a deploy. The receiver resolves once the deploy has been executed
    /// and committed, or has failed.
    fn submit_deploy(
        &self,
        key: DeployKey,
        payload: DeployPayload,
    ) -> Result<oneshot::Receiver<DeployOutcome>, ExecutionLayerError>;

    /// Mark a position that will never carry a deploy, e.g. a message that
    /// failed to decode, so later positions do not wait for it.
    fn skip_deploy(&self, key: DeployKey) -> Result<(), ExecutionLayerError>;

    /// Withdraw a queued deploy before it runs. `Ok(false)` means it already
    /// started and its receiver will still resolve.
    fn cancel_deploy(&self, key: DeployKey) -> Result<bool, ExecutionLayerError>;

    /// Seal the block, wait for every queued deploy and record the final state hash.
    async fn end_block(&self) -> Result<EndBlockOutcome, ExecutionLayerError>;

    /// Drop the block in progress. Queued deploys fail with `Abandoned`.
    async fn abandon_block(&self) -> Result<(), ExecutionLayerError>;

    /// State hash the next deploy of the current block would execute against.
    fn current_pre_state_hash(&self) -> Option<StateHash>;

    /// Run genesis and record its state hash.
    async fn init_genesis(&self, config: GenesisConfig) -> Result<StateHash, ExecutionLayerError>;

    /// Genesis state with balances as of the last finalized block.
    async fn export_genesis(&self) -> Result<GenesisState, ExecutionLayerError>;

    /// Query global state. `state_hash` defaults to the last finalized one.
    async fn query(
        &self,
        key: QueryKey,
        path: Vec<String>,
        state_hash: Option<StateHash>,
    ) -> Result<serde_json::Value, ExecutionLayerError>;

    /// Account balance. `state_hash` defaults to the last finalized one.
    async fn query_balance(
        &self,
        public_key: Vec<u8>,
        state_hash: Option<StateHash>,
    ) -> Result<String, ExecutionLayerError>;
}
