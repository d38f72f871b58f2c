//! # Consensus Bridge
//!
//! ABCI-style entry points consensus drives for every block:
//!
//! ```text
//! begin_block ──→ deliver_tx (per tx, in order) ──→ end_block
//!                      │
//!          announce tx, deliver its messages concurrently
//! ```
//!
//! `rollback` abandons the block in progress.

use std::sync::Arc;
use tracing::{info, warn};

use qc_11_execution_layer::{
    handle_query, BlockHeader, BlockLifecycleApi, EndBlockOutcome, ExecutionLayerError,
    ExecutionLayerHandler, ExecutionLayerService, GenesisConfig, GenesisState, KeyValueStore,
    MessageResult, RawMessage, ResultCode, StateHash,
};

/// A transaction as ordered by consensus: one or more routed messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub messages: Vec<RawMessage>,
}

/// Result of one transaction. The code is that of the first failed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    pub code: ResultCode,
    pub messages: Vec<MessageResult>,
}

impl TxResult {
    fn from_messages(messages: Vec<MessageResult>) -> Self {
        let code = messages
            .iter()
            .map(|m| m.code)
            .find(|code| !code.is_ok())
            .unwrap_or(ResultCode::Ok);
        Self { code, messages }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

/// Everything a committed block produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockReport {
    pub txs: Vec<TxResult>,
    pub outcome: EndBlockOutcome,
}

pub struct ConsensusBridge<S: KeyValueStore + 'static> {
    service: Arc<ExecutionLayerService<S>>,
    handler: Arc<ExecutionLayerHandler<S>>,
}

impl<S: KeyValueStore + 'static> ConsensusBridge<S> {
    pub fn new(
        service: Arc<ExecutionLayerService<S>>,
        handler: Arc<ExecutionLayerHandler<S>>,
    ) -> Self {
        Self { service, handler }
    }

    pub async fn init_chain(&self, config: GenesisConfig) -> Result<StateHash, ExecutionLayerError> {
        self.service.init_genesis(config).await
    }

    pub async fn export_genesis(&self) -> Result<GenesisState, ExecutionLayerError> {
        self.service.export_genesis().await
    }

    pub async fn begin_block(&self, header: BlockHeader) -> Result<(), ExecutionLayerError> {
        self.service.begin_block(header).await
    }

    pub async fn deliver_tx(&self, tx_index: u32, tx: &Transaction) -> TxResult {
        let results = self.handler.handle_transaction(tx_index, &tx.messages).await;
        let result = TxResult::from_messages(results);
        if !result.is_ok() {
            warn!(tx_index, code = ?result.code, "[qc-11] Transaction had failed messages");
        }
        result
    }

    pub async fn end_block(&self) -> Result<EndBlockOutcome, ExecutionLayerError> {
        self.service.end_block().await
    }

    pub async fn rollback(&self) -> Result<(), ExecutionLayerError> {
        self.service.abandon_block().await
    }

    /// Drive a whole block: begin, every transaction in order, end.
    pub async fn process_block(
        &self,
        header: BlockHeader,
        txs: &[Transaction],
    ) -> Result<BlockReport, ExecutionLayerError> {
        self.begin_block(header).await?;
        let mut results = Vec::with_capacity(txs.len());
        for (tx, tx_index) in txs.iter().zip(0u32..) {
            results.push(self.deliver_tx(tx_index, tx).await);
        }
        let outcome = self.end_block().await?;
        Ok(BlockReport {
            txs: results,
            outcome,
        })
    }

    pub async fn query(&self, route: &str, data: &[u8]) -> Result<Vec<u8>, ExecutionLayerError> {
        handle_query(self.service.as_ref(), route, data).await
    }

    /// Abandon whatever block is in progress. Used on shutdown.
    pub async fn shutdown(&self) {
        if self.service.block_context().is_some() {
            match self.rollback().await {
                Ok(()) => info!("[qc-11] Abandoned block in progress on shutdown"),
                Err(e) => warn!(error = %e, "[qc-11] Could not abandon block on shutdown"),
            }
        }
    }
}
