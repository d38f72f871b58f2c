//! Block driver
//!
//! One task per candidate block. Pops deploys in key order and for each one
//! runs Execute then Commit against the running state hash, advances the
//! keeper, and only then completes the deploy's handler.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::domain::candidate::{CandidateBlock, DrainSummary};
use crate::domain::deploy::{DeployItem, DeployOutcome, ExecutionReceipt};
use crate::domain::errors::{EngineError, ExecutionLayerError};
use crate::domain::invariants::invariant_strictly_ascending;
use crate::domain::value_objects::DeployKey;
use crate::ports::outbound::{ExecutionEngine, KeyValueStore};

use super::keeper::StateHashKeeper;

pub struct BlockDriver<S: KeyValueStore> {
    engine: Arc<dyn ExecutionEngine>,
    keeper: Arc<StateHashKeeper<S>>,
    rpc_timeout: Duration,
}

impl<S: KeyValueStore + 'static> BlockDriver<S> {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        keeper: Arc<StateHashKeeper<S>>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            keeper,
            rpc_timeout,
        }
    }

    /// Drain the candidate until it is sealed and empty, or abandoned.
    pub async fn run(self, candidate: Arc<CandidateBlock>) -> DrainSummary {
        let block = candidate.block_id().clone();
        debug!(%block, "[qc-11] Block driver started");

        let mut previous: Option<DeployKey> = None;
        let mut summary = DrainSummary::default();

        while let Some(item) = candidate.next_deploy().await {
            let key = item.key();
            if !invariant_strictly_ascending(previous, key) {
                error!(
                    kind = "invariant",
                    %block,
                    %key,
                    previous = ?previous,
                    "[qc-11] Deploy popped out of order"
                );
            }
            previous = Some(key);

            let outcome = self.process(&candidate, &item).await;
            match &outcome {
                Ok(receipt) => {
                    summary.executed += 1;
                    debug!(
                        %block,
                        %key,
                        post_state_hash = %receipt.post_state_hash,
                        cost = receipt.cost,
                        "[qc-11] Deploy committed"
                    );
                }
                Err(err) => {
                    summary.failed += 1;
                    candidate.record_failure();
                    log_failure(&block.to_string(), key, err);
                }
            }

            if !item.complete(outcome) {
                debug!(%block, %key, "[qc-11] Deploy handler no longer waiting");
            }
            if let Err(err) = candidate.mark_processed() {
                error!(kind = "invariant", %block, %key, error = %err, "[qc-11] Pending counter");
            }
        }

        info!(
            %block,
            executed = summary.executed,
            failed = summary.failed,
            "[qc-11] Block drained"
        );
        summary
    }

    async fn process(&self, candidate: &CandidateBlock, item: &DeployItem) -> DeployOutcome {
        let meta = candidate.meta();
        let pre_state_hash = candidate
            .current_state_hash()
            .ok_or_else(|| ExecutionLayerError::MissingPreState(meta.block_id.to_string()))?;
        let payload = item.payload();

        let results = self
            .with_deadline(self.engine.execute(
                pre_state_hash,
                meta.block_time,
                std::slice::from_ref(payload),
                meta.protocol_version,
            ))
            .await?;

        let result = match <[_; 1]>::try_from(results) {
            Ok([result]) => result,
            Err(results) => {
                return Err(EngineError::MalformedResponse(format!(
                    "expected 1 deploy result, got {}",
                    results.len()
                ))
                .into())
            }
        };
        if let Some(err) = result.error {
            return Err(EngineError::from(err).into());
        }

        let commit = self
            .with_deadline(
                self.engine
                    .commit(pre_state_hash, &result.effects, meta.protocol_version),
            )
            .await?;

        // Keeper first, then the in-memory cursor, then the handler.
        self.keeper.advance(&meta.block_id, commit.post_state_hash)?;
        candidate.record_success(commit.post_state_hash, commit.bonded_validators);

        Ok(ExecutionReceipt {
            key: item.key(),
            deploy_hash: payload.deploy_hash(),
            pre_state_hash,
            post_state_hash: commit.post_state_hash,
            cost: result.cost,
        })
    }

    async fn with_deadline<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        tokio::time::timeout(self.rpc_timeout, call)
            .await
            .map_err(|_| EngineError::Timeout(self.rpc_timeout))?
    }
}

fn log_failure(block: &str, key: DeployKey, err: &ExecutionLayerError) {
    match err {
        ExecutionLayerError::Engine(e) if e.is_transport() => {
            error!(kind = "transport", block, %key, error = %e, "[qc-11] Engine unreachable");
        }
        ExecutionLayerError::Engine(e) => {
            warn!(kind = "engine", block, %key, error = %e, "[qc-11] Deploy failed");
        }
        e if e.is_invariant_violation() => {
            error!(kind = "invariant", block, %key, error = %e, "[qc-11] Deploy failed");
        }
        e => {
            warn!(block, %key, error = %e, "[qc-11] Deploy failed");
        }
    }
}
