//! Execution Layer Service
//!
//! Owns at most one candidate block at a time and the driver task draining it.
//! Implements [`BlockLifecycleApi`] on top of the keeper and the engine port.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::driver::BlockDriver;
use super::genesis;
use super::keeper::StateHashKeeper;
use crate::chainspec::{GenesisAccount, GenesisConfig};
use crate::config::ExecutionLayerConfig;
use crate::domain::candidate::{BlockMetadata, CandidateBlock, DrainSummary};
use crate::domain::deploy::{DeployItem, DeployOutcome, DeployPayload};
use crate::domain::errors::{EngineError, ExecutionLayerError, Result};
use crate::domain::value_objects::{Bond, BlockId, DeployKey, ProtocolVersion, QueryKey, StateHash};
use crate::ports::inbound::BlockLifecycleApi;
use crate::ports::outbound::{ExecutionEngine, KeyValueStore};

/// Block header fields the execution layer consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub block_id: BlockId,
    /// Empty for the first block after genesis
    pub parent_id: BlockId,
    pub height: u64,
    /// Seconds since the epoch
    pub time: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndBlockOutcome {
    pub block_id: BlockId,
    /// `None` if the block never had a pre-state hash
    pub state_hash: Option<StateHash>,
    pub summary: DrainSummary,
    /// Bonded validators after the block's last commit, empty if none reported
    pub validator_updates: Vec<Bond>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub genesis_conf: GenesisConfig,
    /// Accounts with balances as of the last finalized block
    pub accounts: Vec<GenesisAccount>,
    pub chain_name: String,
}

/// What a message handler needs to know about the block in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub block_id: BlockId,
    pub height: u64,
    pub block_time: u64,
    pub chain_name: String,
}

/// Facts fixed at genesis, cached so blocks don't decode the genesis config.
#[derive(Clone, Debug)]
struct ChainFacts {
    chain_name: String,
    protocol_version: ProtocolVersion,
}

struct ActiveBlock {
    candidate: Arc<CandidateBlock>,
    driver: JoinHandle<DrainSummary>,
    chain_name: String,
}

pub struct ExecutionLayerService<S: KeyValueStore + 'static> {
    config: ExecutionLayerConfig,
    engine: Arc<dyn ExecutionEngine>,
    keeper: Arc<StateHashKeeper<S>>,
    facts: RwLock<Option<ChainFacts>>,
    bonds: RwLock<Vec<Bond>>,
    active: Mutex<Option<ActiveBlock>>,
}

impl<S: KeyValueStore + 'static> ExecutionLayerService<S> {
    /// Build the service over an existing store. Genesis facts already on disk
    /// are picked up.
    pub fn new(
        config: ExecutionLayerConfig,
        engine: Arc<dyn ExecutionEngine>,
        keeper: Arc<StateHashKeeper<S>>,
    ) -> Result<Self> {
        let facts = keeper.genesis_config()?.map(|conf| ChainFacts {
            chain_name: conf.name,
            protocol_version: conf.protocol_version,
        });
        Ok(Self {
            config,
            engine,
            keeper,
            facts: RwLock::new(facts),
            bonds: RwLock::new(Vec::new()),
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ExecutionLayerConfig {
        &self.config
    }

    pub fn keeper(&self) -> &Arc<StateHashKeeper<S>> {
        &self.keeper
    }

    pub fn completion_timeout(&self) -> Duration {
        self.config.completion_timeout()
    }

    pub fn genesis_state_hash(&self) -> Result<Option<StateHash>> {
        Ok(self.keeper.genesis_state_hash()?)
    }

    /// Latest bonded validator set reported by the engine.
    pub fn bonded_validators(&self) -> Vec<Bond> {
        self.bonds.read().clone()
    }

    pub fn block_context(&self) -> Option<BlockContext> {
        let active = self.active.lock();
        active.as_ref().map(|a| {
            let meta = a.candidate.meta();
            BlockContext {
                block_id: meta.block_id.clone(),
                height: meta.height,
                block_time: meta.block_time,
                chain_name: a.chain_name.clone(),
            }
        })
    }

    fn chain_facts(&self) -> Result<ChainFacts> {
        self.facts
            .read()
            .clone()
            .ok_or(ExecutionLayerError::GenesisMissing)
    }

    fn active_candidate(&self) -> Result<Arc<CandidateBlock>> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.candidate.clone())
            .ok_or(ExecutionLayerError::NoActiveBlock)
    }

    /// The first block after genesis has no parent id and builds on genesis.
    fn resolve_parent(&self, header: &BlockHeader) -> BlockId {
        if header.parent_id.is_empty() && header.height <= self.config.initial_height {
            BlockId::genesis()
        } else {
            header.parent_id.clone()
        }
    }

    fn resolve_state_hash(&self, state_hash: Option<StateHash>) -> Result<StateHash> {
        match state_hash {
            Some(hash) => Ok(hash),
            None => self
                .keeper
                .last_finalized_state_hash()?
                .ok_or(ExecutionLayerError::GenesisMissing),
        }
    }

    async fn with_deadline<T>(
        &self,
        call: impl std::future::Future<Output = std::result::Result<T, EngineError>>,
    ) -> std::result::Result<T, EngineError> {
        let deadline = self.config.rpc_timeout();
        tokio::time::timeout(deadline, call)
            .await
            .map_err(|_| EngineError::Timeout(deadline))?
    }

    async fn join_driver(block: &BlockId, driver: JoinHandle<DrainSummary>) -> Result<DrainSummary> {
        driver.await.map_err(|e| {
            error!(%block, error = %e, "[qc-11] Block driver task failed");
            ExecutionLayerError::DriverFailed(e.to_string())
        })
    }
}

#[async_trait]
impl<S: KeyValueStore + 'static> BlockLifecycleApi for ExecutionLayerService<S> {
    async fn begin_block(&self, header: BlockHeader) -> Result<()> {
        let facts = self.chain_facts()?;
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            return Err(ExecutionLayerError::BlockInProgress(
                current.candidate.block_id().to_string(),
            ));
        }

        let parent = self.resolve_parent(&header);
        self.keeper.propagate(&parent, &header.block_id)?;
        let pre_state_hash = self.keeper.lookup(&header.block_id)?;
        if pre_state_hash.is_none() {
            warn!(
                block = %header.block_id,
                %parent,
                height = header.height,
                "[qc-11] No pre-state hash; deploys in this block will fail"
            );
        }

        let meta = BlockMetadata {
            block_id: header.block_id.clone(),
            height: header.height,
            block_time: header.time,
            pre_state_hash,
            protocol_version: facts.protocol_version,
            bonds: self.bonds.read().clone(),
        };
        let candidate = Arc::new(CandidateBlock::new(meta, self.config.drain_policy));
        let driver = BlockDriver::new(
            self.engine.clone(),
            self.keeper.clone(),
            self.config.rpc_timeout(),
        );
        let handle = tokio::spawn(driver.run(candidate.clone()));

        info!(
            block = %header.block_id,
            %parent,
            height = header.height,
            pre_state_hash = ?pre_state_hash,
            "[qc-11] Block started"
        );
        *active = Some(ActiveBlock {
            candidate,
            driver: handle,
            chain_name: facts.chain_name,
        });
        Ok(())
    }

    fn expect_transaction(&self, tx_index: u32, deploy_count: u32) -> Result<()> {
        let candidate = self.active_candidate()?;
        candidate.expect_transaction(tx_index, deploy_count)?;
        Ok(())
    }

    fn submit_deploy(
        &self,
        key: DeployKey,
        payload: DeployPayload,
    ) -> Result<oneshot::Receiver<DeployOutcome>> {
        let candidate = self.active_candidate()?;
        let (item, completion) = DeployItem::new(key, payload);
        if let Err(err) = candidate.enqueue(item) {
            error!(
                kind = "invariant",
                block = %candidate.block_id(),
                %key,
                error = %err,
                "[qc-11] Deploy rejected by queue"
            );
            return Err(err.into());
        }
        debug!(block = %candidate.block_id(), %key, "[qc-11] Deploy queued");
        Ok(completion)
    }

    fn skip_deploy(&self, key: DeployKey) -> Result<()> {
        let candidate = self.active_candidate()?;
        candidate.skip(key)?;
        debug!(block = %candidate.block_id(), %key, "[qc-11] Position skipped");
        Ok(())
    }

    fn cancel_deploy(&self, key: DeployKey) -> Result<bool> {
        let candidate = self.active_candidate()?;
        let cancelled = candidate.cancel(key)?;
        if cancelled {
            warn!(block = %candidate.block_id(), %key, "[qc-11] Deploy withdrawn before execution");
        }
        Ok(cancelled)
    }

    async fn end_block(&self) -> Result<EndBlockOutcome> {
        let active = self
            .active
            .lock()
            .take()
            .ok_or(ExecutionLayerError::NoActiveBlock)?;
        let candidate = active.candidate;
        let block_id = candidate.block_id().clone();

        candidate.seal();
        candidate.wait_all_processed().await;
        let summary = Self::join_driver(&block_id, active.driver).await?;

        let state_hash = candidate.finalize()?;
        match state_hash {
            Some(hash) => self.keeper.record_final(&block_id, hash)?,
            None => warn!(block = %block_id, "[qc-11] Block ended without a state hash"),
        }
        candidate.close()?;

        let validator_updates = candidate.bonded_validators().unwrap_or_default();
        if !validator_updates.is_empty() {
            *self.bonds.write() = validator_updates.clone();
        }

        info!(
            block = %block_id,
            state_hash = ?state_hash,
            executed = summary.executed,
            failed = summary.failed,
            validators = validator_updates.len(),
            "[qc-11] Block finalized"
        );
        Ok(EndBlockOutcome {
            block_id,
            state_hash,
            summary,
            validator_updates,
        })
    }

    async fn abandon_block(&self) -> Result<()> {
        let active = self
            .active
            .lock()
            .take()
            .ok_or(ExecutionLayerError::NoActiveBlock)?;
        let candidate = active.candidate;
        let block_id = candidate.block_id().clone();

        let dropped = candidate.abandon()?;
        let count = dropped.len();
        for item in dropped {
            item.complete(Err(ExecutionLayerError::Abandoned));
            if let Err(err) = candidate.mark_processed() {
                error!(kind = "invariant", block = %block_id, error = %err, "[qc-11] Pending counter");
            }
        }
        let summary = Self::join_driver(&block_id, active.driver).await?;

        warn!(
            block = %block_id,
            dropped = count,
            executed = summary.executed,
            "[qc-11] Block abandoned"
        );
        Ok(())
    }

    fn current_pre_state_hash(&self) -> Option<StateHash> {
        self.active
            .lock()
            .as_ref()
            .and_then(|a| a.candidate.current_state_hash())
    }

    async fn init_genesis(&self, config: GenesisConfig) -> Result<StateHash> {
        if self.active.lock().is_some() {
            return Err(ExecutionLayerError::BlockInProgress("genesis".into()));
        }
        let hash = genesis::run_genesis(
            self.engine.as_ref(),
            &self.keeper,
            &config,
            self.config.rpc_timeout(),
        )
        .await?;
        *self.facts.write() = Some(ChainFacts {
            chain_name: config.name,
            protocol_version: config.protocol_version,
        });
        Ok(hash)
    }

    async fn export_genesis(&self) -> Result<GenesisState> {
        let genesis_conf = self
            .keeper
            .genesis_config()?
            .ok_or(ExecutionLayerError::GenesisMissing)?;
        let chain_name = self
            .keeper
            .chain_name()?
            .unwrap_or_else(|| genesis_conf.name.clone());
        let state_hash = self.resolve_state_hash(None)?;

        let mut accounts = Vec::with_capacity(genesis_conf.accounts.len());
        for account in &genesis_conf.accounts {
            let balance = self
                .with_deadline(self.engine.query_balance(
                    state_hash,
                    account.public_key.as_bytes(),
                    genesis_conf.protocol_version,
                ))
                .await?;
            accounts.push(GenesisAccount {
                public_key: account.public_key,
                balance: balance.parse()?,
                bonded_amount: account.bonded_amount,
            });
        }

        info!(
            chain_name = %chain_name,
            state_hash = %state_hash,
            accounts = accounts.len(),
            "[qc-11] Genesis exported"
        );
        Ok(GenesisState {
            genesis_conf,
            accounts,
            chain_name,
        })
    }

    async fn query(
        &self,
        key: QueryKey,
        path: Vec<String>,
        state_hash: Option<StateHash>,
    ) -> Result<serde_json::Value> {
        let facts = self.chain_facts()?;
        let state_hash = self.resolve_state_hash(state_hash)?;
        let value = self
            .with_deadline(
                self.engine
                    .query(state_hash, &key, &path, facts.protocol_version),
            )
            .await?;
        Ok(value)
    }

    async fn query_balance(
        &self,
        public_key: Vec<u8>,
        state_hash: Option<StateHash>,
    ) -> Result<String> {
        let facts = self.chain_facts()?;
        let state_hash = self.resolve_state_hash(state_hash)?;
        let balance = self
            .with_deadline(
                self.engine
                    .query_balance(state_hash, &public_key, facts.protocol_version),
            )
            .await?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::deterministic_engine::{DeterministicEngine, EngineOp};
    use crate::domain::candidate::CandidatePhase;
    use crate::ports::outbound::InMemoryKVStore;

    struct Harness {
        engine: Arc<DeterministicEngine>,
        service: ExecutionLayerService<InMemoryKVStore>,
        genesis: StateHash,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::chainspec::fixtures::write_chain_spec(dir.path());
        let config = GenesisConfig::from_chain_spec(&path).unwrap();

        let engine = Arc::new(DeterministicEngine::new());
        let keeper = Arc::new(StateHashKeeper::new(InMemoryKVStore::new()));
        let service =
            ExecutionLayerService::new(ExecutionLayerConfig::for_testing(), engine.clone(), keeper)
                .unwrap();
        let genesis = service.init_genesis(config).await.unwrap();
        Harness {
            engine,
            service,
            genesis,
            _dir: dir,
        }
    }

    fn header(id: &[u8], parent: &[u8], height: u64) -> BlockHeader {
        BlockHeader {
            block_id: BlockId::new(id.to_vec()),
            parent_id: BlockId::new(parent.to_vec()),
            height,
            time: 1_000 + height,
        }
    }

    fn payload(tag: &str) -> DeployPayload {
        DeployPayload::from_bytes(tag.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_first_block_builds_on_genesis() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        assert_eq!(h.service.current_pre_state_hash(), Some(h.genesis));

        let rx = h.service.submit_deploy(DeployKey::new(0, 0), payload("d0")).unwrap();
        let outcome = h.service.end_block().await.unwrap();
        let receipt = rx.await.unwrap().unwrap();

        assert_eq!(receipt.pre_state_hash, h.genesis);
        assert_eq!(outcome.state_hash, Some(receipt.post_state_hash));
        assert_eq!(outcome.summary, DrainSummary { executed: 1, failed: 0 });
        assert!(h.service.keeper().is_finalized(&outcome.block_id).unwrap());
        assert_eq!(
            h.service.keeper().last_finalized().unwrap(),
            Some(BlockId::new(b"b1".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_empty_block_keeps_parent_hash() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        let outcome = h.service.end_block().await.unwrap();
        assert_eq!(outcome.state_hash, Some(h.genesis));
        assert_eq!(outcome.summary, DrainSummary::default());
    }

    #[tokio::test]
    async fn test_chained_blocks() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.submit_deploy(DeployKey::new(0, 0), payload("a")).unwrap();
        let first = h.service.end_block().await.unwrap();

        h.service.begin_block(header(b"b2", b"b1", 2)).await.unwrap();
        assert_eq!(h.service.current_pre_state_hash(), first.state_hash);
        let rx = h.service.submit_deploy(DeployKey::new(0, 0), payload("b")).unwrap();
        let second = h.service.end_block().await.unwrap();
        let receipt = rx.await.unwrap().unwrap();
        assert_eq!(Some(receipt.pre_state_hash), first.state_hash);
        assert_ne!(second.state_hash, first.state_hash);
    }

    #[tokio::test]
    async fn test_unknown_parent_fails_deploys_not_block() {
        let h = harness().await;
        h.service.begin_block(header(b"b5", b"nope", 5)).await.unwrap();
        assert_eq!(h.service.current_pre_state_hash(), None);
        let rx = h.service.submit_deploy(DeployKey::new(0, 0), payload("x")).unwrap();
        let outcome = h.service.end_block().await.unwrap();
        assert!(matches!(
            rx.await.unwrap(),
            Err(ExecutionLayerError::MissingPreState(_))
        ));
        assert_eq!(outcome.state_hash, None);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(h.service.keeper().lookup(&outcome.block_id).unwrap(), None);
    }

    #[tokio::test]
    async fn test_one_block_at_a_time() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        assert!(matches!(
            h.service.begin_block(header(b"b2", b"b1", 2)).await,
            Err(ExecutionLayerError::BlockInProgress(_))
        ));
        h.service.end_block().await.unwrap();
        assert!(matches!(
            h.service.end_block().await,
            Err(ExecutionLayerError::NoActiveBlock)
        ));
        assert!(matches!(
            h.service.submit_deploy(DeployKey::new(0, 0), payload("late")),
            Err(ExecutionLayerError::NoActiveBlock)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_position_rejected() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.submit_deploy(DeployKey::new(0, 0), payload("a")).unwrap();
        let err = h
            .service
            .submit_deploy(DeployKey::new(0, 0), payload("b"))
            .unwrap_err();
        assert!(err.is_invariant_violation());
        h.service.end_block().await.unwrap();
        assert_eq!(h.engine.calls(EngineOp::Execute), 1);
    }

    #[tokio::test]
    async fn test_abandon_fails_queued_deploys() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        let rx0 = h.service.submit_deploy(DeployKey::new(0, 0), payload("a")).unwrap();
        let rx1 = h.service.submit_deploy(DeployKey::new(1, 0), payload("b")).unwrap();
        h.service.abandon_block().await.unwrap();

        assert!(matches!(rx0.await.unwrap(), Err(ExecutionLayerError::Abandoned)));
        assert!(matches!(rx1.await.unwrap(), Err(ExecutionLayerError::Abandoned)));
        assert_eq!(h.engine.calls(EngineOp::Execute), 0);
        assert!(!h
            .service
            .keeper()
            .is_finalized(&BlockId::new(b"b1".to_vec()))
            .unwrap());

        // A new block can start afterwards.
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.end_block().await.unwrap();
    }

    #[tokio::test]
    async fn test_announced_deploys_run_before_seal() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.expect_transaction(0, 1).unwrap();
        let rx = h.service.submit_deploy(DeployKey::new(0, 0), payload("a")).unwrap();

        let receipt = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("deploy should run before end_block")
            .unwrap()
            .unwrap();
        assert_eq!(h.service.current_pre_state_hash(), Some(receipt.post_state_hash));
        h.service.end_block().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_deploy_never_executes() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        let rx = h.service.submit_deploy(DeployKey::new(0, 0), payload("a")).unwrap();

        assert!(h.service.cancel_deploy(DeployKey::new(0, 0)).unwrap());
        assert!(rx.await.is_err());
        let outcome = h.service.end_block().await.unwrap();
        assert_eq!(outcome.summary.executed, 0);
        assert_eq!(outcome.state_hash, Some(h.genesis));
        assert!(h.engine.executed_order().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_position_lets_transaction_continue() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.expect_transaction(0, 2).unwrap();
        let rx = h.service.submit_deploy(DeployKey::new(0, 1), payload("b")).unwrap();
        h.service.skip_deploy(DeployKey::new(0, 0)).unwrap();

        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("deploy should run before end_block")
            .unwrap()
            .unwrap();
        assert_eq!(h.service.end_block().await.unwrap().summary.executed, 1);
    }

    #[tokio::test]
    async fn test_validator_updates_reported() {
        let h = harness().await;
        let bonds = vec![Bond {
            validator_public_key: vec![1; 32],
            stake: "1000".into(),
        }];
        h.engine.set_bonds(bonds.clone());
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.submit_deploy(DeployKey::new(0, 0), payload("bond")).unwrap();
        let outcome = h.service.end_block().await.unwrap();
        assert_eq!(outcome.validator_updates, bonds);
        assert_eq!(h.service.bonded_validators(), bonds);
    }

    #[tokio::test]
    async fn test_requires_genesis() {
        let engine = Arc::new(DeterministicEngine::new());
        let keeper = Arc::new(StateHashKeeper::new(InMemoryKVStore::new()));
        let service =
            ExecutionLayerService::new(ExecutionLayerConfig::for_testing(), engine, keeper)
                .unwrap();
        assert!(matches!(
            service.begin_block(header(b"b1", b"", 1)).await,
            Err(ExecutionLayerError::GenesisMissing)
        ));
        assert!(matches!(
            service.export_genesis().await,
            Err(ExecutionLayerError::GenesisMissing)
        ));
    }

    #[tokio::test]
    async fn test_export_and_query_balance() {
        let h = harness().await;
        let exported = h.service.export_genesis().await.unwrap();
        assert_eq!(exported.chain_name, "test-chain");
        assert_eq!(exported.accounts.len(), 2);
        assert_eq!(exported.accounts[0].balance.to_string(), "500000000");

        let balance = h.service.query_balance(vec![2; 32], None).await.unwrap();
        assert_eq!(balance, "1000000");

        let value = h
            .service
            .query(QueryKey::Address(vec![1; 32]), vec![], Some(h.genesis))
            .await
            .unwrap();
        assert_eq!(value["account"]["balance"], "500000000");
    }

    #[tokio::test]
    async fn test_finalized_block_not_reopened_in_live_mode() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.end_block().await.unwrap();
        let err = h.service.begin_block(header(b"b1", b"", 1)).await.unwrap_err();
        assert!(err.is_invariant_violation());

        h.service.keeper().set_replay(true);
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        h.service.end_block().await.unwrap();
    }

    #[tokio::test]
    async fn test_candidate_closed_after_end_block() {
        let h = harness().await;
        h.service.begin_block(header(b"b1", b"", 1)).await.unwrap();
        let candidate = h.service.active_candidate().unwrap();
        h.service.end_block().await.unwrap();
        assert_eq!(candidate.phase(), CandidatePhase::Closed);
    }
}
