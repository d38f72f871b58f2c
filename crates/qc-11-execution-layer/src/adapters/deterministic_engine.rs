//! Deterministic in-process execution engine
//!
//! Stands in for the external engine in tests and dev nodes. State hashes are
//! SHA-256 chains over the previous hash and the committed effects, so equal
//! inputs always give equal hashes. Failures can be scripted per call.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::chainspec::GenesisConfig;
use crate::domain::deploy::{CommitSuccess, DeployPayload, DeployResult, Effects, TransformEntry};
use crate::domain::errors::EngineError;
use crate::domain::value_objects::{Bond, ProtocolVersion, QueryKey, StateHash};
use crate::ports::outbound::ExecutionEngine;

/// Gas charged per payload byte.
const COST_PER_BYTE: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineOp {
    Genesis,
    Execute,
    Commit,
    Query,
}

#[derive(Default)]
struct EngineState {
    /// State hashes the engine can execute on
    known: HashSet<StateHash>,
    /// Balances per account, as of genesis
    balances: HashMap<Vec<u8>, String>,
    bonds: Vec<Bond>,
    calls: HashMap<EngineOp, usize>,
    faults: HashMap<(EngineOp, usize), EngineError>,
    executed: Vec<[u8; 32]>,
    latency: Option<Duration>,
}

impl EngineState {
    /// Count the call and return its scripted fault, if any.
    fn tick(&mut self, op: EngineOp) -> Result<(), EngineError> {
        let n = self.calls.entry(op).or_insert(0);
        let index = *n;
        *n += 1;
        match self.faults.remove(&(op, index)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct DeterministicEngine {
    state: Mutex<EngineState>,
}

impl DeterministicEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an arbitrary state known to the engine and return its hash.
    pub fn seed_state(&self, seed: &[u8]) -> StateHash {
        let hash = StateHash::new(Sha256::digest(seed).into());
        self.state.lock().known.insert(hash);
        hash
    }

    /// Fail the `n`th call (0-based, over the engine's lifetime) of `op`.
    pub fn fail_nth(&self, op: EngineOp, n: usize, error: EngineError) {
        self.state.lock().faults.insert((op, n), error);
    }

    /// Sleep this long inside every execute and commit.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }

    /// Validators reported by every subsequent commit.
    pub fn set_bonds(&self, bonds: Vec<Bond>) {
        self.state.lock().bonds = bonds;
    }

    /// Deploy hashes of every successfully executed deploy, in execution order.
    pub fn executed_order(&self) -> Vec<[u8; 32]> {
        self.state.lock().executed.clone()
    }

    pub fn calls(&self, op: EngineOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn require_known(&self, hash: &StateHash) -> Result<(), EngineError> {
        if self.state.lock().known.contains(hash) {
            Ok(())
        } else {
            Err(EngineError::MissingParent(hash.to_hex()))
        }
    }

    fn effects_for(pre_state_hash: &StateHash, payload: &DeployPayload) -> Effects {
        Effects {
            transforms: vec![TransformEntry {
                key: payload.deploy_hash().to_vec(),
                transform: json!({
                    "write": hex::encode(payload.as_bytes()),
                    "on": pre_state_hash.to_hex(),
                }),
            }],
        }
    }
}

#[async_trait]
impl ExecutionEngine for DeterministicEngine {
    async fn run_genesis(&self, config: &GenesisConfig) -> Result<StateHash, EngineError> {
        let mut state = self.state.lock();
        state.tick(EngineOp::Genesis)?;

        let encoded = serde_json::to_vec(&config.to_wire())
            .map_err(|e| EngineError::GenesisFailed(e.to_string()))?;
        let hash = StateHash::new(Sha256::digest(&encoded).into());

        state.known.insert(hash);
        for account in &config.accounts {
            state
                .balances
                .insert(account.public_key.as_bytes().to_vec(), account.balance.to_string());
        }
        Ok(hash)
    }

    async fn execute(
        &self,
        pre_state_hash: StateHash,
        _block_time: u64,
        deploys: &[DeployPayload],
        _protocol_version: ProtocolVersion,
    ) -> Result<Vec<DeployResult>, EngineError> {
        self.delay().await;
        self.state.lock().tick(EngineOp::Execute)?;
        self.require_known(&pre_state_hash)?;

        let results = deploys
            .iter()
            .map(|payload| DeployResult {
                effects: Self::effects_for(&pre_state_hash, payload),
                cost: payload.as_bytes().len() as u64 * COST_PER_BYTE,
                error: None,
            })
            .collect();
        self.state
            .lock()
            .executed
            .extend(deploys.iter().map(DeployPayload::deploy_hash));
        Ok(results)
    }

    async fn commit(
        &self,
        pre_state_hash: StateHash,
        effects: &Effects,
        _protocol_version: ProtocolVersion,
    ) -> Result<CommitSuccess, EngineError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.tick(EngineOp::Commit)?;
        if !state.known.contains(&pre_state_hash) {
            return Err(EngineError::CommitRejected(format!(
                "missing prestate {}",
                pre_state_hash.to_hex()
            )));
        }

        let encoded = serde_json::to_vec(effects)
            .map_err(|e| EngineError::CommitRejected(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(pre_state_hash.as_bytes());
        hasher.update(&encoded);
        let post_state_hash = StateHash::new(hasher.finalize().into());

        state.known.insert(post_state_hash);
        Ok(CommitSuccess {
            post_state_hash,
            bonded_validators: state.bonds.clone(),
        })
    }

    async fn query(
        &self,
        state_hash: StateHash,
        key: &QueryKey,
        path: &[String],
        _protocol_version: ProtocolVersion,
    ) -> Result<serde_json::Value, EngineError> {
        let mut state = self.state.lock();
        state.tick(EngineOp::Query)?;
        if !state.known.contains(&state_hash) {
            return Err(EngineError::QueryFailed(format!(
                "unknown state {}",
                state_hash.to_hex()
            )));
        }
        match key {
            QueryKey::Address(public_key) if path.is_empty() => {
                let balance = state.balances.get(public_key).ok_or_else(|| {
                    EngineError::QueryFailed(format!("no account {}", hex::encode(public_key)))
                })?;
                Ok(json!({
                    "account": {
                        "public_key": hex::encode(public_key),
                        "balance": balance,
                    }
                }))
            }
            other => Err(EngineError::QueryFailed(format!(
                "value not found: {other:?} / {}",
                path.join("/")
            ))),
        }
    }

    async fn query_balance(
        &self,
        state_hash: StateHash,
        public_key: &[u8],
        _protocol_version: ProtocolVersion,
    ) -> Result<String, EngineError> {
        let mut state = self.state.lock();
        state.tick(EngineOp::Query)?;
        if !state.known.contains(&state_hash) {
            return Err(EngineError::QueryFailed(format!(
                "unknown state {}",
                state_hash.to_hex()
            )));
        }
        state
            .balances
            .get(public_key)
            .cloned()
            .ok_or_else(|| EngineError::QueryFailed(format!("no account {}", hex::encode(public_key))))
    }
}
