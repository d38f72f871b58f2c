//! State hash keeper
//!
//! Durable map from block id to the engine state hash that block produced,
//! plus the genesis facts needed for export.
//!
//! Each block id holds one entry. `propagate` seeds it from the parent at
//! begin-block, `advance` moves it after every committed deploy, and
//! `record_final` marks it finalized at end-block. A finalized entry is only
//! rewritten in replay mode.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

use crate::chainspec::GenesisConfig;
use crate::domain::errors::KeeperError;
use crate::domain::invariants::invariant_state_hash_width;
use crate::domain::value_objects::{BlockId, StateHash, STATE_HASH_LENGTH};
use crate::ports::outbound::{BatchOperation, KeyValueStore};

const HASH_PREFIX: &[u8] = b"executionlayer/hash/";
const GENESIS_CONF_KEY: &[u8] = b"executionlayer/genesis_conf";
const CHAIN_NAME_KEY: &[u8] = b"executionlayer/chain_name";
const LAST_FINALIZED_KEY: &[u8] = b"executionlayer/last_finalized";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct StateHashEntry {
    ee_state: Vec<u8>,
    finalized: bool,
}

fn hash_key(block_id: &BlockId) -> Vec<u8> {
    let mut key = Vec::with_capacity(HASH_PREFIX.len() + block_id.as_bytes().len());
    key.extend_from_slice(HASH_PREFIX);
    key.extend_from_slice(block_id.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, KeeperError> {
    bincode::serialize(value).map_err(|e| KeeperError::Serialization(e.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, KeeperError> {
    bincode::deserialize(bytes).map_err(|e| KeeperError::Serialization(e.to_string()))
}

pub struct StateHashKeeper<S: KeyValueStore> {
    store: RwLock<S>,
    replay: AtomicBool,
}

impl<S: KeyValueStore> StateHashKeeper<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: RwLock::new(store),
            replay: AtomicBool::new(false),
        }
    }

    /// In replay mode finalized entries may be rewritten (re-executing blocks
    /// already on disk). Live mode refuses.
    pub fn set_replay(&self, replay: bool) {
        self.replay.store(replay, Ordering::SeqCst);
    }

    pub fn is_replay(&self) -> bool {
        self.replay.load(Ordering::SeqCst)
    }

    fn entry(&self, block_id: &BlockId) -> Result<Option<StateHashEntry>, KeeperError> {
        match self.store.read().get(&hash_key(block_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn check_overwrite(&self, block_id: &BlockId) -> Result<(), KeeperError> {
        if self.is_replay() {
            return Ok(());
        }
        match self.entry(block_id)? {
            Some(existing) if existing.finalized => {
                error!(
                    kind = "invariant",
                    block = %block_id,
                    "[qc-11] Refusing to overwrite finalized state hash"
                );
                Err(KeeperError::AlreadyFinalized {
                    block: block_id.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn write(&self, block_id: &BlockId, hash: StateHash, finalized: bool) -> Result<(), KeeperError> {
        if block_id.is_empty() {
            return Err(KeeperError::EmptyBlockId);
        }
        self.check_overwrite(block_id)?;
        let entry = encode(&StateHashEntry {
            ee_state: hash.as_bytes().to_vec(),
            finalized,
        })?;

        let mut ops = vec![BatchOperation::put(hash_key(block_id), entry)];
        if finalized {
            ops.push(BatchOperation::put(LAST_FINALIZED_KEY, block_id.as_bytes()));
        }
        self.store.write().atomic_batch_write(ops)?;
        Ok(())
    }

    /// Copy the parent's hash to the child. Skipped, not failed, when either id
    /// is empty, the parent is unknown, or the stored value has the wrong width.
    ///
    /// Returns whether anything was written.
    pub fn propagate(&self, parent: &BlockId, child: &BlockId) -> Result<bool, KeeperError> {
        if parent.is_empty() || child.is_empty() {
            debug!(%parent, %child, "[qc-11] Propagation skipped: empty block id");
            return Ok(false);
        }
        let Some(entry) = self.entry(parent)? else {
            debug!(%parent, "[qc-11] Propagation skipped: parent has no state hash");
            return Ok(false);
        };
        if !invariant_state_hash_width(&entry.ee_state) {
            warn!(
                %parent,
                width = entry.ee_state.len(),
                expected = STATE_HASH_LENGTH,
                "[qc-11] Propagation skipped: stored state hash has wrong width"
            );
            return Ok(false);
        }
        let hash = StateHash::from_slice(&entry.ee_state)?;
        self.write(child, hash, false)?;
        debug!(%parent, %child, state_hash = %hash, "[qc-11] Propagated state hash");
        Ok(true)
    }

    /// Move a block's hash forward after a committed deploy.
    pub fn advance(&self, block_id: &BlockId, hash: StateHash) -> Result<(), KeeperError> {
        self.write(block_id, hash, false)
    }

    /// Record the block's final hash and mark it as the latest finalized block.
    pub fn record_final(&self, block_id: &BlockId, hash: StateHash) -> Result<(), KeeperError> {
        self.write(block_id, hash, true)
    }

    pub fn lookup(&self, block_id: &BlockId) -> Result<Option<StateHash>, KeeperError> {
        match self.entry(block_id)? {
            Some(entry) => Ok(Some(StateHash::from_slice(&entry.ee_state)?)),
            None => Ok(None),
        }
    }

    pub fn is_finalized(&self, block_id: &BlockId) -> Result<bool, KeeperError> {
        Ok(self.entry(block_id)?.is_some_and(|e| e.finalized))
    }

    pub fn genesis_state_hash(&self) -> Result<Option<StateHash>, KeeperError> {
        self.lookup(&BlockId::genesis())
    }

    pub fn last_finalized(&self) -> Result<Option<BlockId>, KeeperError> {
        Ok(self.store.read().get(LAST_FINALIZED_KEY)?.map(BlockId::new))
    }

    /// Hash of the latest finalized block, falling back to genesis.
    pub fn last_finalized_state_hash(&self) -> Result<Option<StateHash>, KeeperError> {
        match self.last_finalized()? {
            Some(block_id) => self.lookup(&block_id),
            None => self.genesis_state_hash(),
        }
    }

    /// Persist everything genesis produced in one batch.
    pub fn record_genesis(
        &self,
        config: &GenesisConfig,
        hash: StateHash,
    ) -> Result<(), KeeperError> {
        let genesis = BlockId::genesis();
        self.check_overwrite(&genesis)?;
        let entry = encode(&StateHashEntry {
            ee_state: hash.as_bytes().to_vec(),
            finalized: true,
        })?;
        self.store.write().atomic_batch_write(vec![
            BatchOperation::put(hash_key(&genesis), entry),
            BatchOperation::put(GENESIS_CONF_KEY, encode(config)?),
            BatchOperation::put(CHAIN_NAME_KEY, config.name.as_bytes()),
            BatchOperation::put(LAST_FINALIZED_KEY, genesis.as_bytes()),
        ])?;
        Ok(())
    }

    pub fn genesis_config(&self) -> Result<Option<GenesisConfig>, KeeperError> {
        match self.store.read().get(GENESIS_CONF_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn chain_name(&self) -> Result<Option<String>, KeeperError> {
        match self.store.read().get(CHAIN_NAME_KEY)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| KeeperError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }
}
