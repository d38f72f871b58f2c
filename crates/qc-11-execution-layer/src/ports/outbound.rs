//! Outbound Ports (Driven Ports / SPI)
//!
//! What the Execution Layer needs from the outside: an execution engine and a
//! key/value store for the state hash keeper.

use async_trait::async_trait;

use crate::chainspec::GenesisConfig;
use crate::domain::deploy::{CommitSuccess, DeployPayload, DeployResult, Effects};
use crate::domain::errors::{EngineError, KVStoreError};
use crate::domain::value_objects::{ProtocolVersion, QueryKey, StateHash};

/// External execution engine.
///
/// Production: `JsonRpcEngineClient` (adapters/rpc_client.rs)
/// Testing: `DeterministicEngine` (adapters/deterministic_engine.rs)
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Create the genesis state and return its hash.
    async fn run_genesis(&self, config: &GenesisConfig) -> Result<StateHash, EngineError>;

    /// Compute the effects of `deploys` on top of `pre_state_hash` without
    /// committing anything. One result per deploy, in order.
    ///
    /// An unknown pre-state is reported as [`EngineError::MissingParent`].
    async fn execute(
        &self,
        pre_state_hash: StateHash,
        block_time: u64,
        deploys: &[DeployPayload],
        protocol_version: ProtocolVersion,
    ) -> Result<Vec<DeployResult>, EngineError>;

    /// Apply effects atomically and return the new state hash.
    async fn commit(
        &self,
        pre_state_hash: StateHash,
        effects: &Effects,
        protocol_version: ProtocolVersion,
    ) -> Result<CommitSuccess, EngineError>;

    /// Read a value under `key`, following `path` through named keys.
    async fn query(
        &self,
        state_hash: StateHash,
        key: &QueryKey,
        path: &[String],
        protocol_version: ProtocolVersion,
    ) -> Result<serde_json::Value, EngineError>;

    /// Balance of an account as a decimal string.
    async fn query_balance(
        &self,
        state_hash: StateHash,
        public_key: &[u8],
        protocol_version: ProtocolVersion,
    ) -> Result<String, EngineError>;
}

/// Abstract interface for key-value database operations.
///
/// Production: `RocksDbStore` (node-runtime/adapters/storage/rocksdb_adapter.rs)
/// Testing: `InMemoryKVStore` (below)
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Either all operations are applied or none.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// In-memory key-value store for tests and dev nodes.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: std::collections::BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
