//! Deploys and their execution results
//!
//! A [`DeployItem`] is one deploy waiting in a block's queue. It owns the
//! one-shot completion channel the message handler is waiting on.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use tokio::sync::oneshot;

use super::errors::{EngineError, ExecutionLayerError};
use super::value_objects::{DeployKey, StateHash};

/// Where the code of a session or payment program comes from.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractCode {
    /// Raw wasm module
    Wasm(#[serde_as(as = "Hex")] Vec<u8>),
    /// Contract stored under a hash
    Hash(#[serde_as(as = "Hex")] Vec<u8>),
    /// Contract stored under a named key of the deploying account
    Name(String),
    /// Contract stored under an unforgeable reference
    Uref(#[serde_as(as = "Hex")] Vec<u8>),
}

/// Code plus serialized arguments.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub code: ContractCode,
    #[serde_as(as = "Hex")]
    pub args: Vec<u8>,
}

/// Everything the engine needs to run one deploy.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployDescriptor {
    #[serde_as(as = "Hex")]
    pub account: Vec<u8>,
    pub timestamp: u64,
    pub gas_price: u64,
    pub chain_name: String,
    pub session: Program,
    pub payment: Program,
}

/// Serialized deploy, opaque to everything except the engine.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeployPayload(#[serde_as(as = "Hex")] Vec<u8>);

impl DeployPayload {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Canonical encoding of a descriptor. Identical descriptors always encode
    /// to identical bytes.
    pub fn encode(descriptor: &DeployDescriptor) -> Result<Self, ExecutionLayerError> {
        serde_json::to_vec(descriptor)
            .map(Self)
            .map_err(|e| ExecutionLayerError::InvalidMessage(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// SHA-256 of the payload bytes.
    pub fn deploy_hash(&self) -> [u8; 32] {
        Sha256::digest(&self.0).into()
    }
}

impl std::fmt::Debug for DeployPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeployPayload({} bytes)", self.0.len())
    }
}

/// One write performed by a deploy, keyed by global-state key.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformEntry {
    #[serde_as(as = "Hex")]
    pub key: Vec<u8>,
    pub transform: serde_json::Value,
}

/// The state changes a deploy would make, not yet committed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    pub transforms: Vec<TransformEntry>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Why the engine refused a deploy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeployError {
    Gas,
    Exec { message: String },
}

impl From<DeployError> for EngineError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Gas => EngineError::Gas,
            DeployError::Exec { message } => EngineError::Exec(message),
        }
    }
}

/// Engine result for one deploy of an Execute call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub effects: Effects,
    pub cost: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeployError>,
}

/// What a successful commit reports back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitSuccess {
    pub post_state_hash: StateHash,
    pub bonded_validators: Vec<super::value_objects::Bond>,
}

/// A deploy that executed and committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub key: DeployKey,
    pub deploy_hash: [u8; 32],
    pub pre_state_hash: StateHash,
    pub post_state_hash: StateHash,
    pub cost: u64,
}

/// Terminal outcome delivered to the waiting message handler.
pub type DeployOutcome = Result<ExecutionReceipt, ExecutionLayerError>;

/// A deploy waiting in the block queue.
pub struct DeployItem {
    key: DeployKey,
    payload: DeployPayload,
    completion: oneshot::Sender<DeployOutcome>,
}

impl DeployItem {
    /// Build an item and the receiver its submitter waits on.
    pub fn new(key: DeployKey, payload: DeployPayload) -> (Self, oneshot::Receiver<DeployOutcome>) {
        let (completion, rx) = oneshot::channel();
        (
            Self {
                key,
                payload,
                completion,
            },
            rx,
        )
    }

    pub fn key(&self) -> DeployKey {
        self.key
    }

    pub fn payload(&self) -> &DeployPayload {
        &self.payload
    }

    /// Deliver the terminal outcome. Returns false if nobody is listening anymore.
    pub fn complete(self, outcome: DeployOutcome) -> bool {
        self.completion.send(outcome).is_ok()
    }
}

impl std::fmt::Debug for DeployItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployItem")
            .field("key", &self.key)
            .field("payload", &self.payload)
            .finish()
    }
}

impl PartialEq for DeployItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DeployItem {}

impl PartialOrd for DeployItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeployItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}
