//! Error types for the Execution Layer
//!
//! Errors are split per concern so that callers can tell a transport failure
//! (infrastructure, worth retrying) from a deploy that legitimately failed
//! (logical, recorded and moved past) and from an ordering invariant violation.

use std::time::Duration;
use thiserror::Error;

use super::candidate::CandidatePhase;
use super::value_objects::DeployKey;

/// Errors from the ordered deploy queue
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// A deploy with the same (tx_index, msg_index) was already pushed
    #[error("Duplicate deploy position: tx {tx_index}, msg {msg_index}")]
    Duplicate { tx_index: u32, msg_index: u32 },

    /// The queue was closed when the block was sealed or abandoned
    #[error("Deploy queue is closed")]
    Closed,
}

/// Errors from the candidate block state machine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("Illegal candidate transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: CandidatePhase,
        to: CandidatePhase,
    },

    /// Pushed at or behind a position the driver already consumed
    #[error("Stale deploy position {key} (driver cursor at {cursor})")]
    StalePosition { key: DeployKey, cursor: DeployKey },

    /// Pushed beyond the number of deploys announced for its transaction
    #[error("Deploy position {key} beyond announced count {count}")]
    BeyondAnnounced { key: DeployKey, count: u32 },

    #[error("Transaction {tx_index} already announced")]
    AlreadyAnnounced { tx_index: u32 },

    #[error("Transaction {tx_index} announced after the driver moved past it")]
    LateAnnouncement { tx_index: u32 },

    #[error("Pending counter underflow")]
    PendingUnderflow,

    #[error("Block still has {pending} pending deploys")]
    StillPending { pending: usize },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Errors from the key/value storage backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    #[error("I/O error: {message}")]
    IOError { message: String },

    #[error("Corrupted value under key {key}: {message}")]
    Corruption { key: String, message: String },
}

/// Errors from the state hash keeper
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeeperError {
    /// A finalized entry may only be rewritten in replay mode
    #[error("State hash for block {block} already finalized")]
    AlreadyFinalized { block: String },

    #[error("Invalid state hash width: expected {expected}, got {actual}")]
    InvalidWidth { expected: usize, actual: usize },

    #[error("Empty block id")]
    EmptyBlockId,

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors returned by an execution engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine transport error: {0}")]
    Transport(String),

    #[error("Engine call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),

    /// The engine does not know the pre-state hash it was asked to execute on
    #[error("Missing parent state {0}")]
    MissingParent(String),

    #[error("Deploy ran out of gas")]
    Gas,

    #[error("Deploy execution failed: {0}")]
    Exec(String),

    #[error("Commit rejected: {0}")]
    CommitRejected(String),

    #[error("Genesis failed: {0}")]
    GenesisFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Engine error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl EngineError {
    /// True for infrastructure failures; false for failures the engine reported
    /// about the deploy itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::MalformedResponse(_)
        )
    }
}

/// Errors from loading a chain spec or building a genesis configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainSpecError {
    #[error("Could not read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Could not parse TOML: {0}")]
    Toml(String),

    #[error("Missing chain spec key: {0}")]
    MissingKey(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid protocol version {value:?}: {reason}")]
    InvalidProtocolVersion { value: String, reason: String },

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("Malformed accounts line {line}: {message}")]
    MalformedAccounts { line: usize, message: String },
}

/// Top-level error for the Execution Layer
#[derive(Debug, Error)]
pub enum ExecutionLayerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Candidate(#[from] CandidateError),

    #[error(transparent)]
    Keeper(#[from] KeeperError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    ChainSpec(#[from] ChainSpecError),

    #[error("No block in progress")]
    NoActiveBlock,

    #[error("Block {0} already in progress")]
    BlockInProgress(String),

    #[error("No pre-state hash for block {0}")]
    MissingPreState(String),

    #[error("Unrecognized message type: {0}")]
    UnrecognizedMessage(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Deploy abandoned before execution")]
    Abandoned,

    #[error("Timed out after {0:?} waiting for deploy completion")]
    CompletionTimeout(Duration),

    #[error("Genesis has not been run")]
    GenesisMissing,

    #[error("Block driver task failed: {0}")]
    DriverFailed(String),
}

impl ExecutionLayerError {
    /// Ordering and bookkeeping violations that indicate a bug or a consensus fault.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::Queue(_) | Self::Candidate(_) | Self::Keeper(KeeperError::AlreadyFinalized { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, ExecutionLayerError>;
