//! # QC-11: Execution Layer Subsystem
//!
//! Coordinates deploy execution between consensus and an external execution
//! engine. Deploys delivered during a block are queued by their position in the
//! block, executed strictly in that order against a running state hash, and the
//! resulting post-state hash is recorded per block so the next block can build
//! on it.
//!
//! ## Architecture
//!
//! - **Domain**: Value objects (StateHash, BlockId, DeployKey), the ordered
//!   deploy queue, the candidate block and its pending counter
//! - **ChainSpec**: Chain-spec TOML loading and genesis configuration
//! - **Ports**: Inbound (BlockLifecycleApi) and Outbound (ExecutionEngine, KeyValueStore)
//! - **Application**: State hash keeper, block driver, lifecycle service,
//!   genesis bootstrap and querier
//! - **Adapters**: JSON-RPC engine client and a deterministic in-process engine
//! - **IPC**: Message decoding and the per-message handler
//!
//! ## Block Lifecycle
//!
//! ```text
//! begin_block ──→ deliver_message* ──→ end_block
//!      │                │                  │
//!  propagate       enqueue + await     seal, wait for drain,
//!  parent hash     completion          record final hash
//! ```

pub mod adapters;
pub mod application;
pub mod chainspec;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod ports;

pub use adapters::{DeterministicEngine, EngineOp, JsonRpcEngineClient};
pub use application::genesis::{bootstrap, BootstrapError};
pub use application::keeper::StateHashKeeper;
pub use application::querier::handle_query;
pub use application::service::{
    BlockContext, BlockHeader, EndBlockOutcome, ExecutionLayerService, GenesisState,
};
pub use chainspec::{ChainSpec, GenesisAccount, GenesisConfig};
pub use config::{DrainPolicy, ExecutionLayerConfig};
pub use domain::candidate::DrainSummary;
pub use domain::deploy::{DeployOutcome, DeployPayload, ExecutionReceipt};
pub use domain::errors::*;
pub use domain::value_objects::*;
pub use ipc::{ExecutionLayerHandler, MessageResult, RawMessage, ResultCode};
pub use ports::inbound::BlockLifecycleApi;
pub use ports::outbound::{BatchOperation, ExecutionEngine, InMemoryKVStore, KeyValueStore};
