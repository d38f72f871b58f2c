//! Adapters for the Execution Layer outbound ports
//!
//! - `JsonRpcEngineClient`: the external engine over HTTP JSON-RPC
//! - `DeterministicEngine`: in-process engine for tests and dev nodes

pub mod deterministic_engine;
pub mod rpc_client;
pub mod wire;

pub use deterministic_engine::{DeterministicEngine, EngineOp};
pub use rpc_client::JsonRpcEngineClient;
