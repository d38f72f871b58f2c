//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Modules
//!
//! - `container/` - Configuration and service wiring
//! - `adapters/` - Storage backends for the state-hash keeper
//! - `genesis/` - First-start genesis bootstrap
//! - `handlers/` - Consensus-facing block lifecycle

pub mod adapters;
pub mod container;
pub mod genesis;
pub mod handlers;

pub use container::{NodeConfig, ServiceContainer};
pub use handlers::{ConsensusBridge, Transaction, TxResult};
