//! Ports for the Execution Layer
//!
//! - Inbound: `BlockLifecycleApi`
//! - Outbound: `ExecutionEngine`, `KeyValueStore`

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
