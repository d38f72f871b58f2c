//! # Handlers
//!
//! Entry points through which consensus drives the execution layer.

pub mod consensus;

pub use consensus::{BlockReport, ConsensusBridge, Transaction, TxResult};
