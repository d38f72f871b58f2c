//! # Storage Adapters
//!
//! Backends for the state-hash keeper.
//!
//! ## Usage
//!
//! The `rocksdb` feature (on by default) enables the RocksDB store. Without it
//! only the in-memory store is available:
//!
//! ```toml
//! node-runtime = { path = "...", default-features = false }
//! ```

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore, CF_EXECUTION_LAYER};

pub use qc_11_execution_layer::InMemoryKVStore;
