//! # Container
//!
//! Node configuration and the container wiring the execution layer together.

pub mod config;
pub mod services;

pub use config::{ConfigError, EngineKind, NodeConfig, StorageBackend};
pub use services::{build_engine, ServiceContainer};
