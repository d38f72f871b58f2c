//! # Quantum-Chain Node Runtime
//!
//! Hosts the execution layer (qc-11) between consensus and an external
//! execution engine.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`QC_CONFIG` file, then `QC_*` overrides)
//! 2. Connect the execution engine
//! 3. Open the state-hash store
//! 4. Run genesis from the chain spec (if the store has none)
//! 5. Serve consensus until Ctrl+C
//!
//! ## Block Flow
//!
//! ```text
//! Consensus ──begin_block──→ ExecutionLayerService ──spawn──→ BlockDriver
//!     │                              ↑                            │
//!     └──deliver_tx──→ Handler ──submit_deploy──┘         execute │ (engine)
//!     │                                                            ↓
//!     └──end_block──────────────→ seal, drain, finalize ──→ StateHashKeeper
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use node_runtime::container::{build_engine, NodeConfig, ServiceContainer, StorageBackend};
use node_runtime::genesis;
use node_runtime::handlers::ConsensusBridge;
use qc_11_execution_layer::{ExecutionEngine, InMemoryKVStore, KeyValueStore};

/// The node runtime over one storage backend.
struct NodeRuntime<S: KeyValueStore + 'static> {
    container: ServiceContainer<S>,
    bridge: ConsensusBridge<S>,
}

impl<S: KeyValueStore + 'static> NodeRuntime<S> {
    fn new(config: NodeConfig, engine: Arc<dyn ExecutionEngine>, store: S) -> Result<Self> {
        let container = ServiceContainer::new(config, engine, store)
            .context("Failed to create execution layer service")?;
        let bridge = ConsensusBridge::new(
            Arc::clone(&container.service),
            Arc::clone(&container.handler),
        );
        Ok(Self { container, bridge })
    }

    async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Quantum-Chain Node Runtime v0.1.0");
        info!("  Execution Layer (qc-11)");
        info!("===========================================");

        genesis::initialize(&self.container.service, &self.container.config.genesis.chain_spec)
            .await?;

        let config = &self.container.config;
        info!("Engine: {:?} ({})", config.engine.kind, config.execution.engine_url);
        info!("Storage: {:?} ({:?})", config.storage.backend, config.storage.data_dir);
        info!("Drain policy: {:?}", config.execution.drain_policy);
        Ok(())
    }

    async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.bridge.shutdown().await;
        info!("Shutdown complete");
    }

    async fn run(self) -> Result<()> {
        self.start().await?;

        info!("Node is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;

        self.shutdown().await;
        Ok(())
    }
}

/// Load configuration from the optional `QC_CONFIG` file and the environment.
fn load_config() -> Result<NodeConfig> {
    let mut config = match std::env::var(node_runtime::container::config::ENV_CONFIG) {
        Ok(path) => {
            let path = PathBuf::from(path);
            info!("Loading configuration from {}", path.display());
            NodeConfig::load(&path)?
        }
        Err(_) => NodeConfig::default(),
    };
    config.apply_env(|var| std::env::var(var).ok())?;
    Ok(config)
}

#[cfg(feature = "rocksdb")]
async fn run_persistent(config: NodeConfig, engine: Arc<dyn ExecutionEngine>) -> Result<()> {
    use node_runtime::adapters::storage::{RocksDbConfig, RocksDbStore};

    let db_config = RocksDbConfig {
        path: config.storage.data_dir.join("execution_layer"),
        sync_writes: config.storage.sync_writes,
        ..RocksDbConfig::default()
    };
    info!("Opening RocksDB at {}", db_config.path.display());
    let store = RocksDbStore::open(db_config).context("Failed to open state-hash store")?;
    NodeRuntime::new(config, engine, store)?.run().await
}

#[cfg(not(feature = "rocksdb"))]
async fn run_persistent(config: NodeConfig, engine: Arc<dyn ExecutionEngine>) -> Result<()> {
    warn!("Built without RocksDB support, state hashes will not survive a restart");
    NodeRuntime::new(config, engine, InMemoryKVStore::new())?
        .run()
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = load_config()?;
    let engine = build_engine(&config).context("Failed to create execution engine client")?;

    match config.storage.backend {
        StorageBackend::RocksDb => run_persistent(config, engine).await,
        StorageBackend::Memory => {
            warn!("In-memory storage: state hashes will not survive a restart");
            NodeRuntime::new(config, engine, InMemoryKVStore::new())?
                .run()
                .await
        }
    }
}
