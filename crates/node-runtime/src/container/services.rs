//! # Service Container
//!
//! Builds the engine client, the state-hash keeper and the lifecycle service
//! from a [`NodeConfig`], and holds them for the lifetime of the node.

use std::sync::Arc;
use tracing::{info, warn};

use qc_11_execution_layer::{
    DeterministicEngine, EngineError, ExecutionEngine, ExecutionLayerError, ExecutionLayerHandler,
    ExecutionLayerService, JsonRpcEngineClient, KeyValueStore, StateHashKeeper,
};

use super::config::{EngineKind, NodeConfig};

/// Create the engine adapter selected by the configuration.
pub fn build_engine(config: &NodeConfig) -> Result<Arc<dyn ExecutionEngine>, EngineError> {
    match config.engine.kind {
        EngineKind::JsonRpc => {
            info!(url = %config.execution.engine_url, "[qc-11] Using JSON-RPC execution engine");
            let client = JsonRpcEngineClient::new(
                config.execution.engine_url.clone(),
                config.execution.rpc_timeout(),
            )?;
            Ok(Arc::new(client))
        }
        EngineKind::Deterministic => {
            warn!("[qc-11] Using in-process deterministic engine (development only)");
            Ok(Arc::new(DeterministicEngine::new()))
        }
    }
}

/// Everything the node runs, wired over one store.
pub struct ServiceContainer<S: KeyValueStore + 'static> {
    pub config: NodeConfig,
    pub service: Arc<ExecutionLayerService<S>>,
    pub handler: Arc<ExecutionLayerHandler<S>>,
}

impl<S: KeyValueStore + 'static> ServiceContainer<S> {
    pub fn new(
        config: NodeConfig,
        engine: Arc<dyn ExecutionEngine>,
        store: S,
    ) -> Result<Self, ExecutionLayerError> {
        let keeper = Arc::new(StateHashKeeper::new(store));
        keeper.set_replay(config.storage.replay);
        if config.storage.replay {
            warn!("[qc-11] Replay mode: finalized state hashes may be rewritten");
        }

        let service = Arc::new(ExecutionLayerService::new(
            config.execution.clone(),
            engine,
            keeper,
        )?);
        let handler = Arc::new(ExecutionLayerHandler::new(Arc::clone(&service)));
        Ok(Self {
            config,
            service,
            handler,
        })
    }
}
