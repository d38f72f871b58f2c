//! JSON-RPC client for the external execution engine

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

use super::wire::*;
use crate::chainspec::GenesisConfig;
use crate::domain::deploy::{CommitSuccess, DeployPayload, DeployResult, Effects};
use crate::domain::errors::EngineError;
use crate::domain::value_objects::{ProtocolVersion, QueryKey, StateHash};
use crate::ports::outbound::ExecutionEngine;

/// Execution engine reached over HTTP JSON-RPC.
pub struct JsonRpcEngineClient {
    url: String,
    client: reqwest::Client,
    request_id: AtomicU64,
}

impl JsonRpcEngineClient {
    /// `timeout` bounds every HTTP exchange, independently of any deadline the
    /// caller puts around an engine call.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<T, EngineError> {
        let id = self.next_id();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        trace!(method, id, "[qc-11] Engine request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Transport(format!("{method} timed out: {e}"))
                } else {
                    EngineError::Transport(format!("{method}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Transport(format!("{method}: HTTP {status}")));
        }

        let envelope: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(format!("{method}: {e}")))?;
        envelope.into_result(id)
    }
}

#[async_trait]
impl ExecutionEngine for JsonRpcEngineClient {
    async fn run_genesis(&self, config: &GenesisConfig) -> Result<StateHash, EngineError> {
        let response: GenesisResponse = self.call(METHOD_RUN_GENESIS, config.to_wire()).await?;
        response.into()
    }

    async fn execute(
        &self,
        pre_state_hash: StateHash,
        block_time: u64,
        deploys: &[DeployPayload],
        protocol_version: ProtocolVersion,
    ) -> Result<Vec<DeployResult>, EngineError> {
        let request = ExecuteRequest {
            parent_state_hash: pre_state_hash,
            block_time,
            deploys,
            protocol_version,
        };
        let response: ExecuteResponse = self.call(METHOD_EXECUTE, request).await?;
        response.into()
    }

    async fn commit(
        &self,
        pre_state_hash: StateHash,
        effects: &Effects,
        protocol_version: ProtocolVersion,
    ) -> Result<CommitSuccess, EngineError> {
        let request = CommitRequest {
            prestate_hash: pre_state_hash,
            effects,
            protocol_version,
        };
        let response: CommitResponse = self.call(METHOD_COMMIT, request).await?;
        response.into()
    }

    async fn query(
        &self,
        state_hash: StateHash,
        key: &QueryKey,
        path: &[String],
        protocol_version: ProtocolVersion,
    ) -> Result<serde_json::Value, EngineError> {
        let request = QueryRequest {
            state_hash,
            base_key: key,
            path,
            protocol_version,
        };
        let response: QueryResponse = self.call(METHOD_QUERY, request).await?;
        response.into()
    }

    async fn query_balance(
        &self,
        state_hash: StateHash,
        public_key: &[u8],
        protocol_version: ProtocolVersion,
    ) -> Result<String, EngineError> {
        let request = BalanceRequest {
            state_hash,
            public_key,
            protocol_version,
        };
        let response: BalanceResponse = self.call(METHOD_QUERY_BALANCE, request).await?;
        response.into()
    }
}
