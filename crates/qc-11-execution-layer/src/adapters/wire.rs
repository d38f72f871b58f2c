//! JSON-RPC wire types for the execution engine
//!
//! Requests carry hex-encoded bytes. Responses are tagged result variants that
//! are folded into `Result<_, EngineError>` here, so callers never see a
//! non-success variant.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::domain::deploy::{CommitSuccess, DeployPayload, DeployResult, Effects};
use crate::domain::errors::EngineError;
use crate::domain::value_objects::{Bond, ProtocolVersion, QueryKey, StateHash};

pub const METHOD_RUN_GENESIS: &str = "ee_runGenesis";
pub const METHOD_EXECUTE: &str = "ee_execute";
pub const METHOD_COMMIT: &str = "ee_commit";
pub const METHOD_QUERY: &str = "ee_query";
pub const METHOD_QUERY_BALANCE: &str = "ee_queryBalance";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: P,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl<T> JsonRpcResponse<T> {
    /// Unwrap the envelope, checking it answers request `id`.
    pub fn into_result(self, id: u64) -> Result<T, EngineError> {
        if self.id != id {
            return Err(EngineError::MalformedResponse(format!(
                "response id {} does not match request id {}",
                self.id, id
            )));
        }
        if let Some(error) = self.error {
            return Err(EngineError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| EngineError::MalformedResponse("empty result".into()))
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ExecuteRequest<'a> {
    pub parent_state_hash: StateHash,
    pub block_time: u64,
    pub deploys: &'a [DeployPayload],
    pub protocol_version: ProtocolVersion,
}

#[derive(Debug, Serialize)]
pub struct CommitRequest<'a> {
    pub prestate_hash: StateHash,
    pub effects: &'a Effects,
    pub protocol_version: ProtocolVersion,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub state_hash: StateHash,
    pub base_key: &'a QueryKey,
    pub path: &'a [String],
    pub protocol_version: ProtocolVersion,
}

#[serde_as]
#[derive(Debug, Serialize)]
pub struct BalanceRequest<'a> {
    pub state_hash: StateHash,
    #[serde_as(as = "Hex")]
    pub public_key: &'a [u8],
    pub protocol_version: ProtocolVersion,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenesisResponse {
    Success { poststate_hash: StateHash },
    FailedDeploy { message: String },
}

impl From<GenesisResponse> for Result<StateHash, EngineError> {
    fn from(response: GenesisResponse) -> Self {
        match response {
            GenesisResponse::Success { poststate_hash } => Ok(poststate_hash),
            GenesisResponse::FailedDeploy { message } => Err(EngineError::GenesisFailed(message)),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteResponse {
    Success {
        deploy_results: Vec<DeployResult>,
    },
    MissingParent {
        #[serde_as(as = "Hex")]
        hash: Vec<u8>,
    },
}

impl From<ExecuteResponse> for Result<Vec<DeployResult>, EngineError> {
    fn from(response: ExecuteResponse) -> Self {
        match response {
            ExecuteResponse::Success { deploy_results } => Ok(deploy_results),
            ExecuteResponse::MissingParent { hash } => {
                Err(EngineError::MissingParent(hex::encode(hash)))
            }
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitResponse {
    Success {
        poststate_hash: StateHash,
        #[serde(default)]
        bonded_validators: Vec<Bond>,
    },
    MissingPrestate {
        #[serde_as(as = "Hex")]
        hash: Vec<u8>,
    },
    KeyNotFound {
        #[serde_as(as = "Hex")]
        key: Vec<u8>,
    },
    TypeMismatch {
        expected: String,
        found: String,
    },
    FailedTransform {
        message: String,
    },
}

impl From<CommitResponse> for Result<CommitSuccess, EngineError> {
    fn from(response: CommitResponse) -> Self {
        match response {
            CommitResponse::Success {
                poststate_hash,
                bonded_validators,
            } => Ok(CommitSuccess {
                post_state_hash: poststate_hash,
                bonded_validators,
            }),
            CommitResponse::MissingPrestate { hash } => Err(EngineError::CommitRejected(format!(
                "missing prestate {}",
                hex::encode(hash)
            ))),
            CommitResponse::KeyNotFound { key } => Err(EngineError::CommitRejected(format!(
                "key not found {}",
                hex::encode(key)
            ))),
            CommitResponse::TypeMismatch { expected, found } => Err(EngineError::CommitRejected(
                format!("type mismatch: expected {expected}, found {found}"),
            )),
            CommitResponse::FailedTransform { message } => Err(EngineError::CommitRejected(
                format!("failed transform: {message}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    Success { value: serde_json::Value },
    Failure { message: String },
}

impl From<QueryResponse> for Result<serde_json::Value, EngineError> {
    fn from(response: QueryResponse) -> Self {
        match response {
            QueryResponse::Success { value } => Ok(value),
            QueryResponse::Failure { message } => Err(EngineError::QueryFailed(message)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceResponse {
    Success { balance: String },
    Failure { message: String },
}

impl From<BalanceResponse> for Result<String, EngineError> {
    fn from(response: BalanceResponse) -> Self {
        match response {
            BalanceResponse::Success { balance } => Ok(balance),
            BalanceResponse::Failure { message } => Err(EngineError::QueryFailed(message)),
        }
    }
}
