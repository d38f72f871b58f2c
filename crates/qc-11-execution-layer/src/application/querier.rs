//! Query router
//!
//! Serves read-only state queries addressed by route, with JSON request and
//! response bodies.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use tracing::debug;

use crate::domain::errors::ExecutionLayerError;
use crate::domain::value_objects::{QueryKey, StateHash};
use crate::ports::inbound::BlockLifecycleApi;

pub const QUERY_DETAIL: &str = "querydetail";
pub const QUERY_BALANCE_DETAIL: &str = "querybalancedetail";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDetailRequest {
    /// Defaults to the last finalized state
    #[serde(default)]
    pub state_hash: Option<StateHash>,
    pub key_type: String,
    pub key_data: String,
    /// Slash-separated named-key path, may be empty
    #[serde(default)]
    pub path: String,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDetailRequest {
    #[serde(default)]
    pub state_hash: Option<StateHash>,
    #[serde_as(as = "Hex")]
    pub address: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub value: String,
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn bad_request(e: serde_json::Error) -> ExecutionLayerError {
    ExecutionLayerError::InvalidMessage(format!("bad request: {e}"))
}

/// Dispatch a query on `route` with a JSON `data` body.
pub async fn handle_query(
    api: &dyn BlockLifecycleApi,
    route: &str,
    data: &[u8],
) -> Result<Vec<u8>, ExecutionLayerError> {
    debug!(route, "[qc-11] Query");
    let value = match route {
        QUERY_DETAIL => {
            let request: QueryDetailRequest = serde_json::from_slice(data).map_err(bad_request)?;
            let key = QueryKey::parse(&request.key_type, &request.key_data)?;
            let value = api
                .query(key, split_path(&request.path), request.state_hash)
                .await?;
            value.to_string()
        }
        QUERY_BALANCE_DETAIL => {
            let request: BalanceDetailRequest =
                serde_json::from_slice(data).map_err(bad_request)?;
            api.query_balance(request.address, request.state_hash)
                .await?
        }
        other => {
            return Err(ExecutionLayerError::UnrecognizedMessage(format!(
                "unknown query {other:?}"
            )))
        }
    };
    serde_json::to_vec(&QueryResponse { value })
        .map_err(|e| ExecutionLayerError::InvalidMessage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::deterministic_engine::DeterministicEngine;
    use crate::application::keeper::StateHashKeeper;
    use crate::application::service::ExecutionLayerService;
    use crate::chainspec::GenesisConfig;
    use crate::config::ExecutionLayerConfig;
    use crate::ports::outbound::InMemoryKVStore;
    use serde_json::json;
    use std::sync::Arc;

    async fn service() -> (ExecutionLayerService<InMemoryKVStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config =
            GenesisConfig::from_chain_spec(crate::chainspec::fixtures::write_chain_spec(dir.path()))
                .unwrap();
        let service = ExecutionLayerService::new(
            ExecutionLayerConfig::for_testing(),
            Arc::new(DeterministicEngine::new()),
            Arc::new(StateHashKeeper::new(InMemoryKVStore::new())),
        )
        .unwrap();
        service.init_genesis(config).await.unwrap();
        (service, dir)
    }

    fn parse(bytes: &[u8]) -> QueryResponse {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("").is_empty());
        assert_eq!(split_path("a//b/"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_balance_detail() {
        let (service, _dir) = service().await;
        let body = json!({"address": "01".repeat(32)}).to_string();
        let response = handle_query(&service, QUERY_BALANCE_DETAIL, body.as_bytes())
            .await
            .unwrap();
        assert_eq!(parse(&response).value, "500000000");
    }

    #[tokio::test]
    async fn test_query_detail_by_address() {
        let (service, _dir) = service().await;
        let body = json!({
            "key_type": "address",
            "key_data": format!("0x{}", "02".repeat(32)),
            "path": "",
        })
        .to_string();
        let response = handle_query(&service, QUERY_DETAIL, body.as_bytes())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&parse(&response).value).unwrap();
        assert_eq!(value["account"]["balance"], "1000000");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (service, _dir) = service().await;
        assert!(matches!(
            handle_query(&service, "queryvalidator", b"{}").await,
            Err(ExecutionLayerError::UnrecognizedMessage(_))
        ));
        assert!(matches!(
            handle_query(&service, QUERY_DETAIL, b"garbage").await,
            Err(ExecutionLayerError::InvalidMessage(_))
        ));
        let body = json!({"key_type": "address", "key_data": "abcd"}).to_string();
        assert!(matches!(
            handle_query(&service, QUERY_DETAIL, body.as_bytes()).await,
            Err(ExecutionLayerError::InvalidMessage(_))
        ));
    }
}
