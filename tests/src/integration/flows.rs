//! # Integration Test Flows
//!
//! Consensus drives a node built from `node-runtime` and `qc-11` pieces over
//! the deterministic engine.
//!
//! ## Flows Tested:
//!
//! 1. **Ordering**: deploys delivered out of order execute in `(tx, msg)` order
//! 2. **Failure isolation**: a failed commit leaves the block's state hash alone
//! 3. **Genesis**: chain spec on disk → engine request → recorded genesis hash
//! 4. **Concurrent delivery**: every transaction of a block delivered at once
//! 5. **Message failures**: invalid and timed-out messages never reach the engine

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;

    use super::super::fixtures::*;
    use qc_11_execution_layer::{
        BlockId, BlockLifecycleApi, ChainSpec, ChainSpecError, DeployKey, DeployPayload,
        DrainPolicy, EngineError, EngineOp, ExecutionLayerConfig, ExecutionLayerError,
        GenesisConfig, ProtocolVersion, RawMessage, ResultCode,
    };

    fn config() -> ExecutionLayerConfig {
        ExecutionLayerConfig::for_testing()
    }

    async fn node_with_genesis() -> (TestNode, tempfile::TempDir) {
        node_with_config(config()).await
    }

    async fn node_with_config(config: ExecutionLayerConfig) -> (TestNode, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let chain_spec = write_chain_spec(dir.path()).unwrap();
        let node = TestNode::new(config).unwrap();
        node_runtime::genesis::initialize(&node.service, &chain_spec)
            .await
            .unwrap();
        (node, dir)
    }

    // =============================================================================
    // ORDERING
    // =============================================================================

    /// Two deploys of one transaction pushed in reverse order.
    #[tokio::test]
    async fn test_reverse_push_executes_in_key_order() {
        let (node, _dir) = node_with_genesis().await;
        let genesis = node.keeper().genesis_state_hash().unwrap().unwrap();

        node.service.begin_block(header(b"B1", b"", 1)).await.unwrap();
        assert_eq!(node.service.current_pre_state_hash(), Some(genesis));

        let second = DeployPayload::from_bytes(b"deploy (0,1)".to_vec());
        let first = DeployPayload::from_bytes(b"deploy (0,0)".to_vec());
        let rx_second = node
            .service
            .submit_deploy(DeployKey::new(0, 1), second.clone())
            .unwrap();
        let rx_first = node
            .service
            .submit_deploy(DeployKey::new(0, 0), first.clone())
            .unwrap();

        let outcome = node.service.end_block().await.unwrap();
        let h1 = rx_first.await.unwrap().unwrap();
        let h2 = rx_second.await.unwrap().unwrap();

        assert_eq!(
            node.engine.executed_order(),
            vec![first.deploy_hash(), second.deploy_hash()]
        );
        assert_eq!(h1.pre_state_hash, genesis);
        assert_eq!(h2.pre_state_hash, h1.post_state_hash);
        assert_eq!(outcome.state_hash, Some(h2.post_state_hash));
        assert_eq!(
            node.keeper().lookup(&BlockId::new(b"B1".to_vec())).unwrap(),
            Some(h2.post_state_hash)
        );
        assert!(node.keeper().is_finalized(&BlockId::new(b"B1".to_vec())).unwrap());
    }

    #[tokio::test]
    async fn test_sealed_only_policy_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let chain_spec = write_chain_spec(dir.path()).unwrap();
        let node = TestNode::new(ExecutionLayerConfig {
            drain_policy: DrainPolicy::SealedOnly,
            ..config()
        })
        .unwrap();
        node_runtime::genesis::initialize(&node.service, &chain_spec)
            .await
            .unwrap();

        node.bridge.begin_block(header(b"B1", b"", 1)).await.unwrap();
        let mut receivers = Vec::new();
        for (tx, msg) in [(1, 0), (0, 2), (0, 0), (0, 1)] {
            let payload = DeployPayload::from_bytes(format!("({tx},{msg})").into_bytes());
            let rx = node
                .service
                .submit_deploy(DeployKey::new(tx, msg), payload.clone())
                .unwrap();
            receivers.push((DeployKey::new(tx, msg), payload, rx));
        }
        // Nothing runs before the block is sealed.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(node.engine.executed_order().is_empty());

        node.bridge.end_block().await.unwrap();
        receivers.sort_by_key(|(key, _, _)| *key);
        let expected: Vec<[u8; 32]> = receivers.iter().map(|(_, p, _)| p.deploy_hash()).collect();
        assert_eq!(node.engine.executed_order(), expected);
        for (_, _, rx) in receivers {
            assert!(rx.await.unwrap().is_ok());
        }
    }

    // =============================================================================
    // FAILURE ISOLATION
    // =============================================================================

    /// Execute succeeds, commit fails on the wire.
    #[tokio::test]
    async fn test_commit_transport_failure_leaves_hash_unchanged() {
        let (node, _dir) = node_with_genesis().await;
        let genesis = node.keeper().genesis_state_hash().unwrap().unwrap();
        node.engine
            .fail_nth(EngineOp::Commit, 0, EngineError::Transport("connection reset".into()));

        node.bridge.begin_block(header(b"B1", b"", 1)).await.unwrap();
        let block = BlockId::new(b"B1".to_vec());
        let before = node.keeper().lookup(&block).unwrap();
        assert_eq!(before, Some(genesis));

        let tx = node_runtime::handlers::Transaction {
            messages: vec![execute_msg("fails"), execute_msg("succeeds")],
        };
        let result = node.bridge.deliver_tx(0, &tx).await;
        assert_eq!(result.code, ResultCode::ExecutionFailed);
        assert_eq!(result.messages[0].code, ResultCode::ExecutionFailed);
        assert!(result.messages[0].log.contains("connection reset"));
        assert!(result.messages[1].is_ok());

        let outcome = node.bridge.end_block().await.unwrap();
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.summary.executed, 1);
        // The second deploy ran on the hash the first one left untouched.
        assert_eq!(node.engine.calls(EngineOp::Execute), 2);
        assert_eq!(outcome.state_hash, result.messages[1].post_state_hash);
        assert_ne!(outcome.state_hash, Some(genesis));
    }

    #[tokio::test]
    async fn test_block_with_only_failures_keeps_parent_hash() {
        let (node, _dir) = node_with_genesis().await;
        let genesis = node.keeper().genesis_state_hash().unwrap().unwrap();
        node.engine.fail_nth(EngineOp::Execute, 0, EngineError::Gas);

        let report = node
            .bridge
            .process_block(
                header(b"B1", b"", 1),
                &[node_runtime::handlers::Transaction {
                    messages: vec![execute_msg("out-of-gas")],
                }],
            )
            .await
            .unwrap();
        assert_eq!(report.txs[0].code, ResultCode::ExecutionFailed);
        assert_eq!(report.outcome.state_hash, Some(genesis));
    }

    #[tokio::test]
    async fn test_rollback_then_repropose() {
        let (node, _dir) = node_with_genesis().await;
        let genesis = node.keeper().genesis_state_hash().unwrap().unwrap();

        node.bridge.begin_block(header(b"B1", b"", 1)).await.unwrap();
        let rx = node
            .service
            .submit_deploy(DeployKey::new(3, 0), DeployPayload::from_bytes(b"late".to_vec()))
            .unwrap();
        node.bridge.rollback().await.unwrap();
        assert!(matches!(
            rx.await.unwrap(),
            Err(ExecutionLayerError::Abandoned)
        ));

        let report = node
            .bridge
            .process_block(
                header(b"B1", b"", 1),
                &[node_runtime::handlers::Transaction {
                    messages: vec![execute_msg("again")],
                }],
            )
            .await
            .unwrap();
        assert!(report.txs[0].is_ok());
        assert_eq!(report.txs[0].messages[0].post_state_hash, report.outcome.state_hash);
        assert_ne!(report.outcome.state_hash, Some(genesis));
    }

    // =============================================================================
    // GENESIS
    // =============================================================================

    #[test]
    fn test_protocol_version_parsing() {
        let version: ProtocolVersion = "1.0.0".parse().unwrap();
        assert_eq!(version, ProtocolVersion::new(1, 0, 0));
        for bad in ["1.0", "1.0.0.0", ""] {
            match bad.parse::<ProtocolVersion>() {
                Err(ChainSpecError::InvalidProtocolVersion { value, reason }) => {
                    assert_eq!(value, bad);
                    assert!(!reason.is_empty());
                }
                other => panic!("{bad:?} parsed to {other:?}"),
            }
        }
    }

    #[test]
    fn test_genesis_request_lists_accounts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let chain_spec = write_chain_spec(dir.path()).unwrap();

        let config = GenesisConfig::from_chain_spec(&chain_spec).unwrap();
        let wire = config.to_wire();
        assert_eq!(wire.name, "integration-chain");
        assert_eq!(wire.protocol_version, ProtocolVersion::new(1, 0, 0));
        assert_eq!(wire.mint_installer, b"\0asm mint".to_vec());
        assert_eq!(wire.accounts.len(), 2);
        assert_eq!(wire.accounts[0].public_key, vec![1; 32]);
        assert_eq!(wire.accounts[0].balance.value, "500000000");
        assert_eq!(wire.accounts[1].public_key, vec![2; 32]);
        assert_eq!(wire.accounts[1].balance.value, "1000000");
        assert_eq!(wire.costs.wasm.div, 16);
        assert_eq!(wire.deploy_config.max_dependencies, 10);

        let back = GenesisConfig::try_from(wire).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_chain_spec_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.toml");
        std::fs::write(&path, MANIFEST.replace("[wasm-costs]", "[costs]")).unwrap();
        assert_eq!(
            ChainSpec::load(&path),
            Err(ChainSpecError::MissingKey("wasm-costs".into()))
        );
    }

    #[tokio::test]
    async fn test_genesis_export_roundtrip() {
        let (node, _dir) = node_with_genesis().await;
        assert_eq!(node.engine.calls(EngineOp::Genesis), 1);

        let exported = node.bridge.export_genesis().await.unwrap();
        assert_eq!(exported.chain_name, "integration-chain");
        let balances: Vec<String> = exported
            .accounts
            .iter()
            .map(|a| a.balance.to_string())
            .collect();
        assert_eq!(balances, vec!["500000000", "1000000"]);

        let body = format!(r#"{{"address": "{}"}}"#, "02".repeat(32));
        let response = node
            .bridge
            .query("querybalancedetail", body.as_bytes())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["value"], "1000000");
    }

    // =============================================================================
    // CONCURRENT DELIVERY
    // =============================================================================

    /// Every transaction of the block delivered at once, as parallel
    /// validation workers would.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_delivery_runs_in_block_order() {
        let (node, _dir) = node_with_genesis().await;
        node.engine.set_latency(Duration::from_millis(2));
        let node = Arc::new(node);

        node.bridge.begin_block(header(b"B1", b"", 1)).await.unwrap();

        let txs: Vec<node_runtime::handlers::Transaction> = (0..6u32)
            .map(|tx| node_runtime::handlers::Transaction {
                messages: (0..3)
                    .map(|msg| execute_msg(&format!("tx{tx}-msg{msg}")))
                    .chain((tx % 2 == 0).then(|| transfer_msg(u64::from(tx) + 1)))
                    .collect(),
            })
            .collect();

        // Deliver the last transaction first.
        let deliveries = txs.iter().enumerate().rev().map(|(index, tx)| {
            let node = Arc::clone(&node);
            let tx = tx.clone();
            async move {
                let index = u32::try_from(index).unwrap();
                let result = tokio::spawn(async move { node.bridge.deliver_tx(index, &tx).await })
                    .await
                    .unwrap();
                (index, result)
            }
        });
        let mut results = join_all(deliveries).await;
        results.sort_by_key(|(index, _)| *index);

        let outcome = node.bridge.end_block().await.unwrap();
        assert!(results.iter().all(|(_, result)| result.is_ok()));
        assert_eq!(outcome.summary.executed, 21);

        let delivered: Vec<String> = results
            .iter()
            .flat_map(|(_, result)| result.messages.iter())
            .map(|message| deploy_hash_attr(message).unwrap())
            .collect();
        let executed: Vec<String> = node
            .engine
            .executed_order()
            .iter()
            .map(hex::encode)
            .collect();
        assert_eq!(delivered, executed);

        let last = results.last().unwrap().1.messages.last().unwrap();
        assert_eq!(last.post_state_hash, outcome.state_hash);
    }

    #[tokio::test]
    async fn test_chain_of_blocks() {
        let (node, _dir) = node_with_genesis().await;
        let mut parent: Vec<u8> = Vec::new();
        let mut hashes = Vec::new();
        for height in 1..=4u64 {
            let id = format!("B{height}").into_bytes();
            let txs: Vec<_> = (0..height)
                .map(|i| node_runtime::handlers::Transaction {
                    messages: vec![execute_msg(&format!("h{height}-{i}"))],
                })
                .collect();
            let report = node
                .bridge
                .process_block(header(&id, &parent, height), &txs)
                .await
                .unwrap();
            assert_eq!(report.outcome.summary.executed, height as u32);
            hashes.push(report.outcome.state_hash.unwrap());
            parent = id;
        }
        hashes.dedup();
        assert_eq!(hashes.len(), 4);
        assert_eq!(
            node.keeper().last_finalized().unwrap(),
            Some(BlockId::new(b"B4".to_vec()))
        );
    }

    // =============================================================================
    // MESSAGE FAILURES
    // =============================================================================

    /// An unknown and an undecodable message between two valid ones.
    #[tokio::test]
    async fn test_mixed_transaction_commits_only_valid_messages() {
        let (node, _dir) = node_with_genesis().await;
        node.bridge.begin_block(header(b"B1", b"", 1)).await.unwrap();

        let tx = node_runtime::handlers::Transaction {
            messages: vec![
                execute_msg("first"),
                RawMessage::new("executionengine/Vote", b"{}".to_vec()),
                RawMessage::new("executionengine/Execute", b"{".to_vec()),
                execute_msg("last"),
            ],
        };
        let result = tokio::time::timeout(Duration::from_secs(2), node.bridge.deliver_tx(0, &tx))
            .await
            .expect("valid messages should not wait out the completion deadline");

        let codes: Vec<ResultCode> = result.messages.iter().map(|m| m.code).collect();
        assert_eq!(
            codes,
            vec![
                ResultCode::Ok,
                ResultCode::UnknownRequest,
                ResultCode::UnknownRequest,
                ResultCode::Ok
            ]
        );
        assert!(!result.is_ok());

        let outcome = node.bridge.end_block().await.unwrap();
        assert_eq!(outcome.summary.executed, 2);
        assert_eq!(outcome.summary.failed, 0);
        assert_eq!(node.engine.calls(EngineOp::Execute), 2);
        let executed: Vec<String> = node
            .engine
            .executed_order()
            .iter()
            .map(hex::encode)
            .collect();
        let delivered: Vec<String> = [&result.messages[0], &result.messages[3]]
            .into_iter()
            .map(|message| deploy_hash_attr(message).unwrap())
            .collect();
        assert_eq!(delivered, executed);
        assert_eq!(outcome.state_hash, result.messages[3].post_state_hash);
    }

    /// The engine is slower than the completion deadline. The running deploy
    /// still reports its commit; the queued ones are withdrawn and leave the
    /// state hash alone.
    #[tokio::test]
    async fn test_slow_engine_timeout_leaves_no_partial_state() {
        let (node, _dir) = node_with_config(ExecutionLayerConfig {
            completion_timeout_ms: 60,
            ..config()
        })
        .await;
        node.engine.set_latency(Duration::from_millis(150));

        node.bridge.begin_block(header(b"B1", b"", 1)).await.unwrap();
        let tx = node_runtime::handlers::Transaction {
            messages: vec![execute_msg("slow"), execute_msg("queued-1"), execute_msg("queued-2")],
        };
        let result = node.bridge.deliver_tx(0, &tx).await;
        assert!(result.messages[0].is_ok(), "{:?}", result.messages[0]);
        assert_eq!(result.messages[1].code, ResultCode::Internal);
        assert_eq!(result.messages[2].code, ResultCode::Internal);

        let outcome = node.bridge.end_block().await.unwrap();
        assert_eq!(outcome.summary.executed, 1);
        assert_eq!(node.engine.calls(EngineOp::Execute), 1);
        assert_eq!(outcome.state_hash, result.messages[0].post_state_hash);
        assert_eq!(
            node.keeper().lookup(&BlockId::new(b"B1".to_vec())).unwrap(),
            result.messages[0].post_state_hash
        );
    }
}
