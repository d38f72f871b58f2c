//! # Execution Layer Benchmarks
//!
//! Coordinator overhead per block, measured against the in-process
//! deterministic engine so the engine itself costs next to nothing.
//!
//! | Flow | Measures |
//! |------|----------|
//! | `process_block` | begin → deliver every tx → end, serial delivery |
//! | `concurrent_delivery` | the same block with every tx delivered at once |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::future::join_all;
use qc_11_execution_layer::ExecutionLayerConfig;
use qc_tests::integration::fixtures::{execute_msg, header, write_chain_spec, TestNode};
use node_runtime::handlers::Transaction;
use tokio::runtime::Runtime;

fn block(tx_count: u32, msgs_per_tx: u32) -> Vec<Transaction> {
    (0..tx_count)
        .map(|tx| Transaction {
            messages: (0..msgs_per_tx)
                .map(|msg| execute_msg(&format!("bench-{tx}-{msg}")))
                .collect(),
        })
        .collect()
}

fn setup(rt: &Runtime) -> (Arc<TestNode>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let chain_spec = write_chain_spec(dir.path()).expect("chain spec");
    let node = TestNode::new(ExecutionLayerConfig::for_testing()).expect("node");
    rt.block_on(node_runtime::genesis::initialize(&node.service, &chain_spec))
        .expect("genesis");
    (Arc::new(node), dir)
}

fn bench_process_block(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("qc-11-execution-layer");
    group.measurement_time(Duration::from_secs(10));

    for tx_count in [1u32, 10, 50] {
        let txs = block(tx_count, 2);
        group.throughput(Throughput::Elements(u64::from(tx_count * 2)));

        group.bench_with_input(BenchmarkId::new("process_block", tx_count), &txs, |b, txs| {
            let (node, _dir) = setup(&rt);
            let mut height = 0u64;
            b.iter(|| {
                height += 1;
                let parent = if height == 1 {
                    Vec::new()
                } else {
                    format!("B{}", height - 1).into_bytes()
                };
                let id = format!("B{height}").into_bytes();
                let report = rt
                    .block_on(node.bridge.process_block(header(&id, &parent, height), txs))
                    .expect("block");
                black_box(report.outcome.state_hash)
            })
        });

        group.bench_with_input(
            BenchmarkId::new("concurrent_delivery", tx_count),
            &txs,
            |b, txs| {
                let (node, _dir) = setup(&rt);
                let mut height = 0u64;
                b.iter(|| {
                    height += 1;
                    let parent = if height == 1 {
                        Vec::new()
                    } else {
                        format!("B{}", height - 1).into_bytes()
                    };
                    let id = format!("B{height}").into_bytes();
                    rt.block_on(async {
                        node.bridge
                            .begin_block(header(&id, &parent, height))
                            .await
                            .expect("begin");
                        let deliveries = txs
                            .iter()
                            .zip(0u32..)
                            .map(|(tx, index)| node.bridge.deliver_tx(index, tx));
                        black_box(join_all(deliveries).await);
                        node.bridge.end_block().await.expect("end")
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_process_block);
criterion_main!(benches);
