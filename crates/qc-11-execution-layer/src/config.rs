//! Configuration for the Execution Layer subsystem

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the block driver decides that a queued deploy may run before the block is sealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DrainPolicy {
    /// Run the head of the queue as soon as it is the next announced position.
    ///
    /// Positions are announced per transaction via `expect_transaction`. Without
    /// an announcement the driver waits for the block to be sealed.
    #[default]
    AnnouncedContiguous,
    /// Never run anything before the block is sealed.
    SealedOnly,
}

/// Execution layer configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLayerConfig {
    /// JSON-RPC endpoint of the execution engine
    pub engine_url: String,
    /// Deadline for a single engine RPC (milliseconds)
    pub rpc_timeout_ms: u64,
    /// Deadline for a message handler waiting on its deploy (milliseconds)
    pub completion_timeout_ms: u64,
    /// Drain policy for the block driver
    pub drain_policy: DrainPolicy,
    /// Height of the first block after genesis
    pub initial_height: u64,
}

impl ExecutionLayerConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }

    /// Short deadlines for in-process tests.
    pub fn for_testing() -> Self {
        Self {
            engine_url: "http://127.0.0.1:0".to_string(),
            rpc_timeout_ms: 2_000,
            completion_timeout_ms: 5_000,
            ..Self::default()
        }
    }
}

impl Default for ExecutionLayerConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://127.0.0.1:40401".to_string(),
            rpc_timeout_ms: 30_000,
            completion_timeout_ms: 120_000,
            drain_policy: DrainPolicy::AnnouncedContiguous,
            initial_height: 1,
        }
    }
}
