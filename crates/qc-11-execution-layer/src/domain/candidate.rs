//! Candidate block: the per-block execution context
//!
//! Owns the deploy queue, the pending counter and the running state hash for
//! one block between `begin_block` and `end_block`.
//!
//! ## Phases
//!
//! ```text
//! Open ──→ Draining ──→ Finalizing ──→ Closed
//!   │          │             │
//!   └──────────┴─────────────┴──→ Abandoned
//! ```
//!
//! An empty block goes straight from Open to Finalizing.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Notify;

use super::deploy::DeployItem;
use super::errors::{CandidateError, QueueError};
use super::queue::DeployQueue;
use super::value_objects::{BlockId, Bond, DeployKey, ProtocolVersion, StateHash};
use crate::config::DrainPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidatePhase {
    Open,
    Draining,
    Finalizing,
    Closed,
    Abandoned,
}

impl CandidatePhase {
    fn can_transition_to(self, to: CandidatePhase) -> bool {
        use CandidatePhase::*;
        matches!(
            (self, to),
            (Open, Draining)
                | (Open, Finalizing)
                | (Draining, Finalizing)
                | (Finalizing, Closed)
                | (Open, Abandoned)
                | (Draining, Abandoned)
                | (Finalizing, Abandoned)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CandidatePhase::Closed | CandidatePhase::Abandoned)
    }
}

/// Immutable facts about the block being built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMetadata {
    pub block_id: BlockId,
    pub height: u64,
    /// Block time in seconds, used as the deploy timestamp
    pub block_time: u64,
    /// Inherited from the parent block. `None` if the parent had no recorded hash.
    pub pre_state_hash: Option<StateHash>,
    pub protocol_version: ProtocolVersion,
    pub bonds: Vec<Bond>,
}

/// Counts deploys pushed but not yet terminal.
#[derive(Default)]
pub struct PendingCounter {
    count: Mutex<usize>,
    zero: Notify,
}

impl PendingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        *self.count.lock() += n;
    }

    /// Mark one deploy terminal. More `done` than `add` is an error.
    pub fn done(&self) -> Result<(), CandidateError> {
        let mut count = self.count.lock();
        if *count == 0 {
            return Err(CandidateError::PendingUnderflow);
        }
        *count -= 1;
        if *count == 0 {
            self.zero.notify_waiters();
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Resolves once the count is zero.
    pub async fn wait_zero(&self) {
        loop {
            let notified = self.zero.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Mutable bookkeeping, guarded by one lock. The queue lock is only ever taken
/// while this one is held, never the other way round.
struct CandidateState {
    phase: CandidatePhase,
    sealed: bool,
    /// Smallest position the driver has not consumed yet
    cursor: DeployKey,
    /// Announced deploy count per transaction
    announced: BTreeMap<u32, u32>,
    /// Positions at or after the cursor that will never run
    skipped: BTreeSet<DeployKey>,
    current_state_hash: Option<StateHash>,
    bonded_validators: Option<Vec<Bond>>,
    executed: u32,
    failed: u32,
}

impl CandidateState {
    fn transition(&mut self, to: CandidatePhase) -> Result<(), CandidateError> {
        if self.phase == to {
            return Ok(());
        }
        if !self.phase.can_transition_to(to) {
            return Err(CandidateError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Move the cursor past skipped positions and past transactions whose
    /// announced deploys are all consumed.
    fn normalize_cursor(&mut self) {
        loop {
            if self.skipped.remove(&self.cursor) {
                self.cursor = self.cursor.next_in_tx();
                continue;
            }
            match self.announced.get(&self.cursor.tx_index) {
                Some(&count) if self.cursor.msg_index >= count => {
                    self.cursor = self.cursor.next_tx();
                }
                _ => break,
            }
        }
    }

    /// The position that may run before the block is sealed, if known.
    fn expected(&self, policy: DrainPolicy) -> Option<DeployKey> {
        match policy {
            DrainPolicy::SealedOnly => None,
            DrainPolicy::AnnouncedContiguous => self
                .announced
                .contains_key(&self.cursor.tx_index)
                .then_some(self.cursor),
        }
    }
}

/// What the driver should do next.
pub enum NextDeploy {
    Run(DeployItem),
    /// Nothing can run yet; wait for a push, an announcement or the seal
    Wait,
    /// The block is sealed and empty, or was abandoned
    Exhausted,
}

/// Summary handed back when the block closes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub executed: u32,
    pub failed: u32,
}

pub struct CandidateBlock {
    meta: BlockMetadata,
    policy: DrainPolicy,
    queue: DeployQueue,
    pending: PendingCounter,
    ready: Notify,
    state: Mutex<CandidateState>,
}

impl CandidateBlock {
    pub fn new(meta: BlockMetadata, policy: DrainPolicy) -> Self {
        let state = CandidateState {
            phase: CandidatePhase::Open,
            sealed: false,
            cursor: DeployKey::default(),
            announced: BTreeMap::new(),
            skipped: BTreeSet::new(),
            current_state_hash: meta.pre_state_hash,
            bonded_validators: None,
            executed: 0,
            failed: 0,
        };
        Self {
            meta,
            policy,
            queue: DeployQueue::new(),
            pending: PendingCounter::new(),
            ready: Notify::new(),
            state: Mutex::new(state),
        }
    }

    pub fn meta(&self) -> &BlockMetadata {
        &self.meta
    }

    pub fn block_id(&self) -> &BlockId {
        &self.meta.block_id
    }

    pub fn phase(&self) -> CandidatePhase {
        self.state.lock().phase
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed
    }

    pub fn pending(&self) -> usize {
        self.pending.count()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Running state hash: the pre-state hash advanced by every committed deploy.
    pub fn current_state_hash(&self) -> Option<StateHash> {
        self.state.lock().current_state_hash
    }

    /// Bonded validators reported by the most recent commit in this block.
    pub fn bonded_validators(&self) -> Option<Vec<Bond>> {
        self.state.lock().bonded_validators.clone()
    }

    /// Declare how many deploys transaction `tx_index` carries, letting the
    /// driver run them before the block is sealed.
    pub fn expect_transaction(&self, tx_index: u32, deploy_count: u32) -> Result<(), CandidateError> {
        {
            let mut state = self.state.lock();
            if state.sealed || state.phase.is_terminal() {
                return Err(QueueError::Closed.into());
            }
            if tx_index < state.cursor.tx_index {
                return Err(CandidateError::LateAnnouncement { tx_index });
            }
            if state.announced.contains_key(&tx_index) {
                return Err(CandidateError::AlreadyAnnounced { tx_index });
            }
            state.announced.insert(tx_index, deploy_count);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Queue a deploy and count it as pending.
    pub fn enqueue(&self, item: DeployItem) -> Result<(), CandidateError> {
        let key = item.key();
        {
            let state = self.state.lock();
            if state.sealed || state.phase.is_terminal() {
                return Err(QueueError::Closed.into());
            }
            if key < state.cursor {
                return Err(CandidateError::StalePosition {
                    key,
                    cursor: state.cursor,
                });
            }
            if let Some(&count) = state.announced.get(&key.tx_index) {
                if key.msg_index >= count {
                    return Err(CandidateError::BeyondAnnounced { key, count });
                }
            }
            self.queue.push(item)?;
            self.pending.add(1);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Consume a position that will never carry a deploy, so later positions
    /// of the same transaction do not wait for it.
    pub fn skip(&self, key: DeployKey) -> Result<(), CandidateError> {
        {
            let mut state = self.state.lock();
            if state.phase.is_terminal() {
                return Err(QueueError::Closed.into());
            }
            if key < state.cursor {
                return Err(CandidateError::StalePosition {
                    key,
                    cursor: state.cursor,
                });
            }
            self.queue.reserve(key)?;
            state.skipped.insert(key);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Withdraw a deploy that has not started running. Returns `false` if it
    /// is no longer queued, in which case its outcome is still delivered.
    pub fn cancel(&self, key: DeployKey) -> Result<bool, CandidateError> {
        let cancelled = {
            let mut state = self.state.lock();
            match self.queue.remove(key) {
                Some(_item) => {
                    state.skipped.insert(key);
                    self.pending.done()?;
                    true
                }
                None => false,
            }
        };
        if cancelled {
            self.ready.notify_one();
        }
        Ok(cancelled)
    }

    /// Refuse further pushes. Everything already queued becomes runnable.
    pub fn seal(&self) {
        {
            let mut state = self.state.lock();
            state.sealed = true;
            self.queue.close();
        }
        self.ready.notify_one();
    }

    /// Non-blocking step of the driver loop.
    pub fn try_next(&self) -> NextDeploy {
        let mut state = self.state.lock();
        if matches!(
            state.phase,
            CandidatePhase::Abandoned | CandidatePhase::Closed | CandidatePhase::Finalizing
        ) {
            return NextDeploy::Exhausted;
        }
        state.normalize_cursor();

        let item = if state.sealed {
            self.queue.pop()
        } else {
            match state.expected(self.policy) {
                Some(expected) => self.queue.pop_if(|head| head == expected),
                None => None,
            }
        };

        match item {
            Some(item) => {
                if state.phase == CandidatePhase::Open {
                    state.phase = CandidatePhase::Draining;
                }
                state.cursor = item.key().next_in_tx();
                NextDeploy::Run(item)
            }
            None if state.sealed => NextDeploy::Exhausted,
            None => NextDeploy::Wait,
        }
    }

    /// Next deploy to run, waiting until one is runnable. `None` once the block
    /// is sealed and empty or has been abandoned.
    pub async fn next_deploy(&self) -> Option<DeployItem> {
        loop {
            let notified = self.ready.notified();
            match self.try_next() {
                NextDeploy::Run(item) => return Some(item),
                NextDeploy::Exhausted => return None,
                NextDeploy::Wait => notified.await,
            }
        }
    }

    /// Advance the running state hash after a committed deploy.
    pub fn record_success(&self, post_state_hash: StateHash, bonded_validators: Vec<Bond>) {
        let mut state = self.state.lock();
        state.current_state_hash = Some(post_state_hash);
        state.bonded_validators = Some(bonded_validators);
        state.executed += 1;
    }

    pub fn record_failure(&self) {
        self.state.lock().failed += 1;
    }

    /// Mark one deploy terminal.
    pub fn mark_processed(&self) -> Result<(), CandidateError> {
        self.pending.done()
    }

    pub async fn wait_all_processed(&self) {
        self.pending.wait_zero().await
    }

    /// Enter Finalizing. Requires the block to be sealed and fully drained.
    pub fn finalize(&self) -> Result<Option<StateHash>, CandidateError> {
        let mut state = self.state.lock();
        let pending = self.pending.count();
        if pending > 0 || !self.queue.is_empty() {
            return Err(CandidateError::StillPending {
                pending: pending.max(self.queue.len()),
            });
        }
        if !state.sealed {
            return Err(CandidateError::IllegalTransition {
                from: state.phase,
                to: CandidatePhase::Finalizing,
            });
        }
        state.transition(CandidatePhase::Finalizing)?;
        Ok(state.current_state_hash)
    }

    pub fn close(&self) -> Result<DrainSummary, CandidateError> {
        let mut state = self.state.lock();
        state.transition(CandidatePhase::Closed)?;
        Ok(DrainSummary {
            executed: state.executed,
            failed: state.failed,
        })
    }

    /// Abandon the block. Returns the deploys that never ran so the caller can
    /// fail them.
    pub fn abandon(&self) -> Result<Vec<DeployItem>, CandidateError> {
        let items = {
            let mut state = self.state.lock();
            state.transition(CandidatePhase::Abandoned)?;
            state.sealed = true;
            self.queue.close();
            self.queue.drain_sorted()
        };
        self.ready.notify_one();
        Ok(items)
    }
}
