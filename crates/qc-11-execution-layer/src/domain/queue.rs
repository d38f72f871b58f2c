//! Ordered deploy queue
//!
//! Deploys arrive in arbitrary order from concurrent message handlers and leave
//! in ascending [`DeployKey`] order. The lock is held only for the heap
//! mutation itself.

use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use super::deploy::DeployItem;
use super::errors::QueueError;
use super::value_objects::DeployKey;

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<Reverse<DeployItem>>,
    /// Every key ever accepted in this block, popped or not.
    seen: HashSet<DeployKey>,
    closed: bool,
}

/// Min-priority queue of deploys keyed by (tx_index, msg_index).
#[derive(Default)]
pub struct DeployQueue {
    inner: Mutex<QueueInner>,
}

impl DeployQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a deploy. Duplicate keys and pushes after `close` are rejected
    /// and leave the queue untouched.
    pub fn push(&self, item: DeployItem) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed);
        }
        let key = item.key();
        if !inner.seen.insert(key) {
            return Err(QueueError::Duplicate {
                tx_index: key.tx_index,
                msg_index: key.msg_index,
            });
        }
        inner.heap.push(Reverse(item));
        Ok(())
    }

    /// Claim `key` without queueing anything, so no deploy can take it later.
    pub fn reserve(&self, key: DeployKey) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if !inner.seen.insert(key) {
            return Err(QueueError::Duplicate {
                tx_index: key.tx_index,
                msg_index: key.msg_index,
            });
        }
        Ok(())
    }

    /// Take the deploy at `key` out of the queue. The key stays reserved.
    pub fn remove(&self, key: DeployKey) -> Option<DeployItem> {
        let mut inner = self.inner.lock();
        let (mut removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.heap)
            .into_vec()
            .into_iter()
            .partition(|Reverse(item)| item.key() == key);
        inner.heap = BinaryHeap::from(kept);
        removed.pop().map(|Reverse(item)| item)
    }

    /// Remove and return the smallest-keyed deploy.
    pub fn pop(&self) -> Option<DeployItem> {
        self.inner.lock().heap.pop().map(|Reverse(item)| item)
    }

    /// Pop the head only if `accept` approves its key. Check and removal happen
    /// under one lock acquisition.
    pub fn pop_if(&self, accept: impl FnOnce(DeployKey) -> bool) -> Option<DeployItem> {
        let mut inner = self.inner.lock();
        let head = inner.heap.peek().map(|Reverse(item)| item.key())?;
        if accept(head) {
            inner.heap.pop().map(|Reverse(item)| item)
        } else {
            None
        }
    }

    /// Key of the smallest deploy, without removing it.
    pub fn peek_key(&self) -> Option<DeployKey> {
        self.inner.lock().heap.peek().map(|Reverse(item)| item.key())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Refuse further pushes. Items already queued stay poppable.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Remove everything, in ascending key order.
    pub fn drain_sorted(&self) -> Vec<DeployItem> {
        let heap = std::mem::take(&mut self.inner.lock().heap);
        heap.into_sorted_vec()
            .into_iter()
            .rev()
            .map(|Reverse(item)| item)
            .collect()
    }
}
