//! The two coupled projections a pool's live state is built from.
//!
//! `Memory` owns every task that has been submitted and not yet finished.
//! `Queue` is the FIFO of ids still waiting to be dispatched. An id present
//! in `Memory` but absent from `Queue` is in-flight: it has been handed to
//! a worker but hasn't reported done/failed yet.
//!
//! Invariant: every id in `Queue` is a key of `Memory`. The two fields are
//! separate locks, always taken Memory-then-Queue when both are needed, so
//! that readers of just one projection never wait on the other.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::PoolError;
use crate::task::Task;

#[derive(Default)]
pub struct TaskSet {
    memory: RwLock<HashMap<String, Arc<dyn Task>>>,
    queue: RwLock<VecDeque<String>>,
}

/// A consistent read over both projections, held for the duration of an
/// encode. Holding this prevents `add`/`shift`/`done` from observing a
/// torn mid-mutation state.
pub struct SnapshotGuard<'a> {
    pub memory: RwLockReadGuard<'a, HashMap<String, Arc<dyn Task>>>,
    pub queue: RwLockReadGuard<'a, VecDeque<String>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `task` into Memory and appends its id to Queue.
    ///
    /// Fails with [`PoolError::DuplicateId`] if the id is already present;
    /// in that case neither projection is mutated.
    pub fn add(&self, task: Arc<dyn Task>) -> Result<(), PoolError> {
        let mut memory = self.memory.write();
        if memory.contains_key(task.id()) {
            return Err(PoolError::DuplicateId(task.id().to_owned()));
        }
        let id = task.id().to_owned();
        memory.insert(id.clone(), task);
        self.queue.write().push_back(id);
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.memory.read().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Task>> {
        self.memory.read().get(id).cloned()
    }

    /// Pops and returns the head of Queue, leaving the id in Memory (it
    /// becomes in-flight). Returns `None` without side effects if Queue is
    /// empty — callers never need a separate `is_idle` check first.
    pub fn shift(&self) -> Option<String> {
        self.queue.write().pop_front()
    }

    /// Removes `id` from Memory. Does not touch Queue: invariant 1
    /// guarantees an in-flight id is never present there.
    pub fn done(&self, id: &str) -> Result<(), PoolError> {
        let mut memory = self.memory.write();
        if memory.remove(id).is_none() {
            return Err(PoolError::UnknownId(id.to_owned()));
        }
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.queue.read().is_empty()
    }

    /// Pending count (Queue length), not total Memory size.
    pub fn len(&self) -> usize {
        self.queue.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_len(&self) -> usize {
        self.memory.read().len()
    }

    pub fn snapshot_guard(&self) -> SnapshotGuard<'_> {
        // Fixed order: Memory, then Queue.
        let memory = self.memory.read();
        let queue = self.queue.read();
        SnapshotGuard { memory, queue }
    }

    /// Rebuilds this TaskSet's projections from externally-provided data,
    /// e.g. after a codec decode. Replaces both Memory and Queue wholesale.
    pub fn replace(&self, memory: HashMap<String, Arc<dyn Task>>, queue: VecDeque<String>) {
        *self.memory.write() = memory;
        *self.queue.write() = queue;
    }
}
