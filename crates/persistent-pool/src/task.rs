//! The user-facing work unit.
//!
//! A [`Task`] is opaque to the pool: the pool only ever calls `id`, `kind`,
//! and `run`. `kind` exists purely so a [`crate::codec::Codec`] can pick the
//! right reconstruction logic for an otherwise type-erased task; the core
//! never interprets it itself.

use std::any::Any;
use std::panic::RefUnwindSafe;

use crate::error::TaskFailure;

/// A unit of work a [`crate::pool::Pool`] can dispatch to a worker.
///
/// Implementors should keep `id()` stable and unique within a pool for the
/// lifetime of the task — it is both the map key in the in-memory registry
/// and the durable identity used across restarts.
pub trait Task: Send + Sync + RefUnwindSafe {
    /// Stable, unique (within a pool) identity for this task.
    fn id(&self) -> &str;

    /// Stable type identifier used by codecs to select (de)serialization
    /// logic. Not interpreted by the pool itself.
    fn kind(&self) -> &str;

    /// Runs the task body to completion. `Ok(())` marks it done; `Err`
    /// marks it failed with the given reason.
    fn run(&self) -> Result<(), String>;

    /// Upcast for codec registries that need to downcast back to a concrete
    /// type to serialize it. Implementors should return `self`.
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Outcome reported by a worker after attempting to run a task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Done,
    Failed(TaskFailure),
}
