//! Error types for every failure domain in the pool.
//!
//! Each domain gets its own `thiserror`-derived enum rather than a single
//! opaque error type, so callers can match on what actually went wrong.

use thiserror::Error;

/// Failure raised directly by [`crate::task_set::TaskSet`] operations and
/// surfaced through [`crate::pool::Pool`]'s public API.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("task id {0:?} already exists")]
    DuplicateId(String),

    #[error("task id {0:?} is not known to this pool")]
    UnknownId(String),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("codec operation failed: {0}")]
    Codec(#[from] CodecError),

    #[error("pool is not configured with both a codec and a store")]
    NotConfigured,

    #[error("restore cannot run while the pool is running")]
    AlreadyRunning,
}

/// Failure raised by a [`crate::codec::Codec`] implementation.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed encoded data: {0}")]
    Malformed(String),

    #[error("unknown task variant {0:?}; was it registered on this codec instance?")]
    UnknownVariant(String),
}

/// Failure raised by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no value present for key {0:?}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Outcome of a task body that did not complete successfully.
#[derive(Debug, Error, Clone)]
pub enum TaskFailure {
    #[error("task panicked: {0}")]
    Panic(String),

    #[error("task failed: {0}")]
    Reason(String),
}
