//! Bounded-concurrency execution for named, idempotently-identified work
//! units whose queue state survives process restarts.
//!
//! The pieces that matter are [`task_set::TaskSet`] (the Memory/Queue
//! invariants), the [`codec::Codec`]/[`store::Store`] contracts a caller
//! plugs in, and [`pool::Pool`], which ties submission, dispatch, and the
//! save scheduler together. See the crate's `persistent-pool-bincode`,
//! `persistent-pool-json`, and `persistent-pool-sled` siblings for
//! concrete codec/store implementations.

pub mod codec;
pub mod config;
pub mod error;
pub mod pool;
pub mod store;
pub mod task;
pub mod task_set;
mod worker;

pub use codec::{Codec, DecodedTaskSet, EncodedTask, Envelope, TaskRegistry};
pub use config::{LoggingConfig, LoggingLevel, PoolConfig};
pub use error::{CodecError, PoolError, StoreError, TaskFailure};
pub use pool::Pool;
pub use store::{namespaced_key, Store};
pub use task::{Task, TaskOutcome};
pub use task_set::TaskSet;

/// Initializes a global `tracing` subscriber from a [`LoggingConfig`]. A
/// thin convenience for binaries embedding a pool; library code never
/// calls this itself.
pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::filter::LevelFilter;

    let level: LevelFilter = logging.max_level.into();
    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("a global tracing subscriber was already set; leaving it in place");
    }
}
