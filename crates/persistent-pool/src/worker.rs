//! A single execution agent pinned to a pool.
//!
//! Each worker waits on two channels: the queue channel (one task id at a
//! time, sent by the pool's dispatcher) and the close channel (a shutdown
//! signal). It never drains the queue channel on close — whatever is still
//! in flight when `stop` is called is left for the dispatcher/pool to deal
//! with, it simply stops asking for more.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Select};
use tracing::{debug, error, warn};

use crate::pool::Pool;

pub struct Worker {
    pub id: usize,
    pool: Arc<Pool>,
}

impl Worker {
    pub fn new(id: usize, pool: Arc<Pool>) -> Self {
        Self { id, pool }
    }

    /// Runs the worker's receive loop until a close signal arrives.
    pub fn run(&self, queue_rx: Receiver<String>, close_rx: Receiver<()>) {
        debug!(worker = self.id, "worker starting");

        loop {
            let mut select = Select::new();
            let queue_idx = select.recv(&queue_rx);
            let close_idx = select.recv(&close_rx);

            let op = select.select();
            match op.index() {
                i if i == close_idx => {
                    // Consume the operation even though we're about to
                    // return, so the channel's internal bookkeeping stays
                    // consistent if close_rx is ever inspected afterward.
                    let _ = op.recv(&close_rx);
                    debug!(worker = self.id, "worker received close signal");
                    return;
                }
                i if i == queue_idx => match op.recv(&queue_rx) {
                    Ok(task_id) => self.handle(task_id),
                    Err(_) => {
                        // Sender side dropped; nothing more can arrive.
                        debug!(worker = self.id, "queue channel closed");
                        return;
                    }
                },
                _ => unreachable!("Select only registered two operations"),
            }
        }
    }

    fn handle(&self, task_id: String) {
        let Some(task) = self.pool.task_set().get(&task_id) else {
            // Benign race: the task was removed between shift and lookup.
            warn!(worker = self.id, task = %task_id, "dispatched task vanished before it could run");
            return;
        };

        debug!(worker = self.id, task = %task_id, "running task");

        let result = catch_unwind(AssertUnwindSafe(|| task.run()));

        match result {
            Ok(Ok(())) => {
                self.pool.mark_done(&task_id);
            }
            Ok(Err(reason)) => {
                error!(worker = self.id, task = %task_id, %reason, "task failed");
                self.pool.mark_failed(&task_id, crate::error::TaskFailure::Reason(reason));
            }
            Err(panic) => {
                let message = panic_message(&panic);
                error!(worker = self.id, task = %task_id, %message, "task panicked");
                self.pool.mark_failed(&task_id, crate::error::TaskFailure::Panic(message));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}
