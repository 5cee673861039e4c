//! The orchestrator: submission, dispatch, worker lifecycle, the save
//! scheduler, and restore.
//!
//! A `Pool` is always reached through an `Arc<Pool>` — workers, the
//! deferred-save timer thread, and the dispatcher all need a handle that
//! outlives any single call into the pool, and `stop` needs well-defined
//! teardown once every worker has actually joined. Rather than leaking the
//! pool to get a `'static` reference, each pool keeps a weak handle to
//! itself (set once, right after construction) so background threads can
//! upgrade it only while the pool is still alive.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::error::{PoolError, TaskFailure};
use crate::store::Store;
use crate::task::Task;
use crate::task_set::TaskSet;
use crate::worker::Worker;

struct SaveState {
    last_saved_at: Option<Instant>,
    save_pending: bool,
}

pub struct Pool {
    name: String,
    concurrency: usize,
    task_set: TaskSet,

    codec: Mutex<Option<Box<dyn Codec>>>,
    store: Mutex<Option<Box<dyn Store>>>,
    on_done: Mutex<Option<Box<dyn Fn(&str) + Send + Sync>>>,
    on_fail: Mutex<Option<Box<dyn Fn(&str, &TaskFailure) + Send + Sync>>>,

    graceful_save: AtomicBool,
    min_save_interval_ms: AtomicU64,
    save_state: Mutex<SaveState>,

    running: RwLock<bool>,
    dispatch_lock: Mutex<()>,
    dispatch_cond: Condvar,
    close_tx: Mutex<Option<Sender<()>>>,

    self_ref: OnceCell<Weak<Pool>>,
}

impl Pool {
    pub fn new(name: impl Into<String>, concurrency: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            name: name.into(),
            concurrency: concurrency.max(1),
            task_set: TaskSet::new(),
            codec: Mutex::new(None),
            store: Mutex::new(None),
            on_done: Mutex::new(None),
            on_fail: Mutex::new(None),
            graceful_save: AtomicBool::new(true),
            min_save_interval_ms: AtomicU64::new(200),
            save_state: Mutex::new(SaveState {
                last_saved_at: None,
                save_pending: false,
            }),
            running: RwLock::new(false),
            dispatch_lock: Mutex::new(()),
            dispatch_cond: Condvar::new(),
            close_tx: Mutex::new(None),
            self_ref: OnceCell::new(),
        });
        pool.self_ref
            .set(Arc::downgrade(&pool))
            .unwrap_or_else(|_| unreachable!("self_ref is set exactly once, here"));
        pool
    }

    pub fn with_codec(self: Arc<Self>, codec: impl Codec + 'static) -> Arc<Self> {
        *self.codec.lock() = Some(Box::new(codec));
        self
    }

    pub fn with_store(self: Arc<Self>, store: impl Store + 'static) -> Arc<Self> {
        *self.store.lock() = Some(Box::new(store));
        self
    }

    pub fn with_on_done(self: Arc<Self>, f: impl Fn(&str) + Send + Sync + 'static) -> Arc<Self> {
        *self.on_done.lock() = Some(Box::new(f));
        self
    }

    pub fn with_on_fail(
        self: Arc<Self>,
        f: impl Fn(&str, &TaskFailure) + Send + Sync + 'static,
    ) -> Arc<Self> {
        *self.on_fail.lock() = Some(Box::new(f));
        self
    }

    pub fn with_graceful_save(self: Arc<Self>, graceful: bool) -> Arc<Self> {
        self.graceful_save.store(graceful, Ordering::Relaxed);
        self
    }

    pub fn with_min_save_interval(self: Arc<Self>, interval: Duration) -> Arc<Self> {
        self.min_save_interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn task_count(&self) -> usize {
        self.task_set.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.task_set.has(id)
    }

    pub fn last_saved_at(&self) -> Option<Instant> {
        self.save_state.lock().last_saved_at
    }

    pub(crate) fn task_set(&self) -> &TaskSet {
        &self.task_set
    }

    /// Adds a task and schedules a save. Failure to add is returned
    /// unchanged; a save failure afterward does not roll the add back, but
    /// is still surfaced to the caller if it happened synchronously (eager
    /// mode, or a graceful save whose interval had already elapsed).
    pub fn submit(&self, task: Arc<dyn Task>) -> Result<(), PoolError> {
        self.task_set.add(task)?;
        let save_result = self.schedule_save();
        self.wake_dispatcher();
        save_result
    }

    /// Restores Memory/Queue from the configured store+codec. Must be
    /// called before `run`. Repairs in-flight survivors that the raw codec
    /// decode alone would have dropped from the Queue.
    pub fn restore(&self) -> Result<(), PoolError> {
        if self.is_running() {
            return Err(PoolError::AlreadyRunning);
        }

        let decoded = {
            let codec_guard = self.codec.lock();
            let store_guard = self.store.lock();
            let codec = codec_guard.as_ref().ok_or(PoolError::NotConfigured)?;
            let store = store_guard.as_ref().ok_or(PoolError::NotConfigured)?;
            let bytes = store.load(&self.name)?;
            codec.decode(&bytes)?
        };

        let mut queue: VecDeque<String> = decoded.queue;
        let present: HashSet<&String> = queue.iter().collect();
        let mut missing: Vec<String> = decoded
            .memory
            .keys()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();
        missing.sort();
        queue.extend(missing);

        self.task_set.replace(decoded.memory, queue);
        info!(pool = %self.name, "restored task set from store");
        Ok(())
    }

    /// Spawns workers and runs the dispatch loop on the calling thread.
    /// Blocks until `stop` is called from another thread.
    pub fn run(self: &Arc<Self>) {
        let (queue_tx, queue_rx) = crossbeam_channel::bounded::<String>(0);
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(self.concurrency);
        *self.close_tx.lock() = Some(close_tx);
        *self.running.write() = true;

        info!(pool = %self.name, concurrency = self.concurrency, "pool starting");

        let handles: Vec<_> = (0..self.concurrency)
            .map(|id| {
                let worker = Worker::new(id, self.clone());
                let queue_rx = queue_rx.clone();
                let close_rx = close_rx.clone();
                std::thread::spawn(move || worker.run(queue_rx, close_rx))
            })
            .collect();

        self.dispatch_loop(&queue_tx);

        for handle in handles {
            let _ = handle.join();
        }

        info!(pool = %self.name, "pool stopped");
    }

    fn dispatch_loop(&self, queue_tx: &Sender<String>) {
        loop {
            if !self.is_running() {
                return;
            }

            match self.task_set.shift() {
                Some(id) => {
                    debug!(pool = %self.name, task = %id, "dispatching task");
                    if queue_tx.send(id).is_err() {
                        // No worker is listening anymore; only possible if
                        // we're racing a stop that already tore things down.
                        return;
                    }
                }
                None => {
                    let mut guard = self.dispatch_lock.lock();
                    if !self.is_running() {
                        return;
                    }
                    self.dispatch_cond
                        .wait_for(&mut guard, Duration::from_millis(50));
                }
            }
        }
    }

    fn wake_dispatcher(&self) {
        let _guard = self.dispatch_lock.lock();
        self.dispatch_cond.notify_all();
    }

    /// Signals shutdown: the dispatcher will observe `running = false` and
    /// stop sending; one close signal is sent per worker so each returns
    /// from its receive loop. Does not interrupt an in-flight task body.
    pub fn stop(&self) {
        *self.running.write() = false;
        self.wake_dispatcher();

        if let Some(tx) = self.close_tx.lock().as_ref() {
            for _ in 0..self.concurrency {
                let _ = tx.send(());
            }
        }
    }

    pub(crate) fn mark_done(&self, id: &str) {
        if let Err(e) = self.task_set.done(id) {
            warn!(pool = %self.name, task = %id, error = %e, "mark_done on unknown task id");
        }
        if let Err(e) = self.schedule_save() {
            warn!(pool = %self.name, error = %e, "save after mark_done failed");
        }

        if let Some(cb) = self.on_done.lock().as_ref() {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(id)));
        }
    }

    pub(crate) fn mark_failed(&self, id: &str, failure: TaskFailure) {
        if let Err(e) = self.task_set.done(id) {
            warn!(pool = %self.name, task = %id, error = %e, "mark_failed on unknown task id");
        }
        if let Err(e) = self.schedule_save() {
            warn!(pool = %self.name, error = %e, "save after mark_failed failed");
        }

        if let Some(cb) = self.on_fail.lock().as_ref() {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(id, &failure)));
        }
    }

    /// Runs the save scheduler for one state change. Returns the error from
    /// any save that happened *synchronously* on this call (eager mode, or
    /// a graceful save whose interval had already elapsed) so `submit` can
    /// surface it to its caller; a deferred save's outcome is instead
    /// logged when it fires, since nothing is left to report it to.
    fn schedule_save(&self) -> Result<(), PoolError> {
        if self.codec.lock().is_none() || self.store.lock().is_none() {
            return Ok(());
        }

        if !self.graceful_save.load(Ordering::Relaxed) {
            return self.save();
        }

        let interval = Duration::from_millis(self.min_save_interval_ms.load(Ordering::Relaxed));
        let mut fire_now = false;
        let mut spawn_deferred = None;

        {
            let mut state = self.save_state.lock();
            let elapsed = state.last_saved_at.map(|t| t.elapsed());
            if elapsed.map(|e| e >= interval).unwrap_or(true) {
                state.save_pending = false;
                state.last_saved_at = Some(Instant::now());
                fire_now = true;
            } else if !state.save_pending {
                state.save_pending = true;
                let remaining = interval - elapsed.unwrap();
                let weak = self
                    .self_ref
                    .get()
                    .cloned()
                    .expect("self_ref is always set by Pool::new before any Arc escapes");
                spawn_deferred = Some((weak, remaining));
            }
            // lock dropped here, before save() or the deferred thread spawn
            // below touch the TaskSet snapshot guard.
        }

        if let Some((weak, remaining)) = spawn_deferred {
            std::thread::spawn(move || {
                std::thread::sleep(remaining);
                if let Some(pool) = weak.upgrade() {
                    {
                        let mut state = pool.save_state.lock();
                        state.save_pending = false;
                        state.last_saved_at = Some(Instant::now());
                    }
                    if let Err(e) = pool.save() {
                        warn!(pool = %pool.name, error = %e, "deferred save failed");
                    }
                }
            });
        }

        if fire_now {
            return self.save();
        }

        Ok(())
    }

    fn save(&self) -> Result<(), PoolError> {
        let codec_guard = self.codec.lock();
        let store_guard = self.store.lock();
        let codec = codec_guard.as_ref().ok_or(PoolError::NotConfigured)?;
        let store = store_guard.as_ref().ok_or(PoolError::NotConfigured)?;

        let bytes = codec.encode(&self.task_set)?;
        store.write(&self.name, &bytes)?;
        Ok(())
    }
}
