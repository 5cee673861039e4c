use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use persistent_pool::{Pool, Task, TaskFailure};
use persistent_pool_bincode::BincodeCodec;
use persistent_pool_sled::SledStore;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Recording {
    id: String,
    sleep_ms: u64,
    #[serde(skip)]
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl Task for Recording {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> &str {
        "recording"
    }
    fn run(&self) -> Result<(), String> {
        std::thread::sleep(Duration::from_millis(self.sleep_ms));
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.id.clone());
        }
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn recording(id: &str, sleep_ms: u64, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Task> {
    Arc::new(Recording {
        id: id.to_string(),
        sleep_ms,
        log: Some(log),
    })
}

struct Panicking {
    id: String,
}

impl Task for Panicking {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> &str {
        "panicking"
    }
    fn run(&self) -> Result<(), String> {
        panic!("boom from task {}", self.id);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// S1 — all submitted tasks run and the pool goes idle after stop.
#[test]
fn s1_simple_run_records_every_task() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pool = Pool::new("s1", 100);

    for i in 0..100 {
        pool.submit(recording(&format!("t{i}"), 10, log.clone()))
            .unwrap();
    }

    let pool_for_stop = pool.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        pool_for_stop.stop();
    });
    pool.run();

    assert_eq!(log.lock().unwrap().len(), 100);
    assert!(!pool.is_running());
    assert_eq!(pool.task_count(), 0);
}

/// S2 — a bounded pool drains its queue and keeps accepting new work while running.
#[test]
fn s2_queuing_accepts_work_submitted_after_run_starts() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pool = Pool::new("s2", 5);

    for i in 0..20 {
        pool.submit(recording(&format!("t{i}"), 10, log.clone()))
            .unwrap();
    }

    let pool_clone = pool.clone();
    let log_clone = log.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(60));
        pool_clone.submit(recording("t20", 10, log_clone)).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        pool_clone.stop();
    });
    pool.run();

    assert_eq!(log.lock().unwrap().len(), 21);
}

/// S3 — never more than N tasks run concurrently for a pool of concurrency N.
#[test]
fn s3_bounded_concurrency_never_exceeded() {
    struct Tracking {
        id: String,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Task for Tracking {
        fn id(&self) -> &str {
            &self.id
        }
        fn kind(&self) -> &str {
            "tracking"
        }
        fn run(&self) -> Result<(), String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(40));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let pool = Pool::new("s3", 3);

    for i in 0..10 {
        pool.submit(Arc::new(Tracking {
            id: format!("t{i}"),
            active: active.clone(),
            peak: peak.clone(),
        }))
        .unwrap();
    }

    let pool_for_stop = pool.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(400));
        pool_for_stop.stop();
    });
    pool.run();

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.task_count(), 0);
}

/// S4 — submitting without running, then restoring into a fresh pool.
#[test]
fn s4_persistence_round_trip_across_pool_instances() {
    let dir = tempfile::tempdir().unwrap();

    let codec = BincodeCodec::new();
    codec.register::<Recording>("recording");
    let store = SledStore::open(dir.path()).unwrap();

    let first = Pool::new("foo", 25)
        .with_codec(codec)
        .with_store(store)
        .with_graceful_save(false); // eager, so submit's save is synchronous

    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        first
            .submit(recording(&format!("t{i}"), 1, log.clone()))
            .unwrap();
    }

    let codec2 = BincodeCodec::new();
    codec2.register::<Recording>("recording");
    let store2 = SledStore::open(dir.path()).unwrap();

    let second = Pool::new("foo", 25).with_codec(codec2).with_store(store2);
    second.restore().unwrap();
    assert_eq!(second.task_count(), 3);

    let pool_for_stop = second.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        pool_for_stop.stop();
    });
    second.run();

    assert_eq!(second.task_count(), 0);
}

/// S6 — duplicate ids are rejected, state unchanged after the rejection.
#[test]
fn s6_duplicate_submit_is_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pool = Pool::new("s6", 4);

    pool.submit(recording("x", 1, log.clone())).unwrap();
    let err = pool.submit(recording("x", 1, log.clone())).unwrap_err();
    assert!(matches!(err, persistent_pool::PoolError::DuplicateId(id) if id == "x"));
    assert_eq!(pool.task_count(), 1);
}

/// S7 — restore repairs an in-flight task the raw decode would have dropped.
#[test]
fn s7_restore_repairs_in_flight_survivors() {
    let dir = tempfile::tempdir().unwrap();
    let codec = BincodeCodec::new();
    codec.register::<Recording>("recording");
    let store = SledStore::open(dir.path()).unwrap();

    let ts = persistent_pool::TaskSet::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    ts.add(recording("1", 1, log.clone())).unwrap();
    ts.add(recording("2", 1, log.clone())).unwrap();
    ts.add(recording("3", 1, log.clone())).unwrap();
    ts.shift(); // "1" becomes in-flight

    let bytes = {
        use persistent_pool::Codec;
        codec.encode(&ts).unwrap()
    };
    store.write("s7", &bytes).unwrap();

    let codec2 = BincodeCodec::new();
    codec2.register::<Recording>("recording");
    let store2 = SledStore::open(dir.path()).unwrap();
    let pool = Pool::new("s7", 4).with_codec(codec2).with_store(store2);
    pool.restore().unwrap();

    assert!(pool.contains("1"));
    assert!(pool.contains("2"));
    assert!(pool.contains("3"));
    assert_eq!(pool.task_count(), 3);
}

/// S8 — rapid submits within the coalescing window collapse into one save.
#[test]
fn s8_graceful_save_coalesces_rapid_changes() {
    let dir = tempfile::tempdir().unwrap();
    let writes = Arc::new(AtomicUsize::new(0));

    struct CountingStore {
        inner: SledStore,
        writes: Arc<AtomicUsize>,
    }
    impl persistent_pool::Store for CountingStore {
        fn load(&self, name: &str) -> Result<Vec<u8>, persistent_pool::StoreError> {
            self.inner.load(name)
        }
        fn write(&self, name: &str, bytes: &[u8]) -> Result<(), persistent_pool::StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(name, bytes)
        }
    }

    let codec = BincodeCodec::new();
    codec.register::<Recording>("recording");
    let store = CountingStore {
        inner: SledStore::open(dir.path()).unwrap(),
        writes: writes.clone(),
    };

    let pool = Pool::new("s8", 4)
        .with_codec(codec)
        .with_store(store)
        .with_graceful_save(true)
        .with_min_save_interval(Duration::from_millis(50));

    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        pool.submit(recording(&format!("t{i}"), 1, log.clone()))
            .unwrap();
    }
    std::thread::sleep(Duration::from_millis(10));

    // All 5 submits happened well within the 50ms window: exactly one save
    // should have fired (the first submit, since nothing was saved before).
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    std::thread::sleep(Duration::from_millis(80));
    // The deferred save for the remaining 4 submits should have fired by now.
    assert_eq!(writes.load(Ordering::SeqCst), 2);
}

/// S9 — a panicking task body fails the task without killing its worker.
#[test]
fn s9_worker_panic_does_not_kill_the_pool() {
    let pool = Pool::new("s9", 2);
    let failures = Arc::new(Mutex::new(Vec::new()));
    let failures_clone = failures.clone();
    let pool = pool.with_on_fail(move |id, failure| {
        failures_clone
            .lock()
            .unwrap()
            .push((id.to_string(), matches!(failure, TaskFailure::Panic(_))));
    });

    pool.submit(Arc::new(Panicking { id: "boom".into() }))
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    pool.submit(recording("after", 1, log.clone())).unwrap();

    let pool_for_stop = pool.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        pool_for_stop.stop();
    });
    pool.run();

    assert_eq!(log.lock().unwrap().len(), 1);
    let recorded = failures.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "boom");
    assert!(recorded[0].1);
}
