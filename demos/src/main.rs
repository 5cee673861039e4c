use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use persistent_pool::{Pool, PoolConfig, Task};
use persistent_pool_bincode::BincodeCodec;
use persistent_pool_sled::SledStore;
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "persistent-pool-demo")]
struct Args {
    /// Directory the sled store keeps its data in.
    #[arg(long, default_value = "./persistent-pool-demo-data")]
    data_dir: String,

    /// Name of the pool; also the store's persisted key.
    #[arg(long, default_value = "demo")]
    pool_name: String,

    /// How many greetings to submit before running.
    #[arg(long, default_value_t = 10)]
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct Greeting {
    id: String,
    message: String,
}

impl Task for Greeting {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> &str {
        "greeting"
    }
    fn run(&self) -> Result<(), String> {
        println!("{}", self.message);
        std::thread::sleep(Duration::from_millis(10));
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn main() {
    let args = Args::parse();

    let config = PoolConfig::default();
    let level: LevelFilter = config.logging.max_level.into();
    let subscriber = tracing_subscriber::fmt().pretty().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("couldn't install the global tracing subscriber");

    let codec = BincodeCodec::new();
    codec.register::<Greeting>("greeting");

    let store = SledStore::open(&args.data_dir).expect("couldn't open sled store");

    let pool = Pool::new(args.pool_name.clone(), config.concurrency)
        .with_codec(codec)
        .with_store(store)
        .with_graceful_save(config.graceful_save)
        .with_min_save_interval(config.min_save_interval())
        .with_on_fail(|id, failure| tracing::error!(task = %id, %failure, "task failed"));

    if pool.restore().is_ok() {
        tracing::info!(pending = pool.task_count(), "resumed from a prior run");
    }

    for i in 0..args.count {
        let id = format!("greeting-{i}");
        if pool.contains(&id) {
            continue;
        }
        let _ = pool.submit(Arc::new(Greeting {
            id,
            message: format!("hello from task {i}"),
        }));
    }

    let pool_for_stop = pool.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        pool_for_stop.stop();
    });

    pool.run();
}
