use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

use rosterdb::{Database, MemoryStore, RetryOptions, RosterConfig, Scheduler, Transactor};

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

/// A scheduler wired to a fresh in-memory store, one per test.
#[allow(dead_code)]
pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub db: Database<MemoryStore>,
    pub scheduler: Scheduler,
}

#[allow(dead_code)]
impl TestEngine {
    pub fn transactor(&self) -> Transactor<MemoryStore> {
        Transactor::Database(self.db.clone())
    }
}

#[allow(dead_code)]
pub async fn engine() -> TestEngine {
    engine_with_options(RetryOptions::default()).await
}

#[allow(dead_code)]
pub async fn engine_with_options(options: RetryOptions) -> TestEngine {
    Lazy::force(&TRACING);
    let store = Arc::new(MemoryStore::new());
    let db = Database::with_options(store.clone(), options);
    let config = RosterConfig::default();
    let scheduler = Scheduler::open(store.as_ref(), &config.namespace_path())
        .await
        .expect("open scheduling namespace");
    TestEngine {
        store,
        db,
        scheduler,
    }
}

#[allow(dead_code)]
pub fn class_list(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}
