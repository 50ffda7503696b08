pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Key, Value};

pub use memory::{MemoryStore, MemoryTransaction};

/// One key/value pair returned from a range read.
pub type KeyValue = (Key, Value);

/// Errors reported by store implementations.
///
/// These describe the transactional substrate only; business outcomes live in
/// [`crate::error::ScheduleError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("transaction conflicts with a concurrently committed write")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write issued on a read-only transaction")]
    ReadOnly,
    #[error("transaction handle was already committed")]
    Closed,
}

/// Retry disposition for a store error, as judged by the store itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying from a fresh transaction after the suggested wait.
    Retryable { backoff: Duration },
    /// Retrying without new information cannot change the outcome.
    Terminal,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Retryable { .. })
    }
}

/// Whether a transaction is allowed to buffer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Contract of the ordered, transactional key-value store the engine runs on.
///
/// The engine consumes this interface; it does not implement replication,
/// conflict detection, or commit protocols itself. [`MemoryStore`] is the
/// reference implementation used in tests and local runs.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Txn: StoreTransaction + Clone + Send + Sync + 'static;

    /// Begins a transaction against the current committed state.
    async fn begin(&self, mode: TransactionMode) -> Result<Self::Txn, StoreError>;

    /// Opens (or allocates) the namespace prefix for a directory path.
    ///
    /// The same path always resolves to the same prefix, and distinct paths
    /// never share one.
    async fn open_namespace(&self, path: &[&str]) -> Result<Key, StoreError>;

    /// Maps a store error to its retry disposition, with a backoff hint for
    /// retryable ones. Stores may override to tune the hints.
    fn classify(&self, err: &StoreError) -> ErrorClass {
        match err {
            StoreError::Conflict => ErrorClass::Retryable {
                backoff: Duration::from_millis(2),
            },
            StoreError::Unavailable(_) => ErrorClass::Retryable {
                backoff: Duration::from_millis(50),
            },
            StoreError::ReadOnly | StoreError::Closed => ErrorClass::Terminal,
        }
    }
}

/// A single atomic unit of reads and buffered writes.
///
/// Writes stay local to the handle until [`commit`](Self::commit); dropping a
/// handle without committing aborts it and leaves no trace in the store.
/// Handles are cheaply cloneable and clones share one underlying transaction.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Value>, StoreError>;

    /// Reads the half-open range `[begin, end)` in ascending key order.
    async fn get_range(&self, begin: &[u8], end: &[u8]) -> Result<Vec<KeyValue>, StoreError>;

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    async fn clear(&self, key: &[u8]) -> Result<(), StoreError>;

    async fn clear_range(&self, begin: &[u8], end: &[u8]) -> Result<(), StoreError>;

    /// Validates and atomically publishes the buffered writes.
    async fn commit(self) -> Result<(), StoreError>;
}
