//! Core crate exports for rosterdb.
//!
//! rosterdb is a transactional class-scheduling engine layered on an ordered,
//! transactional key-value store. The store is consumed through the narrow
//! [`store::Store`] contract; on top of it sit the order-preserving tuple
//! codec, subspace partitioning, a retrying transaction runner, and the
//! scheduling service that keeps seat capacity and enrollment consistent
//! under optimistic concurrency.

pub mod config;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod subspace;
pub mod tuple;
pub mod types;

pub use config::{RetryConfig, RosterConfig};
pub use error::ScheduleError;
pub use runner::{Database, RetryOptions, Transactor};
pub use scheduler::Scheduler;
pub use store::{
    ErrorClass, KeyValue, MemoryStore, Store, StoreError, StoreTransaction, TransactionMode,
};
pub use subspace::Subspace;
pub use tuple::{Element, TupleError};
pub use types::{Key, TxnId, Value, Version};
