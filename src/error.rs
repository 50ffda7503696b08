use thiserror::Error;

use crate::store::StoreError;
use crate::tuple::TupleError;

/// Errors surfaced by scheduling operations.
///
/// Only [`ScheduleError::Store`] values the store classifies as transient are
/// ever retried; every other variant aborts the transaction and reaches the
/// caller unchanged.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The referenced class is not part of the current offering.
    #[error("class {0:?} is not offered")]
    ClassNotFound(String),

    /// Capacity is exhausted; retrying without a drop cannot succeed.
    #[error("no remaining seats in {0:?}")]
    NoRemainingSeats(String),

    /// The retry-count or wall-clock budget ran out; wraps the last error.
    #[error("transaction gave up after {attempts} attempts")]
    Timeout {
        attempts: u32,
        #[source]
        last: Box<ScheduleError>,
    },

    /// A key in the namespace was not produced by this codec.
    #[error("malformed key: {0}")]
    MalformedKey(#[from] TupleError),

    /// A stored record violates the data model.
    #[error("corrupted record: {0}")]
    Corrupt(String),

    /// Error reported by the underlying store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScheduleError {
    /// The store error carried by this value, if any. Retry decisions only
    /// ever look at this.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            ScheduleError::Store(err) => Some(err),
            _ => None,
        }
    }
}
