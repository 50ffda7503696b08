use std::fmt;

use uuid::Uuid;

/// Raw key bytes within the store's ordered key space.
pub type Key = Vec<u8>;
/// Raw value payload stored per key.
pub type Value = Vec<u8>;
/// Monotonic commit version used by stores for conflict validation.
pub type Version = u64;

/// Unique identifier assigned to every transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxnId(Uuid);

impl Default for TxnId {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnId {
    /// Creates a new transaction identifier using a random UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID. Useful for tests and deterministic flows.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Exposes the inner UUID for logging or correlation.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
