use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::tuple::{self, Element};
use crate::types::{Key, TxnId, Value, Version};

use super::{KeyValue, Store, StoreError, StoreTransaction, TransactionMode};

/// In-memory implementation of the [`Store`] contract with optimistic
/// conflict detection.
///
/// Committed state lives in an ordered map next to a per-key version map.
/// Transactions buffer writes locally and record the keys and ranges they
/// read; commit validates the read set against versions newer than the
/// transaction's begin snapshot and rejects with [`StoreError::Conflict`]
/// when a concurrent commit got there first.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<Committed>,
    directories: Mutex<Directories>,
}

#[derive(Debug, Default)]
struct Committed {
    data: BTreeMap<Key, Value>,
    // Versions outlive clears so that a read of a since-deleted key still
    // conflicts with the delete.
    versions: BTreeMap<Key, Version>,
    commit_version: Version,
}

#[derive(Debug, Default)]
struct Directories {
    prefixes: HashMap<String, Key>,
    next_slot: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Txn = MemoryTransaction;

    async fn begin(&self, mode: TransactionMode) -> Result<Self::Txn, StoreError> {
        let snapshot = self.inner.state.read().await.commit_version;
        Ok(MemoryTransaction {
            shared: self.inner.clone(),
            id: TxnId::new(),
            mode,
            snapshot,
            state: Arc::new(Mutex::new(TxnState::default())),
        })
    }

    async fn open_namespace(&self, path: &[&str]) -> Result<Key, StoreError> {
        let joined = path.join("/");
        let mut directories = self.inner.directories.lock().await;
        if let Some(prefix) = directories.prefixes.get(&joined) {
            return Ok(prefix.clone());
        }
        directories.next_slot += 1;
        let prefix = tuple::pack(&[Element::Int(directories.next_slot)]);
        directories.prefixes.insert(joined.clone(), prefix.clone());
        info!(path = %joined, prefix = ?prefix, "allocated namespace prefix");
        Ok(prefix)
    }
}

/// Transaction handle for [`MemoryStore`]. Clones share one buffered state.
#[derive(Debug, Clone)]
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    id: TxnId,
    mode: TransactionMode,
    snapshot: Version,
    state: Arc<Mutex<TxnState>>,
}

#[derive(Debug, Default)]
struct TxnState {
    read_keys: Vec<Key>,
    read_ranges: Vec<(Key, Key)>,
    ops: Vec<Mutation>,
    closed: bool,
}

#[derive(Debug, Clone)]
enum Mutation {
    Set(Key, Value),
    Clear(Key),
    ClearRange(Key, Key),
}

impl MemoryTransaction {
    pub fn id(&self) -> &TxnId {
        &self.id
    }

    pub fn snapshot_version(&self) -> Version {
        self.snapshot
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(StoreError::ReadOnly),
        }
    }
}

fn in_range(key: &[u8], begin: &[u8], end: &[u8]) -> bool {
    begin <= key && key < end
}

// Read-your-writes: replay this transaction's buffered mutations, in order,
// over the committed value.
fn apply_ops_to_key(ops: &[Mutation], key: &[u8], base: Option<Value>) -> Option<Value> {
    let mut current = base;
    for op in ops {
        match op {
            Mutation::Set(k, v) if k.as_slice() == key => current = Some(v.clone()),
            Mutation::Clear(k) if k.as_slice() == key => current = None,
            Mutation::ClearRange(b, e) if in_range(key, b, e) => current = None,
            _ => {}
        }
    }
    current
}

fn apply_ops_to_window(ops: &[Mutation], begin: &[u8], end: &[u8], window: &mut BTreeMap<Key, Value>) {
    for op in ops {
        match op {
            Mutation::Set(k, v) => {
                if in_range(k, begin, end) {
                    window.insert(k.clone(), v.clone());
                }
            }
            Mutation::Clear(k) => {
                window.remove(k);
            }
            Mutation::ClearRange(b, e) => {
                let doomed: Vec<Key> = window
                    .range::<[u8], _>((
                        std::ops::Bound::Included(b.as_slice()),
                        std::ops::Bound::Excluded(e.as_slice()),
                    ))
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in doomed {
                    window.remove(&key);
                }
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&self, key: &[u8]) -> Result<Option<Value>, StoreError> {
        let mut txn = self.state.lock().await;
        if txn.closed {
            return Err(StoreError::Closed);
        }
        txn.read_keys.push(key.to_vec());

        let committed = self.shared.state.read().await;
        let base = committed.data.get(key).cloned();
        Ok(apply_ops_to_key(&txn.ops, key, base))
    }

    async fn get_range(&self, begin: &[u8], end: &[u8]) -> Result<Vec<KeyValue>, StoreError> {
        let mut txn = self.state.lock().await;
        if txn.closed {
            return Err(StoreError::Closed);
        }
        txn.read_ranges.push((begin.to_vec(), end.to_vec()));

        let committed = self.shared.state.read().await;
        let mut window: BTreeMap<Key, Value> = committed
            .data
            .range::<[u8], _>((
                std::ops::Bound::Included(begin),
                std::ops::Bound::Excluded(end),
            ))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        apply_ops_to_window(&txn.ops, begin, end, &mut window);
        Ok(window.into_iter().collect())
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let mut txn = self.state.lock().await;
        if txn.closed {
            return Err(StoreError::Closed);
        }
        txn.ops.push(Mutation::Set(key.to_vec(), value.to_vec()));
        Ok(())
    }

    async fn clear(&self, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let mut txn = self.state.lock().await;
        if txn.closed {
            return Err(StoreError::Closed);
        }
        txn.ops.push(Mutation::Clear(key.to_vec()));
        Ok(())
    }

    async fn clear_range(&self, begin: &[u8], end: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let mut txn = self.state.lock().await;
        if txn.closed {
            return Err(StoreError::Closed);
        }
        txn.ops
            .push(Mutation::ClearRange(begin.to_vec(), end.to_vec()));
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let (read_keys, read_ranges, ops) = {
            let mut txn = self.state.lock().await;
            if txn.closed {
                return Err(StoreError::Closed);
            }
            txn.closed = true;
            (
                std::mem::take(&mut txn.read_keys),
                std::mem::take(&mut txn.read_ranges),
                std::mem::take(&mut txn.ops),
            )
        };

        // Transactions that wrote nothing cannot invalidate anyone.
        if ops.is_empty() {
            return Ok(());
        }

        let mut committed = self.shared.state.write().await;

        for key in &read_keys {
            if committed.versions.get(key).copied().unwrap_or(0) > self.snapshot {
                debug!(txn = %self.id, "commit rejected: point read invalidated");
                return Err(StoreError::Conflict);
            }
        }
        for (begin, end) in &read_ranges {
            let invalidated = committed
                .versions
                .range::<[u8], _>((
                    std::ops::Bound::Included(begin.as_slice()),
                    std::ops::Bound::Excluded(end.as_slice()),
                ))
                .any(|(_, version)| *version > self.snapshot);
            if invalidated {
                debug!(txn = %self.id, "commit rejected: range read invalidated");
                return Err(StoreError::Conflict);
            }
        }

        let next = committed.commit_version + 1;
        for op in ops {
            match op {
                Mutation::Set(key, value) => {
                    committed.data.insert(key.clone(), value);
                    committed.versions.insert(key, next);
                }
                Mutation::Clear(key) => {
                    committed.data.remove(&key);
                    committed.versions.insert(key, next);
                }
                Mutation::ClearRange(begin, end) => {
                    let doomed: Vec<Key> = committed
                        .data
                        .range::<[u8], _>((
                            std::ops::Bound::Included(begin.as_slice()),
                            std::ops::Bound::Excluded(end.as_slice()),
                        ))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in doomed {
                        committed.data.remove(&key);
                        committed.versions.insert(key, next);
                    }
                }
            }
        }
        committed.commit_version = next;
        debug!(txn = %self.id, version = next, "transaction committed");
        Ok(())
    }
}
