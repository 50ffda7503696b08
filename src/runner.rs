use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::ScheduleError;
use crate::store::{ErrorClass, Store, StoreTransaction, TransactionMode};

/// Retries stop once backoff would push an attempt past this delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bounds on the retry loop of a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Maximum number of retries after the first attempt.
    pub retry_limit: u32,
    /// Wall-clock budget measured from the first attempt.
    pub timeout: Duration,
    /// Caller-supplied cutoff; the effective deadline is the earlier of this
    /// and the timeout budget.
    pub deadline: Option<Instant>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retry_limit: 100,
            timeout: Duration::from_secs(60),
            deadline: None,
        }
    }
}

/// Top-level transaction runner bound to a store connection.
///
/// `run` executes a work closure inside a fresh transaction and commits it.
/// When the store classifies a failure as transient, the closure is re-run
/// from the beginning against a new transaction (prior reads may be stale)
/// after the store-suggested backoff. Terminal errors propagate immediately.
/// Work closures must be free of side effects outside the transaction,
/// because they may run several times.
pub struct Database<S: Store> {
    store: Arc<S>,
    options: RetryOptions,
}

impl<S: Store> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            options: self.options,
        }
    }
}

impl<S: Store> Database<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, RetryOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: RetryOptions) -> Self {
        Self { store, options }
    }

    /// A copy of this runner that also stops retrying at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut copy = self.clone();
        copy.options.deadline = Some(deadline);
        copy
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Runs `work` in a read-write transaction with retries.
    pub async fn transact<T, F, Fut>(&self, work: F) -> Result<T, ScheduleError>
    where
        F: Fn(S::Txn) -> Fut,
        Fut: Future<Output = Result<T, ScheduleError>>,
    {
        self.run(TransactionMode::ReadWrite, work).await
    }

    /// Runs `work` in a read-only transaction with the same retry budget.
    pub async fn read_transact<T, F, Fut>(&self, work: F) -> Result<T, ScheduleError>
    where
        F: Fn(S::Txn) -> Fut,
        Fut: Future<Output = Result<T, ScheduleError>>,
    {
        self.run(TransactionMode::ReadOnly, work).await
    }

    pub async fn run<T, F, Fut>(&self, mode: TransactionMode, work: F) -> Result<T, ScheduleError>
    where
        F: Fn(S::Txn) -> Fut,
        Fut: Future<Output = Result<T, ScheduleError>>,
    {
        let started = Instant::now();
        let budget = started + self.options.timeout;
        let deadline = match self.options.deadline {
            Some(cutoff) => cutoff.min(budget),
            None => budget,
        };

        let mut attempts: u32 = 0;
        loop {
            let err = match self.attempt(mode, &work).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let backoff = match self.retry_class(&err) {
                ErrorClass::Retryable { backoff } => backoff,
                ErrorClass::Terminal => return Err(err),
            };

            attempts += 1;
            if attempts >= self.options.retry_limit {
                warn!(attempts, error = %err, "transaction retry limit exhausted");
                return Err(ScheduleError::Timeout {
                    attempts,
                    last: Box::new(err),
                });
            }

            let delay = scaled_backoff(backoff, attempts);
            if Instant::now() + delay >= deadline {
                warn!(attempts, error = %err, "transaction deadline exhausted");
                return Err(ScheduleError::Timeout {
                    attempts,
                    last: Box::new(err),
                });
            }

            debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying transaction"
            );
            sleep(delay).await;
        }
    }

    // Each attempt owns a fresh transaction; an error drops the handle
    // uncommitted, so nothing is held across the backoff sleep.
    async fn attempt<T, F, Fut>(&self, mode: TransactionMode, work: &F) -> Result<T, ScheduleError>
    where
        F: Fn(S::Txn) -> Fut,
        Fut: Future<Output = Result<T, ScheduleError>>,
    {
        let txn = self.store.begin(mode).await?;
        let value = work(txn.clone()).await?;
        txn.commit().await?;
        Ok(value)
    }

    fn retry_class(&self, err: &ScheduleError) -> ErrorClass {
        match err.as_store_error() {
            Some(store_err) => self.store.classify(store_err),
            None => ErrorClass::Terminal,
        }
    }
}

fn scaled_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(12);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// The "database or open transaction" capability.
///
/// Scheduling operations take a `Transactor` so callers choose the execution
/// mode: [`Transactor::Database`] begins, retries, and commits a transaction
/// per call, while [`Transactor::Transaction`] runs the work directly on an
/// already-open handle, with no retry and no commit, so several operations
/// compose into one atomic unit owned by the caller's top-level runner.
pub enum Transactor<S: Store> {
    Database(Database<S>),
    Transaction(S::Txn),
}

impl<S: Store> Clone for Transactor<S> {
    fn clone(&self) -> Self {
        match self {
            Transactor::Database(db) => Transactor::Database(db.clone()),
            Transactor::Transaction(txn) => Transactor::Transaction(txn.clone()),
        }
    }
}

impl<S: Store> From<Database<S>> for Transactor<S> {
    fn from(db: Database<S>) -> Self {
        Transactor::Database(db)
    }
}

impl<S: Store> Transactor<S> {
    /// Runs `work` under this transactor's execution mode.
    ///
    /// `mode` selects the transaction kind in the top-level case; a nested
    /// transactor keeps whatever mode its open transaction was begun with.
    pub async fn run<T, F, Fut>(&self, mode: TransactionMode, work: F) -> Result<T, ScheduleError>
    where
        F: Fn(S::Txn) -> Fut,
        Fut: Future<Output = Result<T, ScheduleError>>,
    {
        match self {
            Transactor::Database(db) => db.run(mode, work).await,
            Transactor::Transaction(txn) => work(txn.clone()).await,
        }
    }
}
