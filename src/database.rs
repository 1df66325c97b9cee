//! Database handle that serializes every operation through a file lock

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use bounded_file_lock::{FileLock, LockGuard};
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{Row, SqlBackend, Statement, WriteQueryResult};
use crate::config::SyncConfig;
use crate::sqlite::SqliteConnector;
use crate::transaction::SyncTransaction;
use crate::{Error, Result};

/// A SQL backend whose every access is serialized through an advisory file
/// lock shared with other processes using the same lock path.
///
/// ## Locking
///
/// - **Plain operations** take the lock, delegate to the backend, and
///   release the lock on every exit path, including errors, panics and a
///   dropped future
/// - **Transactions** take the lock in [`begin`](Self::begin) and hold it
///   until the returned [`SyncTransaction`] is committed, rolled back or
///   dropped
/// - **Waiting** is bounded by the busy timeout, and by the caller's
///   deadline for the `*_with_deadline` variants. Only the wait is bounded;
///   the delegated call runs to completion once the lock is held
///
/// The backend is private so it cannot be reached without the lock.
#[derive(Debug)]
pub struct SyncDatabase<B> {
   inner: B,
   lock: FileLock,
   busy_timeout: Duration,
}

impl SyncDatabase<SqliteConnector> {
   /// Open the SQLite database at `path` behind a lock file.
   ///
   /// The lock file defaults to `path` with `.lock` appended; see
   /// [`SyncConfig::lock_path`].
   pub async fn connect(path: impl AsRef<Path>, custom_config: Option<SyncConfig>) -> Result<Self> {
      let path = path.as_ref();
      let config = custom_config.unwrap_or_default();
      let inner = SqliteConnector::connect(path, &config).await?;
      let lock = FileLock::new(config.lock_path_for(path)).with_poll_interval(config.poll_interval);

      debug!(
         "Connected to {} (lock file {}, busy timeout {:?})",
         path.display(),
         lock.path().display(),
         config.busy_timeout
      );

      Ok(Self::new(inner, lock, config.busy_timeout))
   }

   /// Close the connection pool once no other caller holds the lock
   pub async fn close(self) -> Result<()> {
      let guard = self.acquire(None).await?;
      self.inner.close().await;
      release(guard);
      Ok(())
   }
}

impl<B: SqlBackend> SyncDatabase<B> {
   /// Wrap `inner` so every access goes through `lock`, waiting at most
   /// `busy_timeout` for it.
   pub fn new(inner: B, lock: FileLock, busy_timeout: Duration) -> Self {
      Self {
         inner,
         lock,
         busy_timeout,
      }
   }

   /// Maximum time an operation waits for the lock
   pub fn busy_timeout(&self) -> Duration {
      self.busy_timeout
   }

   /// Path of the lock file serializing this database
   pub fn lock_path(&self) -> &Path {
      self.lock.path()
   }

   /// Execute a write query (INSERT/UPDATE/DELETE/DDL)
   pub async fn execute(&self, query: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      self.locked(None, |db| db.execute(query, values)).await
   }

   /// [`execute`](Self::execute), waiting for the lock no later than `deadline`
   pub async fn execute_with_deadline(
      &self,
      deadline: Instant,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<WriteQueryResult> {
      self
         .locked(Some(deadline), |db| db.execute(query, values))
         .await
   }

   /// Execute a SELECT query, possibly returning multiple rows
   pub async fn fetch_all(&self, query: &str, values: Vec<JsonValue>) -> Result<Vec<Row>> {
      self.locked(None, |db| db.fetch_all(query, values)).await
   }

   /// [`fetch_all`](Self::fetch_all), waiting for the lock no later than `deadline`
   pub async fn fetch_all_with_deadline(
      &self,
      deadline: Instant,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<Vec<Row>> {
      self
         .locked(Some(deadline), |db| db.fetch_all(query, values))
         .await
   }

   /// Execute a SELECT query, returning its first row if any
   pub async fn fetch_one(&self, query: &str, values: Vec<JsonValue>) -> Result<Option<Row>> {
      self.locked(None, |db| db.fetch_one(query, values)).await
   }

   /// [`fetch_one`](Self::fetch_one), waiting for the lock no later than `deadline`
   pub async fn fetch_one_with_deadline(
      &self,
      deadline: Instant,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<Option<Row>> {
      self
         .locked(Some(deadline), |db| db.fetch_one(query, values))
         .await
   }

   /// Begin a transaction that holds the lock until it is finalized.
   ///
   /// Every other synchronized call against the same lock path, including
   /// another `begin`, waits for the transaction or times out.
   pub async fn begin(&self) -> Result<SyncTransaction<B::Transaction>> {
      self.begin_inner(None).await
   }

   /// [`begin`](Self::begin), waiting for the lock no later than `deadline`
   pub async fn begin_with_deadline(
      &self,
      deadline: Instant,
   ) -> Result<SyncTransaction<B::Transaction>> {
      self.begin_inner(Some(deadline)).await
   }

   /// Execute multiple write statements atomically within a transaction.
   ///
   /// This method:
   /// 1. Begins a transaction (holding the lock)
   /// 2. Executes all statements in order
   /// 3. Commits on success
   /// 4. Rolls back on the first error and returns it
   ///
   /// Returns the result of each statement execution.
   pub async fn execute_transaction(
      &self,
      statements: Vec<Statement>,
   ) -> Result<Vec<WriteQueryResult>> {
      let mut tx = self.begin().await?;

      let result = async {
         let mut results = Vec::with_capacity(statements.len());
         for statement in statements {
            results.push(tx.execute(&statement.query, statement.values).await?);
         }
         Ok::<Vec<WriteQueryResult>, Error>(results)
      }
      .await;

      match result {
         Ok(results) => {
            tx.commit().await?;
            Ok(results)
         }
         Err(e) => match tx.rollback().await {
            // Rollback succeeded, return original error
            Ok(()) => Err(e),

            // Rollback also failed, return the rollback error and the original error
            Err(rollback_err) => Err(Error::TransactionRollbackFailed {
               transaction_error: e.to_string(),
               rollback_error: rollback_err.to_string(),
            }),
         },
      }
   }

   async fn begin_inner(
      &self,
      deadline: Option<Instant>,
   ) -> Result<SyncTransaction<B::Transaction>> {
      let guard = self.acquire(deadline).await?;

      match self.inner.begin().await {
         Ok(tx) => Ok(SyncTransaction::new(tx, guard)),
         Err(err) => {
            release(guard);
            Err(err)
         }
      }
   }

   /// Run `op` against the backend while holding the lock.
   ///
   /// A panic or cancellation inside `op` drops the guard, which releases
   /// the lock as well.
   async fn locked<'a, T, F, Fut>(&'a self, deadline: Option<Instant>, op: F) -> Result<T>
   where
      F: FnOnce(&'a B) -> Fut,
      Fut: Future<Output = Result<T>>,
   {
      let guard = self.acquire(deadline).await?;
      let result = op(&self.inner).await;
      release(guard);
      result
   }
}

impl<B> SyncDatabase<B> {
   /// Take the lock, waiting until the busy timeout or `deadline`,
   /// whichever comes first.
   async fn acquire(&self, deadline: Option<Instant>) -> Result<LockGuard> {
      let busy_deadline = Instant::now().checked_add(self.busy_timeout);
      let guard = match (busy_deadline, deadline) {
         (Some(busy), Some(caller)) => self.lock.acquire_until(busy.min(caller)).await,
         (None, Some(caller)) => self.lock.acquire_until(caller).await,
         (Some(busy), None) => self.lock.acquire_until(busy).await,
         (None, None) => self.lock.acquire(self.busy_timeout).await,
      };
      guard.map_err(Error::from)
   }
}

/// Release a guard on the normal exit path. Failures are logged; the lock
/// is gone either way once the guard's file handle closes.
pub(crate) fn release(guard: LockGuard) {
   if let Err(err) = guard.release() {
      warn!("Failed to release database lock: {}", err);
   }
}
