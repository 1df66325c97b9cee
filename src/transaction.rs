//! Transactions that keep the database lock until they are finalized

use bounded_file_lock::LockGuard;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::{Row, SqlTransaction, WriteQueryResult};
use crate::database::release;
use crate::{Error, Result};

/// A transaction started by [`SyncDatabase::begin`](crate::SyncDatabase::begin).
///
/// The database lock is held from `begin` until exactly one of
/// [`commit`](Self::commit) or [`rollback`](Self::rollback) completes, so no
/// other synchronized caller can run statements in between. Finalizing
/// releases the lock even if the commit or rollback itself fails. After that
/// every call returns [`Error::TransactionAlreadyFinalized`].
///
/// Dropping an unfinalized transaction rolls it back, then releases the lock.
#[must_use = "if unused, the transaction is immediately rolled back"]
pub struct SyncTransaction<T: SqlTransaction> {
   id: Uuid,
   active: Option<Active<T>>,
}

/// Field order matters: the transaction drops (and rolls back) before the
/// lock is released.
struct Active<T> {
   tx: T,
   guard: LockGuard,
}

impl<T: SqlTransaction> SyncTransaction<T> {
   pub(crate) fn new(tx: T, guard: LockGuard) -> Self {
      let id = Uuid::new_v4();
      debug!("Transaction {} began under lock {}", id, guard.path().display());
      Self {
         id,
         active: Some(Active { tx, guard }),
      }
   }

   /// Identifier used for this transaction in log output
   pub fn id(&self) -> Uuid {
      self.id
   }

   /// Whether commit or rollback has already been called
   pub fn is_finalized(&self) -> bool {
      self.active.is_none()
   }

   /// Execute a statement inside this transaction
   pub async fn execute(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> Result<WriteQueryResult> {
      self.tx()?.execute(query, values).await
   }

   /// Execute a query inside this transaction, returning every row
   pub async fn fetch_all(&mut self, query: &str, values: Vec<JsonValue>) -> Result<Vec<Row>> {
      self.tx()?.fetch_all(query, values).await
   }

   /// Execute a query inside this transaction, returning its first row
   pub async fn fetch_one(&mut self, query: &str, values: Vec<JsonValue>) -> Result<Option<Row>> {
      self.tx()?.fetch_one(query, values).await
   }

   /// Commit this transaction and release the lock
   pub async fn commit(&mut self) -> Result<()> {
      let Active { tx, guard } = self.finalize()?;
      let result = tx.commit().await;
      debug!("Transaction {} commit finished: ok={}", self.id, result.is_ok());
      release(guard);
      result
   }

   /// Rollback this transaction and release the lock
   pub async fn rollback(&mut self) -> Result<()> {
      let Active { tx, guard } = self.finalize()?;
      let result = tx.rollback().await;
      debug!("Transaction {} rollback finished: ok={}", self.id, result.is_ok());
      release(guard);
      result
   }

   fn tx(&mut self) -> Result<&mut T> {
      self
         .active
         .as_mut()
         .map(|active| &mut active.tx)
         .ok_or(Error::TransactionAlreadyFinalized)
   }

   fn finalize(&mut self) -> Result<Active<T>> {
      self.active.take().ok_or(Error::TransactionAlreadyFinalized)
   }
}

impl<T: SqlTransaction> Drop for SyncTransaction<T> {
   fn drop(&mut self) {
      if let Some(active) = self.active.take() {
         warn!(
            "Dropping unfinalized transaction {} after {:?} (will auto-rollback)",
            self.id,
            active.guard.held_for()
         );
      }
   }
}

impl<T: SqlTransaction> std::fmt::Debug for SyncTransaction<T> {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("SyncTransaction")
         .field("id", &self.id)
         .field("finalized", &self.is_finalized())
         .finish()
   }
}
