//! Mock backend that records critical sections and can inject failures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value as JsonValue;
use sqlx_sqlite_sync::{
   Error, FileLock, Result, Row, SqlBackend, SqlTransaction, SyncDatabase, WriteQueryResult,
};

/// Query that makes the mock panic mid-operation
pub const PANIC_QUERY: &str = "PANIC";

/// Query that makes the mock return a database error
pub const FAIL_QUERY: &str = "FAIL";

/// State shared by every mock handle standing in for one database.
#[derive(Default)]
pub struct MockState {
   active: AtomicUsize,
   max_active: AtomicUsize,
   calls: AtomicUsize,
   log: Mutex<Vec<String>>,
   pub fail_begin: AtomicBool,
   pub fail_commit: AtomicBool,
}

impl MockState {
   /// Highest number of critical sections ever observed at once
   pub fn max_active(&self) -> usize {
      self.max_active.load(Ordering::SeqCst)
   }

   pub fn active(&self) -> usize {
      self.active.load(Ordering::SeqCst)
   }

   /// Number of operations that reached the backend
   pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
   }

   /// Statements applied, in order
   pub fn log(&self) -> Vec<String> {
      self.log.lock().unwrap().clone()
   }

   fn record(&self, entry: &str) {
      self.log.lock().unwrap().push(entry.to_string());
   }

   fn enter(self: &Arc<Self>) -> Section {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_active.fetch_max(now, Ordering::SeqCst);
      Section(Arc::clone(self))
   }
}

/// One critical section; leaving it (even by unwinding) decrements the count
struct Section(Arc<MockState>);

impl Drop for Section {
   fn drop(&mut self) {
      self.0.active.fetch_sub(1, Ordering::SeqCst);
   }
}

async fn apply(state: &MockState, hold: Duration, query: &str) -> Result<()> {
   if !hold.is_zero() {
      tokio::time::sleep(hold).await;
   }
   match query {
      PANIC_QUERY => panic!("injected panic"),
      FAIL_QUERY => Err(Error::Sqlx(sqlx::Error::Protocol("injected failure".into()))),
      _ => {
         state.record(query);
         Ok(())
      }
   }
}

fn echo_row(query: &str) -> Row {
   let mut row = Row::default();
   row.insert("query".into(), JsonValue::String(query.to_string()));
   row
}

/// One handle onto the mock database, standing in for a connection pool.
pub struct MockBackend {
   state: Arc<MockState>,
   hold: Duration,
}

impl MockBackend {
   pub fn new(state: &Arc<MockState>, hold: Duration) -> Self {
      Self {
         state: Arc::clone(state),
         hold,
      }
   }
}

impl SqlBackend for MockBackend {
   type Transaction = MockTransaction;

   async fn execute(&self, query: &str, _values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let _section = self.state.enter();
      apply(&self.state, self.hold, query).await?;
      Ok(WriteQueryResult {
         rows_affected: 1,
         last_insert_id: 0,
      })
   }

   async fn fetch_all(&self, query: &str, _values: Vec<JsonValue>) -> Result<Vec<Row>> {
      let _section = self.state.enter();
      apply(&self.state, self.hold, query).await?;
      Ok(vec![echo_row(query)])
   }

   async fn fetch_one(&self, query: &str, _values: Vec<JsonValue>) -> Result<Option<Row>> {
      let _section = self.state.enter();
      apply(&self.state, self.hold, query).await?;
      Ok(Some(echo_row(query)))
   }

   async fn begin(&self) -> Result<MockTransaction> {
      if self.state.fail_begin.load(Ordering::SeqCst) {
         return Err(Error::Sqlx(sqlx::Error::Protocol("begin refused".into())));
      }
      Ok(MockTransaction {
         section: self.state.enter(),
         hold: self.hold,
      })
   }
}

/// Mock transaction; its critical section spans begin to finalize.
pub struct MockTransaction {
   section: Section,
   hold: Duration,
}

impl SqlTransaction for MockTransaction {
   async fn execute(&mut self, query: &str, _values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      apply(&self.section.0, self.hold, query).await?;
      Ok(WriteQueryResult {
         rows_affected: 1,
         last_insert_id: 0,
      })
   }

   async fn fetch_all(&mut self, query: &str, _values: Vec<JsonValue>) -> Result<Vec<Row>> {
      apply(&self.section.0, self.hold, query).await?;
      Ok(vec![echo_row(query)])
   }

   async fn fetch_one(&mut self, query: &str, _values: Vec<JsonValue>) -> Result<Option<Row>> {
      apply(&self.section.0, self.hold, query).await?;
      Ok(Some(echo_row(query)))
   }

   async fn commit(self) -> Result<()> {
      if self.section.0.fail_commit.load(Ordering::SeqCst) {
         return Err(Error::Sqlx(sqlx::Error::Protocol("commit refused".into())));
      }
      self.section.0.record("COMMIT");
      Ok(())
   }

   async fn rollback(self) -> Result<()> {
      self.section.0.record("ROLLBACK");
      Ok(())
   }
}

pub fn lock_path(dir: &Path) -> PathBuf {
   dir.join("mock.db.lock")
}

/// A synchronized handle over the shared mock state, locking `dir`'s lock file
pub fn mock_db(
   dir: &Path,
   state: &Arc<MockState>,
   hold: Duration,
   busy_timeout: Duration,
) -> SyncDatabase<MockBackend> {
   SyncDatabase::new(
      MockBackend::new(state, hold),
      FileLock::new(lock_path(dir)),
      busy_timeout,
   )
}

/// Whether a fresh handle can take the lock right now
pub fn lock_is_free(dir: &Path) -> bool {
   FileLock::new(lock_path(dir))
      .try_acquire()
      .unwrap()
      .is_some()
}
