//! SQLite backend built on a sqlx connection pool

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use sqlx::query::Query;
use sqlx::sqlite::{
   SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteQueryResult,
};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::backend::{Row, SqlBackend, SqlTransaction, WriteQueryResult};
use crate::config::SyncConfig;
use crate::decode::{decode_row, decode_rows};
use crate::Result;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Pooled SQLite connections to one database file.
///
/// On its own this type does no cross-process locking; wrap it in a
/// [`SyncDatabase`](crate::SyncDatabase).
#[derive(Debug)]
pub struct SqliteConnector {
   pool: SqlitePool,
   path: PathBuf,
}

impl SqliteConnector {
   /// Open (creating if missing) the database at `path`.
   ///
   /// SQLite's own busy timeout is set to `config.busy_timeout` so writers
   /// that bypass the advisory lock still back off instead of failing.
   pub async fn connect(path: impl AsRef<Path>, config: &SyncConfig) -> Result<Self> {
      let path = path.as_ref();
      if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
         create_dir_all(parent)?;
      }

      let options = SqliteConnectOptions::new()
         .filename(path)
         .create_if_missing(true)
         .busy_timeout(config.busy_timeout);

      let pool = SqlitePoolOptions::new()
         .max_connections(config.max_connections)
         .idle_timeout(config.idle_timeout)
         .connect_with(options)
         .await?;

      debug!("Opened SQLite pool for {}", path.display());

      Ok(Self {
         pool,
         path: path.to_path_buf(),
      })
   }

   /// Path of the database file
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Close every pooled connection
   pub async fn close(&self) {
      self.pool.close().await;
      debug!("Closed SQLite pool for {}", self.path.display());
   }
}

impl SqlBackend for SqliteConnector {
   type Transaction = SqliteTransaction;

   async fn execute(&self, query: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let result = build_query(query, values).execute(&self.pool).await?;
      Ok(write_result(&result))
   }

   async fn fetch_all(&self, query: &str, values: Vec<JsonValue>) -> Result<Vec<Row>> {
      let rows = build_query(query, values).fetch_all(&self.pool).await?;
      decode_rows(&rows)
   }

   async fn fetch_one(&self, query: &str, values: Vec<JsonValue>) -> Result<Option<Row>> {
      let row = build_query(query, values)
         .fetch_optional(&self.pool)
         .await?;
      row.as_ref().map(decode_row).transpose()
   }

   async fn begin(&self) -> Result<SqliteTransaction> {
      let tx = self.pool.begin().await?;
      Ok(SqliteTransaction { tx })
   }
}

/// A transaction on one pooled connection.
///
/// sqlx rolls the transaction back if it is dropped unfinished.
pub struct SqliteTransaction {
   tx: Transaction<'static, Sqlite>,
}

impl SqlTransaction for SqliteTransaction {
   async fn execute(&mut self, query: &str, values: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let result = build_query(query, values).execute(&mut *self.tx).await?;
      Ok(write_result(&result))
   }

   async fn fetch_all(&mut self, query: &str, values: Vec<JsonValue>) -> Result<Vec<Row>> {
      let rows = build_query(query, values).fetch_all(&mut *self.tx).await?;
      decode_rows(&rows)
   }

   async fn fetch_one(&mut self, query: &str, values: Vec<JsonValue>) -> Result<Option<Row>> {
      let row = build_query(query, values)
         .fetch_optional(&mut *self.tx)
         .await?;
      row.as_ref().map(decode_row).transpose()
   }

   async fn commit(self) -> Result<()> {
      self.tx.commit().await?;
      Ok(())
   }

   async fn rollback(self) -> Result<()> {
      self.tx.rollback().await?;
      Ok(())
   }
}

fn write_result(result: &SqliteQueryResult) -> WriteQueryResult {
   WriteQueryResult {
      rows_affected: result.rows_affected(),
      last_insert_id: result.last_insert_rowid(),
   }
}

fn build_query(query: &str, values: Vec<JsonValue>) -> SqliteQuery<'_> {
   values.into_iter().fold(sqlx::query(query), bind_value)
}

/// Helper function to bind a JSON value to a SQLx query
fn bind_value(query: SqliteQuery<'_>, value: JsonValue) -> SqliteQuery<'_> {
   match value {
      JsonValue::Null => query.bind(None::<JsonValue>),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Value too large for i64, use f64 (will lose precision)
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other),
   }
}
