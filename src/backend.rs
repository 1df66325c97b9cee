//! The SQL operations a synchronized database delegates to

use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Result;

/// A decoded row, keyed by column name in select order.
pub type Row = IndexMap<String, JsonValue>;

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only set for INSERT operations on tables with a ROWID.
   /// Tables created with `WITHOUT ROWID` will not set this value (returns 0).
   pub last_insert_id: i64,
}

/// Statement in a transaction with query and bind values
#[derive(Debug, Clone, Deserialize)]
pub struct Statement {
   pub query: String,
   pub values: Vec<JsonValue>,
}

impl Statement {
   pub fn new(query: impl Into<String>, values: Vec<JsonValue>) -> Self {
      Self {
         query: query.into(),
         values,
      }
   }
}

/// A SQL-capable resource, usually a connection pool.
///
/// Implementations perform no locking of their own;
/// [`SyncDatabase`](crate::SyncDatabase) serializes every call.
pub trait SqlBackend: Send + Sync {
   /// Transaction type handed out by [`begin`](Self::begin)
   type Transaction: SqlTransaction;

   /// Execute a statement, returning affected row counts
   fn execute(
      &self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<WriteQueryResult>> + Send;

   /// Execute a query, returning every row
   fn fetch_all(
      &self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<Vec<Row>>> + Send;

   /// Execute a query, returning its first row if any
   fn fetch_one(
      &self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<Option<Row>>> + Send;

   /// Start a transaction
   fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// An open transaction of a [`SqlBackend`].
///
/// Dropping a transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must roll it back.
pub trait SqlTransaction: Send {
   /// Execute a statement inside the transaction
   fn execute(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<WriteQueryResult>> + Send;

   /// Execute a query inside the transaction, returning every row
   fn fetch_all(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<Vec<Row>>> + Send;

   /// Execute a query inside the transaction, returning its first row if any
   fn fetch_one(
      &mut self,
      query: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<Option<Row>>> + Send;

   fn commit(self) -> impl Future<Output = Result<()>> + Send;

   fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
