//! # sqlx-sqlite-sync
//!
//! SQLite access for [sqlx] that stays mutually exclusive across independent
//! processes sharing one database file.
//!
//! ## Core Types
//!
//! - **[`SyncDatabase`]**: Serializes every operation through an advisory
//!   file lock with a bounded wait (the busy timeout)
//! - **[`SyncTransaction`]**: Holds the lock from `begin` until commit or
//!   rollback, so no other caller interleaves statements
//! - **[`SqlBackend`] / [`SqlTransaction`]**: The operations being
//!   serialized; [`SqliteConnector`] implements them on a sqlx pool
//! - **[`SyncConfig`]**: Busy timeout, lock file and pool settings
//! - **[`Error`]**: Lock timeouts, lock I/O failures, and database errors
//!   passed through unchanged
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use sqlx_sqlite_sync::SyncDatabase;
//!
//! # async fn example() -> sqlx_sqlite_sync::Result<()> {
//! let db = SyncDatabase::connect("app.db", None).await?;
//! db.execute("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT)", vec![])
//!    .await?;
//!
//! let mut tx = db.begin().await?;
//! tx.execute("INSERT INTO kv VALUES ($1, $2)", vec![json!("a"), json!("1")])
//!    .await?;
//! tx.commit().await?;
//!
//! let _row = db.fetch_one("SELECT v FROM kv WHERE k = $1", vec![json!("a")]).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod database;
mod decode;
mod error;
mod sqlite;
mod transaction;

pub use backend::{Row, SqlBackend, SqlTransaction, Statement, WriteQueryResult};
pub use bounded_file_lock::{FileLock, LockError, LockGuard};
pub use config::SyncConfig;
pub use database::SyncDatabase;
pub use error::{Error, Result};
pub use sqlite::{SqliteConnector, SqliteTransaction};
pub use transaction::SyncTransaction;
