//! Configuration for synchronized SQLite databases

use std::path::{Path, PathBuf};
use std::time::Duration;

use bounded_file_lock::DEFAULT_POLL_INTERVAL;

/// Configuration for [`SyncDatabase::connect`](crate::SyncDatabase::connect)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_sync::SyncConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SyncConfig::default();
///
/// // Override just one field
/// let config = SyncConfig {
///     busy_timeout: Duration::from_millis(500),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
   /// Maximum time a caller waits for the database lock
   ///
   /// Also applied as SQLite's own busy timeout on every connection.
   ///
   /// Default: 5 seconds
   pub busy_timeout: Duration,

   /// Delay between two attempts to take the lock file
   ///
   /// Default: 1 millisecond
   pub poll_interval: Duration,

   /// Lock file shared by every process using this database
   ///
   /// Default: `None`, meaning the database path with `.lock` appended
   pub lock_path: Option<PathBuf>,

   /// Maximum number of pooled connections
   ///
   /// Default: 6
   pub max_connections: u32,

   /// Idle timeout for pooled connections
   ///
   /// Default: 30 seconds
   pub idle_timeout: Duration,
}

impl Default for SyncConfig {
   fn default() -> Self {
      Self {
         busy_timeout: Duration::from_secs(5),
         poll_interval: DEFAULT_POLL_INTERVAL,
         lock_path: None,
         max_connections: 6,
         idle_timeout: Duration::from_secs(30),
      }
   }
}

impl SyncConfig {
   /// Lock file for the database at `db_path`
   pub fn lock_path_for(&self, db_path: &Path) -> PathBuf {
      match &self.lock_path {
         Some(path) => path.clone(),
         None => {
            let mut path = db_path.as_os_str().to_owned();
            path.push(".lock");
            PathBuf::from(path)
         }
      }
   }
}
