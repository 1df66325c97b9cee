//! Error types for bounded-file-lock

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that may occur while acquiring or releasing a [`FileLock`](crate::FileLock)
#[derive(Error, Debug)]
pub enum LockError {
   /// The lock stayed held by someone else until the timeout or deadline
   /// elapsed. Contention is expected, so callers may retry.
   #[error("timed out after {waited:?} waiting for lock {}", .path.display())]
   Timeout { path: PathBuf, waited: Duration },

   /// The lock file could not be created, opened, locked or unlocked for a
   /// reason unrelated to contention (permissions, missing directory, ...)
   #[error("lock file {} unavailable: {source}", .path.display())]
   Io {
      path: PathBuf,
      #[source]
      source: std::io::Error,
   },
}

impl LockError {
   /// Path of the lock file this error refers to
   pub fn path(&self) -> &std::path::Path {
      match self {
         LockError::Timeout { path, .. } | LockError::Io { path, .. } => path,
      }
   }

   /// Whether this error is a timeout caused by contention
   pub fn is_timeout(&self) -> bool {
      matches!(self, LockError::Timeout { .. })
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, LockError>;
