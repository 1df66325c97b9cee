use std::path::PathBuf;
use std::time::Duration;

use bounded_file_lock::LockError;

/// Result type alias for synchronized database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for synchronized database operations.
///
/// The lock variants are raised before the database is touched. Database
/// failures pass through unchanged as [`Error::Sqlx`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The database lock stayed held by another caller past the busy timeout.
   #[error("timed out after {waited:?} waiting for database lock {}", .path.display())]
   LockTimeout { path: PathBuf, waited: Duration },

   /// The lock file could not be opened or locked.
   #[error("database lock {} unavailable: {source}", .path.display())]
   LockUnavailable {
      path: PathBuf,
      #[source]
      source: std::io::Error,
   },

   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Transaction has already been committed or rolled back.
   #[error("transaction has already been finalized (committed or rolled back)")]
   TransactionAlreadyFinalized,

   /// Transaction failed and rollback also failed.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: String,
      rollback_error: String,
   },

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// I/O error when accessing database files.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),
}

impl From<LockError> for Error {
   fn from(err: LockError) -> Self {
      match err {
         LockError::Timeout { path, waited } => Error::LockTimeout { path, waited },
         LockError::Io { path, source } => Error::LockUnavailable { path, source },
      }
   }
}

impl Error {
   /// Whether retrying the same call later may succeed.
   ///
   /// Only lock contention qualifies; everything else needs a change first.
   pub fn is_retryable(&self) -> bool {
      matches!(self, Error::LockTimeout { .. })
   }

   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::LockTimeout { .. } => "LOCK_TIMEOUT".to_string(),
         Error::LockUnavailable { .. } => "LOCK_UNAVAILABLE".to_string(),
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::TransactionAlreadyFinalized => "TRANSACTION_ALREADY_FINALIZED".to_string(),
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_lock_timeout_from_lock_error() {
      let err = Error::from(LockError::Timeout {
         path: PathBuf::from("main.db.lock"),
         waited: Duration::from_millis(50),
      });
      assert_eq!(err.error_code(), "LOCK_TIMEOUT");
      assert!(err.is_retryable());
      assert!(err.to_string().contains("main.db.lock"));
   }

   #[test]
   fn test_lock_unavailable_from_lock_error() {
      let err = Error::from(LockError::Io {
         path: PathBuf::from("/nope/main.db.lock"),
         source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
      });
      assert_eq!(err.error_code(), "LOCK_UNAVAILABLE");
      assert!(!err.is_retryable());
      assert!(err.to_string().contains("denied"));
   }

   #[test]
   fn test_error_code_transaction_already_finalized() {
      let err = Error::TransactionAlreadyFinalized;
      assert_eq!(err.error_code(), "TRANSACTION_ALREADY_FINALIZED");
      assert!(!err.is_retryable());
   }

   #[test]
   fn test_error_code_transaction_rollback_failed() {
      let err = Error::TransactionRollbackFailed {
         transaction_error: "constraint".into(),
         rollback_error: "busy".into(),
      };
      assert_eq!(err.error_code(), "TRANSACTION_ROLLBACK_FAILED");
      assert!(err.to_string().contains("constraint"));
      assert!(err.to_string().contains("busy"));
   }

   #[test]
   fn test_error_code_unsupported_datatype() {
      let err = Error::UnsupportedDatatype("WEIRD".into());
      assert_eq!(err.error_code(), "UNSUPPORTED_DATATYPE");
   }

   #[test]
   fn test_error_code_io() {
      let err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
      assert_eq!(err.error_code(), "IO_ERROR");
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no SQLite code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
      assert!(!err.is_retryable());
   }
}
