//! RAII guard proving ownership of a file lock

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::{LockError, Result};

/// Proof of exclusive ownership of a [`FileLock`](crate::FileLock).
///
/// Ownership ends when the guard is passed to [`release`](Self::release) or
/// dropped, whichever happens first. Because `release` consumes the guard, a
/// lock can never be released twice through the same guard.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard {
   /// Open handle carrying the OS lock. `None` once unlocked.
   file: Option<File>,
   path: PathBuf,
   acquired_at: Instant,
}

impl LockGuard {
   pub(crate) fn new(file: File, path: PathBuf) -> Self {
      Self {
         file: Some(file),
         path,
         acquired_at: Instant::now(),
      }
   }

   /// Path of the lock file this guard holds
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Time elapsed since the lock was acquired
   pub fn held_for(&self) -> Duration {
      self.acquired_at.elapsed()
   }

   /// Release the lock, reporting any failure to unlock the file.
   ///
   /// The file handle is closed even when unlocking fails, and closing the
   /// handle drops the OS lock, so the lock never outlives this call.
   pub fn release(mut self) -> Result<()> {
      self.unlock()
   }

   fn unlock(&mut self) -> Result<()> {
      let Some(file) = self.file.take() else {
         return Ok(());
      };

      // Fully qualified: std's inherent `File::unlock` shadows the trait method
      FileExt::unlock(&file).map_err(|source| LockError::Io {
         path: self.path.clone(),
         source,
      })?;

      debug!(
         "Released lock {} after {:?}",
         self.path.display(),
         self.acquired_at.elapsed()
      );
      Ok(())
   }
}

impl Drop for LockGuard {
   fn drop(&mut self) {
      if let Err(err) = self.unlock() {
         warn!("Failed to release lock on drop: {}", err);
      }
   }
}
