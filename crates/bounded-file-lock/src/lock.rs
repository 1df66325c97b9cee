//! Named advisory file lock with bounded acquisition

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::guard::LockGuard;
use crate::{LockError, Result};

/// Default delay between two acquisition attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lower bound for the poll interval, keeps a zero interval from spinning
const MIN_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Stand-in deadline for timeouts too large to add to `Instant::now()`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// An exclusive advisory lock identified by a file path.
///
/// The lock holds no state of its own: whether it is held is tracked by the
/// operating system and represented in-process by a [`LockGuard`]. A single
/// `FileLock` can be shared and reused for the lifetime of the process.
///
/// ## Reentrancy
///
/// Acquisition is not reentrant. Each attempt opens its own handle to the
/// lock file, so a second acquisition from the same process while a guard is
/// live contends exactly like an acquisition from another process would.
///
/// # Examples
///
/// ```no_run
/// use bounded_file_lock::FileLock;
/// use std::time::Duration;
///
/// # async fn example() -> bounded_file_lock::Result<()> {
/// let lock = FileLock::new("/tmp/app.db.lock");
/// let guard = lock.acquire(Duration::from_secs(5)).await?;
/// // ... exclusive section ...
/// guard.release()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileLock {
   path: PathBuf,
   poll_interval: Duration,
}

/// Outcome of a single non-blocking attempt
enum Attempt {
   Acquired(LockGuard),
   Contended(File),
}

impl FileLock {
   /// Create a lock handle for `path`. The file is created on first acquire.
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self {
         path: path.into(),
         poll_interval: DEFAULT_POLL_INTERVAL,
      }
   }

   /// Set the delay between acquisition attempts (at least 100µs)
   pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
      self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
      self
   }

   /// Path of the lock file
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Delay between acquisition attempts
   pub fn poll_interval(&self) -> Duration {
      self.poll_interval
   }

   /// Make a single non-blocking attempt. Returns `Ok(None)` on contention.
   pub fn try_acquire(&self) -> Result<Option<LockGuard>> {
      match self.try_lock(self.open()?)? {
         Attempt::Acquired(guard) => Ok(Some(guard)),
         Attempt::Contended(_) => Ok(None),
      }
   }

   /// Acquire the lock, waiting at most `timeout`.
   ///
   /// # Errors
   ///
   /// - [`LockError::Timeout`] if the lock is still held elsewhere when the
   ///   timeout elapses
   /// - [`LockError::Io`] if the lock file cannot be opened or locked
   pub async fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
      self.acquire_until(deadline_after(timeout)).await
   }

   /// Acquire the lock, waiting until `deadline` at the latest.
   ///
   /// Dropping the returned future abandons the wait without leaving the
   /// lock held.
   pub async fn acquire_until(&self, deadline: Instant) -> Result<LockGuard> {
      let started = Instant::now();
      let mut file = self.open()?;

      loop {
         match self.try_lock(file)? {
            Attempt::Acquired(guard) => return Ok(guard),
            Attempt::Contended(f) => file = f,
         }

         let now = Instant::now();
         if now >= deadline {
            return Err(self.timeout(now - started));
         }

         trace!("Lock {} contended, retrying", self.path.display());
         tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
      }
   }

   /// Blocking counterpart of [`acquire`](Self::acquire) for synchronous
   /// callers. Sleeps the calling thread between attempts.
   pub fn acquire_blocking(&self, timeout: Duration) -> Result<LockGuard> {
      let started = std::time::Instant::now();
      let mut file = self.open()?;

      loop {
         match self.try_lock(file)? {
            Attempt::Acquired(guard) => return Ok(guard),
            Attempt::Contended(f) => file = f,
         }

         let waited = started.elapsed();
         if waited >= timeout {
            return Err(self.timeout(waited));
         }

         std::thread::sleep(self.poll_interval.min(timeout - waited));
      }
   }

   fn open(&self) -> Result<File> {
      OpenOptions::new()
         .read(true)
         .write(true)
         .create(true)
         .truncate(false)
         .open(&self.path)
         .map_err(|source| LockError::Io {
            path: self.path.clone(),
            source,
         })
   }

   fn try_lock(&self, file: File) -> Result<Attempt> {
      match FileExt::try_lock_exclusive(&file) {
         Ok(()) => {
            debug!("Acquired lock {}", self.path.display());
            Ok(Attempt::Acquired(LockGuard::new(file, self.path.clone())))
         }
         Err(err) if is_contended(&err) => Ok(Attempt::Contended(file)),
         Err(source) => Err(LockError::Io {
            path: self.path.clone(),
            source,
         }),
      }
   }

   fn timeout(&self, waited: Duration) -> LockError {
      debug!(
         "Gave up on lock {} after {:?}",
         self.path.display(),
         waited
      );
      LockError::Timeout {
         path: self.path.clone(),
         waited,
      }
   }
}

fn deadline_after(timeout: Duration) -> Instant {
   let now = Instant::now();
   now.checked_add(timeout).unwrap_or(now + FAR_FUTURE)
}

fn is_contended(err: &io::Error) -> bool {
   err.kind() == io::ErrorKind::WouldBlock
      || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
