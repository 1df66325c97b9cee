//! # bounded-file-lock
//!
//! An exclusive advisory file lock whose acquisition is bounded by a timeout
//! or deadline, for mutual exclusion between cooperating processes on one
//! machine.
//!
//! ## Core Types
//!
//! - **[`FileLock`]**: Names a lock by file path and acquires it
//! - **[`LockGuard`]**: RAII guard whose existence proves ownership
//! - **[`LockError`]**: Timeout (contention) or I/O failure
//!
//! ## Behavior
//!
//! - **Polling**: Acquisition retries a non-blocking `try_lock` at a short,
//!   configurable interval, so timeouts hold on every platform
//! - **Not reentrant**: The same process contends with itself like any other
//! - **Advisory**: Only processes that use the same lock file are excluded.
//!   The file's content is irrelevant and the file is never removed.

mod error;
mod guard;
mod lock;

pub use error::{LockError, Result};
pub use guard::LockGuard;
pub use lock::{DEFAULT_POLL_INTERVAL, FileLock};
