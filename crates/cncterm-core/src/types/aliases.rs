//! Type aliases for shared state.
//!
//! Machine status and parameters are shared between the command pipeline
//! and background tasks, so they live behind `parking_lot` locks wrapped in
//! an `Arc`. The aliases keep those signatures readable.
//!
//! ```rust,ignore
//! use cncterm_core::types::*;
//!
//! // Instead of: Arc<RwLock<MachineStatus>>
//! let status: ThreadSafeRw<MachineStatus> = thread_safe_rw(MachineStatus::default());
//! ```

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// A thread-safe, mutex-protected wrapper for cross-task sharing.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe reader-writer lock wrapper for read-heavy workloads.
///
/// Multiple readers can access concurrently, writes require exclusive access.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// Create a new `ThreadSafe<T>` from a value.
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new `ThreadSafeRw<T>` from a value.
#[inline]
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
