//! Scheduling coordinator: the per-class and per-teacher lock table.
//!
//! Mutating operations serialize on the classes (and, for teacher-wide
//! operations, the teachers) they touch. A caller asks for its whole key
//! set at once; the coordinator grants all of it or none, so two
//! operations with overlapping key sets can never deadlock on each other.
//! Waiting is bounded and ends in [`TimetableError::ConcurrencyTimeout`].
//!
//! Reads never go through the coordinator.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Result, TimetableError};

/// A lockable scheduling resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Class(String),
    Teacher(String),
}

impl LockKey {
    pub fn class(id: impl Into<String>) -> Self {
        Self::Class(id.into())
    }

    pub fn teacher(id: impl Into<String>) -> Self {
        Self::Teacher(id.into())
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Class(id) => write!(f, "class:{id}"),
            LockKey::Teacher(id) => write!(f, "teacher:{id}"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

/// Lock table shared by every mutating operation.
#[derive(Debug, Clone, Default)]
pub struct ScheduleCoordinator {
    inner: Arc<Inner>,
}

impl ScheduleCoordinator {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every key in `keys`, waiting at most `timeout`.
    ///
    /// The returned guard releases the keys when dropped.
    pub fn acquire(
        &self,
        keys: impl IntoIterator<Item = LockKey>,
        timeout: Duration,
    ) -> Result<LockGuard> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let started = Instant::now();
        let deadline = started + timeout;
        let mut held = self.inner.held.lock();

        while let Some(busy) = keys.iter().find(|k| held.contains(*k)) {
            if self.inner.released.wait_until(&mut held, deadline).timed_out()
                && keys.iter().any(|k| held.contains(k))
            {
                return Err(TimetableError::ConcurrencyTimeout {
                    resource: busy.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }

        held.extend(keys.iter().cloned());
        debug!(keys = ?keys, "locks acquired");

        Ok(LockGuard {
            inner: Arc::clone(&self.inner),
            keys,
        })
    }

    /// Whether a key is currently held.
    pub fn is_held(&self, key: &LockKey) -> bool {
        self.inner.held.lock().contains(key)
    }
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct LockGuard {
    inner: Arc<Inner>,
    keys: Vec<LockKey>,
}

impl LockGuard {
    /// Keys held by this guard.
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let mut held = self.inner.held.lock();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.inner.released.notify_all();
    }
}
