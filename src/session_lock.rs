//! Per-session advisory write locks.
//!
//! Writes to the same session must serialize so batch saves keep their
//! ordering guarantees, while unrelated sessions proceed concurrently. Each
//! store owns its own registry, so independent store instances never contend
//! with each other (or with tests running in the same process).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed mutex registry: one async lock per session id.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a session, creating it on first use.
    ///
    /// The registry mutex is only held long enough to fetch the entry; the
    /// await happens on the per-session lock.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("session lock registry poisoned");
            Arc::clone(
                locks
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of sessions with a registered lock (diagnostics)
    pub fn len(&self) -> usize {
        self.locks.lock().expect("session lock registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_session_serializes() {
        let locks = SessionLocks::new();
        let guard = locks.acquire("s1").await;

        let second = {
            let inner = {
                let mut map = locks.locks.lock().unwrap();
                Arc::clone(map.get_mut("s1").unwrap())
            };
            inner.try_lock_owned()
        };
        assert!(second.is_err());

        drop(guard);
    }

    #[tokio::test]
    async fn different_sessions_are_independent() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("s1").await;
        let _b = locks.acquire("s2").await;
        assert_eq!(locks.len(), 2);
    }
}
