//! Cluster lock capability guarding the generator record.

use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Current status of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// Nobody holds the lock.
    Free,
    /// Some holder owns the lock.
    Held,
}

/// Proof of holding a lock. The lock is released when the guard is dropped.
pub struct LockGuard {
    resource: String,
    lease: Uuid,
    acquired_at: Instant,
    _held: Box<dyn Any + Send + Sync>,
}

impl LockGuard {
    /// Wrap a backend-specific guard.
    pub fn new(resource: impl Into<String>, held: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            resource: resource.into(),
            lease: Uuid::new_v4(),
            acquired_at: Instant::now(),
            _held: held,
        }
    }

    /// Locked resource.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Unique id of this acquisition.
    pub fn lease(&self) -> Uuid {
        self.lease
    }

    /// How long the lock has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("resource", &self.resource)
            .field("lease", &self.lease)
            .field("held_for", &self.held_for())
            .finish()
    }
}

/// Distributed lock manager.
#[async_trait]
pub trait LockManager: Send + Sync + fmt::Debug {
    /// Acquire the lock on `resource`, waiting at most `timeout`.
    ///
    /// Fails with [`Error::LockUnavailable`] when the wait expires.
    async fn lock(&self, resource: &str, timeout: Duration) -> Result<LockGuard>;

    /// Check the status of a lock without acquiring it.
    fn status(&self, resource: &str) -> LockStatus;
}

/// In-process lock manager.
///
/// Clones share the same lock table, so several allocator instances built
/// from clones behave like nodes of one cluster.
#[derive(Clone, Debug, Default)]
pub struct MemoryLockManager {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryLockManager {
    /// Create an empty lock manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, resource: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            &*self
                .locks
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn lock(&self, resource: &str, timeout: Duration) -> Result<LockGuard> {
        let mutex = self.mutex_for(resource);
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(held) => {
                let guard = LockGuard::new(resource, Box::new(held));
                tracing::trace!(resource, lease = %guard.lease(), "Lock acquired");
                Ok(guard)
            }
            Err(_) => {
                tracing::debug!(resource, ?timeout, "Lock wait timed out");
                Err(Error::LockUnavailable {
                    resource: resource.to_string(),
                    waited: timeout,
                })
            }
        }
    }

    fn status(&self, resource: &str) -> LockStatus {
        match self.locks.get(resource) {
            Some(mutex) if mutex.try_lock().is_err() => LockStatus::Held,
            _ => LockStatus::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let manager = MemoryLockManager::new();
        assert_eq!(manager.status("gen"), LockStatus::Free);

        let guard = manager.lock("gen", Duration::from_secs(1)).await.unwrap();
        assert_eq!(guard.resource(), "gen");
        assert_eq!(manager.status("gen"), LockStatus::Held);

        drop(guard);
        assert_eq!(manager.status("gen"), LockStatus::Free);
    }

    #[tokio::test]
    async fn test_timeout_when_held() {
        let manager = MemoryLockManager::new();
        let other_node = manager.clone();

        let _guard = manager.lock("gen", Duration::from_secs(1)).await.unwrap();
        let err = other_node
            .lock("gen", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockUnavailable { ref resource, .. } if resource == "gen"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_distinct_resources_do_not_block() {
        let manager = MemoryLockManager::new();
        let _a = manager.lock("a", Duration::from_secs(1)).await.unwrap();
        let b = manager.lock("b", Duration::from_millis(20)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let manager = MemoryLockManager::new();
        let guard = manager.lock("gen", Duration::from_secs(1)).await.unwrap();
        let first_lease = guard.lease();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.lock("gen", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        let second = waiter.await.unwrap().unwrap();
        assert_ne!(second.lease(), first_lease);
    }
}
