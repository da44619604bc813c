//! Failure injection for generator stores.

use crate::error::{Result, StorageError};
use crate::mux::{GeneratorRecord, GeneratorStore, InMemoryGeneratorStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Counters of injected failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub failed_loads: u64,
    pub failed_saves: u64,
    pub saves: u64,
}

/// Store wrapper that fails a load or save on request.
#[derive(Debug)]
pub struct FailingGeneratorStore {
    inner: Arc<dyn GeneratorStore>,
    fail_next_load: AtomicBool,
    /// Saves to let through before one fails; negative when disarmed.
    fail_save_in: AtomicI64,
    failed_loads: AtomicU64,
    failed_saves: AtomicU64,
    saves: AtomicU64,
}

impl FailingGeneratorStore {
    /// Wrap a store.
    pub fn new(inner: Arc<dyn GeneratorStore>) -> Self {
        Self {
            inner,
            fail_next_load: AtomicBool::new(false),
            fail_save_in: AtomicI64::new(-1),
            failed_loads: AtomicU64::new(0),
            failed_saves: AtomicU64::new(0),
            saves: AtomicU64::new(0),
        }
    }

    /// Wrap a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryGeneratorStore::new()))
    }

    /// Make the next `load` fail.
    pub fn fail_next_load(&self) {
        self.fail_next_load.store(true, Ordering::SeqCst);
    }

    /// Make the next `save` fail.
    pub fn fail_next_save(&self) {
        self.fail_save_after(0);
    }

    /// Let `skip` saves succeed, then fail the one after.
    pub fn fail_save_after(&self, skip: u32) {
        self.fail_save_in.store(i64::from(skip), Ordering::SeqCst);
    }

    fn save_should_fail(&self) -> bool {
        self.fail_save_in
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n >= 0).then(|| n - 1))
            == Ok(0)
    }

    /// Get injection statistics.
    pub fn stats(&self) -> FaultStats {
        FaultStats {
            failed_loads: self.failed_loads.load(Ordering::Relaxed),
            failed_saves: self.failed_saves.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl GeneratorStore for FailingGeneratorStore {
    async fn load(&self, key: &str) -> Result<Option<GeneratorRecord>> {
        if self.fail_next_load.swap(false, Ordering::SeqCst) {
            self.failed_loads.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::Unavailable(format!("injected load failure for {}", key)).into());
        }
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, record: &GeneratorRecord) -> Result<()> {
        if self.save_should_fail() {
            self.failed_saves.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::Unavailable(format!("injected save failure for {}", key)).into());
        }
        self.saves.fetch_add(1, Ordering::Relaxed);
        self.inner.save(key, record).await
    }
}
