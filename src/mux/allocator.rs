//! Cluster-wide, reference-counted tenant mux id allocation.

use super::lock::{LockGuard, LockManager, MemoryLockManager};
use super::store::{GeneratorRecord, GeneratorStore, InMemoryGeneratorStore};
use crate::config::{MuxConfig, ReclaimPolicy};
use crate::error::{Error, Result};
use crate::metrics::MuxMetrics;
use crate::types::{Release, TenantId, TenantMuxId, TenantMuxRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hands out tenant mux ids from the shared generator record.
///
/// Every operation runs as a transaction: take the cluster lock on the
/// generator key, load the record, work on a copy, and save the copy on
/// commit. A transaction dropped before commit leaves the stored record
/// untouched. Operations on different allocator instances sharing the same
/// lock manager and store are serialized cluster-wide.
///
/// Tenant states:
///
/// ```text
/// absent ──start──► allocated(1) ──start──► allocated(N)
///   ▲                   │  ▲                    │
///   └───────stop────────┘  └────────stop────────┘
/// ```
#[derive(Debug)]
pub struct MuxIdAllocator {
    config: MuxConfig,
    locks: Arc<dyn LockManager>,
    store: Arc<dyn GeneratorStore>,
    metrics: MuxMetrics,
}

impl MuxIdAllocator {
    /// Create an allocator over the given lock manager and store.
    pub fn new(
        config: MuxConfig,
        locks: Arc<dyn LockManager>,
        store: Arc<dyn GeneratorStore>,
    ) -> Self {
        Self {
            config,
            locks,
            store,
            metrics: MuxMetrics::new(),
        }
    }

    /// Create an allocator with private in-memory lock and store.
    pub fn in_memory(config: MuxConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryLockManager::new()),
            Arc::new(InMemoryGeneratorStore::new()),
        )
    }

    /// Get the configuration.
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Get the allocator metrics.
    pub fn metrics(&self) -> &MuxMetrics {
        &self.metrics
    }

    /// Add a reference for `tenant`, allocating its mux id on the first one.
    pub async fn start(&self, tenant: &TenantId) -> Result<TenantMuxId> {
        let result = self.start_inner(tenant).await;
        match &result {
            Ok(_) => self.metrics.starts.inc(),
            Err(e) => self.record_error(e),
        }
        result
    }

    /// Look up the mux id of `tenant` without changing anything.
    pub async fn get(&self, tenant: &TenantId) -> Result<TenantMuxId> {
        let result = self.get_inner(tenant).await;
        match &result {
            Ok(_) => self.metrics.lookups.inc(),
            Err(e) => self.record_error(e),
        }
        result
    }

    /// Drop a reference for `tenant`. The record is removed at zero.
    pub async fn stop(&self, tenant: &TenantId) -> Result<Release> {
        let result = self.stop_inner(tenant).await;
        match &result {
            Ok(_) => self.metrics.stops.inc(),
            Err(e) => self.record_error(e),
        }
        result
    }

    /// Read a tenant's record.
    pub async fn record(&self, tenant: &TenantId) -> Result<Option<TenantMuxRecord>> {
        let txn = self.begin().await?;
        let record = txn.working.tenant(tenant).copied();
        Ok(record)
    }

    /// Read the whole generator record.
    pub async fn snapshot(&self) -> Result<GeneratorRecord> {
        let txn = self.begin().await?;
        let record = txn.working.clone();
        Ok(record)
    }

    async fn start_inner(&self, tenant: &TenantId) -> Result<TenantMuxId> {
        let mut txn = self.begin().await?;

        let record = match txn.working.tenant(tenant).copied() {
            Some(existing) => {
                let ref_count = existing.ref_count.checked_add(1).ok_or_else(|| {
                    Error::Internal(format!("reference count overflow for {}", tenant))
                })?;
                TenantMuxRecord {
                    ref_count,
                    ..existing
                }
            }
            None => TenantMuxRecord {
                ref_count: 1,
                mux_id: self.next_free_id(&mut txn.working)?,
            },
        };
        txn.working.tenants.insert(tenant.clone(), record);
        txn.commit().await?;

        if record.ref_count == 1 {
            self.metrics.allocations.inc();
            info!(tenant = %tenant, mux_id = record.mux_id, "Allocated tenant mux id");
        } else {
            debug!(
                tenant = %tenant,
                mux_id = record.mux_id,
                ref_count = record.ref_count,
                "Added tenant reference"
            );
        }
        Ok(record.mux_id)
    }

    async fn get_inner(&self, tenant: &TenantId) -> Result<TenantMuxId> {
        let txn = self.begin().await?;
        let mux_id = txn.working.tenant(tenant).map(|record| record.mux_id);
        mux_id.ok_or_else(|| Error::TenantNotAllocated(tenant.to_string()))
    }

    async fn stop_inner(&self, tenant: &TenantId) -> Result<Release> {
        let mut txn = self.begin().await?;

        let release = match txn.working.tenant(tenant).copied() {
            None => {
                warn!(tenant = %tenant, "Stop for tenant without a mux id");
                return Ok(Release::NotAllocated);
            }
            Some(existing) if existing.ref_count > 1 => {
                let remaining = existing.ref_count - 1;
                txn.working.tenants.insert(
                    tenant.clone(),
                    TenantMuxRecord {
                        ref_count: remaining,
                        ..existing
                    },
                );
                Release::Decremented {
                    mux_id: existing.mux_id,
                    remaining,
                }
            }
            Some(existing) => {
                txn.working.tenants.remove(tenant);
                txn.working.released.insert(existing.mux_id);
                Release::Released {
                    mux_id: existing.mux_id,
                }
            }
        };
        txn.commit().await?;

        match release {
            Release::Released { mux_id } => {
                self.metrics.releases.inc();
                info!(tenant = %tenant, mux_id, "Released tenant mux id");
            }
            Release::Decremented { mux_id, remaining } => {
                debug!(tenant = %tenant, mux_id, remaining, "Dropped tenant reference");
            }
            Release::NotAllocated => {}
        }
        Ok(release)
    }

    /// Pick the id for a tenant's first reference.
    ///
    /// Never-used ids go first unless the policy prefers released ones.
    /// Once the range is used up, released ids are reused lowest first.
    fn next_free_id(&self, record: &mut GeneratorRecord) -> Result<TenantMuxId> {
        if self.config.reclaim == ReclaimPolicy::LowestReleased {
            if let Some(id) = record.released.pop_first() {
                return Ok(id);
            }
        }

        let id = record.next_id.max(self.config.first_mux_id);
        if id <= self.config.max_mux_id {
            if let Some(next) = id.checked_add(1) {
                record.next_id = next;
                return Ok(id);
            }
        }

        match record.released.pop_first() {
            Some(id) => {
                debug!(mux_id = id, "Id range used up, reusing released id");
                Ok(id)
            }
            None => Err(Error::MuxIdSpaceExhausted {
                max: self.config.max_mux_id,
            }),
        }
    }

    async fn begin(&self) -> Result<GeneratorTxn<'_>> {
        let key = self.config.generator_key.as_str();
        let guard = self.locks.lock(key, self.config.lock_timeout).await?;

        let record = self
            .store
            .load(key)
            .await
            .map_err(|e| Error::TransactionFailed(format!("load of {} failed: {}", key, e)))?
            .unwrap_or_else(|| GeneratorRecord::new(self.config.first_mux_id));

        Ok(GeneratorTxn {
            allocator: self,
            _guard: guard,
            original: record.clone(),
            working: record,
            committed: false,
        })
    }

    fn record_error(&self, error: &Error) {
        self.metrics.errors.inc(error.label());
    }
}

/// One read-modify-write of the generator record under the cluster lock.
struct GeneratorTxn<'a> {
    allocator: &'a MuxIdAllocator,
    _guard: LockGuard,
    original: GeneratorRecord,
    working: GeneratorRecord,
    committed: bool,
}

impl GeneratorTxn<'_> {
    async fn commit(&mut self) -> Result<()> {
        if self.working == self.original {
            self.committed = true;
            return Ok(());
        }

        self.working.version = self.original.version + 1;
        let key = self.allocator.config.generator_key.as_str();
        self.allocator
            .store
            .save(key, &self.working)
            .await
            .map_err(|e| Error::TransactionFailed(format!("save of {} failed: {}", key, e)))?;

        self.committed = true;
        self.allocator
            .metrics
            .active_tenants
            .set(self.working.active_tenants() as i64);
        Ok(())
    }
}

impl Drop for GeneratorTxn<'_> {
    fn drop(&mut self) {
        if !self.committed && self.working != self.original {
            self.allocator.metrics.rollbacks.inc();
            debug!(
                version = self.original.version,
                "Rolled back generator transaction"
            );
        }
    }
}
