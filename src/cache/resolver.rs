//! Per-tenant cache configuration.

use super::registry::{TypeHandle, TypeRegistry};
use super::{CacheKind, KindTable};
use crate::error::{Error, Result};
use crate::mux::MuxIdAllocator;
use crate::types::{MuxId, Release, TenantId, TenantMuxId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Name of the cache of `kind` owned by `tenant`.
pub fn cache_name(tenant: &TenantId, kind: CacheKind) -> String {
    format!("{}_{}", tenant, kind)
}

/// Everything a host needs to bring one tenant cache online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantCacheConfig {
    pub tenant: TenantId,
    pub kind: CacheKind,
    /// `"{tenant}_{kind}"`.
    pub cache_name: String,
    /// Tenant slot from the allocator.
    pub tenant_mux_id: TenantMuxId,
    /// Id the group-communication channel uses for this cache.
    pub mux_id: MuxId,
    /// Indexed types, in type name order.
    pub indexed_types: Vec<TypeHandle>,
}

/// Builds tenant cache configurations from the allocator, the kind table
/// and the host's type registry.
#[derive(Debug)]
pub struct TenantCacheResolver {
    allocator: Arc<MuxIdAllocator>,
    table: KindTable,
    registry: Arc<dyn TypeRegistry>,
}

impl TenantCacheResolver {
    /// Create a resolver. Fails if the allocator's id range is not
    /// collision-free under `table`.
    pub fn new(
        allocator: Arc<MuxIdAllocator>,
        table: KindTable,
        registry: Arc<dyn TypeRegistry>,
    ) -> Result<Self> {
        allocator.config().validate(&table)?;
        Ok(Self {
            allocator,
            table,
            registry,
        })
    }

    /// Get the kind table.
    pub fn table(&self) -> &KindTable {
        &self.table
    }

    /// Get the allocator.
    pub fn allocator(&self) -> &Arc<MuxIdAllocator> {
        &self.allocator
    }

    /// Take a tenant reference and describe the cache of `kind`.
    ///
    /// If the description cannot be built the reference is given back
    /// before the error is returned. When giving it back fails too, the
    /// original error is still returned and the leak is counted in
    /// [`crate::metrics::MuxMetrics::leaked_references`].
    pub async fn start_cache(&self, tenant: &TenantId, kind: CacheKind) -> Result<TenantCacheConfig> {
        let tenant_mux_id = self.allocator.start(tenant).await?;

        match self.describe(tenant, kind, tenant_mux_id) {
            Ok(config) => {
                info!(
                    cache = %config.cache_name,
                    tenant_mux_id,
                    mux_id = config.mux_id,
                    "Resolved tenant cache"
                );
                Ok(config)
            }
            Err(e) => {
                warn!(tenant = %tenant, kind = %kind, error = %e, "Tenant cache start failed, releasing reference");
                if let Err(undo) = self.allocator.stop(tenant).await {
                    self.allocator.metrics().leaked_references.inc();
                    error!(tenant = %tenant, error = %undo, "Failed to release tenant reference, reference leaked");
                }
                Err(e)
            }
        }
    }

    /// Give back the tenant reference taken for the cache of `kind`.
    pub async fn stop_cache(&self, tenant: &TenantId, kind: CacheKind) -> Result<Release> {
        let release = self.allocator.stop(tenant).await?;
        debug!(cache = %cache_name(tenant, kind), ?release, "Stopped tenant cache");
        Ok(release)
    }

    /// Mux id of a running tenant's cache of `kind`.
    pub async fn mux_id(&self, tenant: &TenantId, kind: CacheKind) -> Result<MuxId> {
        let tenant_mux_id = self.allocator.get(tenant).await?;
        self.table
            .mux_id(kind, tenant_mux_id, self.allocator.config().indexing_cache_count)
    }

    fn describe(
        &self,
        tenant: &TenantId,
        kind: CacheKind,
        tenant_mux_id: TenantMuxId,
    ) -> Result<TenantCacheConfig> {
        let mux_id = self.table.mux_id(
            kind,
            tenant_mux_id,
            self.allocator.config().indexing_cache_count,
        )?;

        let indexed_types = self
            .table
            .spec(kind)
            .indexed_types
            .iter()
            .map(|name| {
                self.registry
                    .resolve_type(name)
                    .ok_or_else(|| Error::UnknownType(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TenantCacheConfig {
            tenant: tenant.clone(),
            kind,
            cache_name: cache_name(tenant, kind),
            tenant_mux_id,
            mux_id,
            indexed_types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheIndexingSpec, StaticTypeRegistry};
    use crate::config::MuxConfig;

    fn resolver_with(registry: StaticTypeRegistry) -> TenantCacheResolver {
        TenantCacheResolver::new(
            Arc::new(MuxIdAllocator::in_memory(MuxConfig::default())),
            KindTable::standard(),
            Arc::new(registry),
        )
        .unwrap()
    }

    #[test]
    fn test_cache_name() {
        assert_eq!(cache_name(&"app".into(), CacheKind::ProspectiveSearch), "app_prospective_search");
    }

    #[tokio::test]
    async fn test_start_cache_describes_cache() {
        let resolver = resolver_with(StaticTypeRegistry::standard());
        let tenant = TenantId::from("app");

        let config = resolver.start_cache(&tenant, CacheKind::Logs).await.unwrap();
        assert_eq!(config.cache_name, "app_logs");
        assert_eq!(config.tenant_mux_id, 2);
        assert_eq!(config.mux_id, 2);
        let names: Vec<_> = config.indexed_types.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(names, vec!["AppLogLine", "RequestLogs"]);

        let search = resolver.start_cache(&tenant, CacheKind::Search).await.unwrap();
        assert_eq!(search.tenant_mux_id, 2);
        assert_eq!(search.mux_id, -3);
        assert_eq!(resolver.mux_id(&tenant, CacheKind::Search).await.unwrap(), -3);
    }

    #[tokio::test]
    async fn test_unknown_type_gives_reference_back() {
        let resolver = resolver_with(StaticTypeRegistry::new().with_type("Entity", "entities"));
        let tenant = TenantId::from("app");

        resolver.start_cache(&tenant, CacheKind::Default).await.unwrap();
        let err = resolver.start_cache(&tenant, CacheKind::Tasks).await.unwrap_err();
        assert!(matches!(err, Error::UnknownType(name) if name == "Task"));

        let record = resolver.allocator().record(&tenant).await.unwrap().unwrap();
        assert_eq!(record.ref_count, 1);
    }

    #[tokio::test]
    async fn test_stop_cache_releases() {
        let resolver = resolver_with(StaticTypeRegistry::standard());
        let tenant = TenantId::from("app");

        resolver.start_cache(&tenant, CacheKind::Channel).await.unwrap();
        assert_eq!(
            resolver.stop_cache(&tenant, CacheKind::Channel).await.unwrap(),
            Release::Released { mux_id: 2 }
        );
        assert!(matches!(
            resolver.mux_id(&tenant, CacheKind::Channel).await,
            Err(Error::TenantNotAllocated(_))
        ));
    }

    #[test]
    fn test_rejects_colliding_table() {
        let table = KindTable::standard().with_spec(CacheKind::Channel, CacheIndexingSpec::new(1, 0));
        let result = TenantCacheResolver::new(
            Arc::new(MuxIdAllocator::in_memory(MuxConfig::default())),
            table,
            Arc::new(StaticTypeRegistry::standard()),
        );
        assert!(matches!(result, Err(Error::MuxIdCollision { .. })));
    }
}
