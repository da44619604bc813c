//! End-to-end tenant cache scenarios.
//!
//! A host starts every cache kind for a tenant through the resolver on one
//! node, routes that tenant's entity keys with the shard router, and tears
//! the caches down again, possibly from another node.

#[cfg(test)]
mod tests {
    use crate::cache::{CacheKind, StaticTypeRegistry, TenantCacheConfig};
    use crate::config::RouterConfig;
    use crate::error::Error;
    use crate::sharding::{encode_key, ShardRouter, DEFAULT_SEPARATOR};
    use crate::testing::{init_tracing, TestCluster};
    use crate::types::{Release, TenantId};
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Eq)]
    struct IndexManager {
        name: String,
    }

    impl IndexManager {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
            })
        }
    }

    async fn start_all(
        cluster: &TestCluster,
        node: usize,
        tenant: &TenantId,
    ) -> Vec<TenantCacheConfig> {
        let resolver = cluster
            .resolver(node, Arc::new(StaticTypeRegistry::standard()))
            .unwrap();
        let mut configs = Vec::new();
        for kind in CacheKind::ALL {
            configs.push(resolver.start_cache(tenant, kind).await.unwrap());
        }
        configs
    }

    #[tokio::test]
    async fn test_every_kind_gets_its_own_mux_id() {
        init_tracing();
        let cluster = TestCluster::new(2);
        let tenant = TenantId::from("guestbook");

        let configs = start_all(&cluster, 0, &tenant).await;

        let slots: HashSet<_> = configs.iter().map(|c| c.tenant_mux_id).collect();
        assert_eq!(slots.len(), 1);

        let mux_ids: HashSet<_> = configs.iter().map(|c| c.mux_id).collect();
        assert_eq!(mux_ids.len(), CacheKind::COUNT);

        let names: Vec<_> = configs.iter().map(|c| c.cache_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "guestbook_default",
                "guestbook_search",
                "guestbook_prospective_search",
                "guestbook_tasks",
                "guestbook_logs",
                "guestbook_channel",
            ]
        );

        let record = cluster.node(1).record(&tenant).await.unwrap().unwrap();
        assert_eq!(record.ref_count, CacheKind::COUNT as u32);
    }

    #[tokio::test]
    async fn test_mux_ids_agree_across_nodes() {
        let cluster = TestCluster::new(3);
        let tenant = TenantId::from("app");
        let configs = start_all(&cluster, 0, &tenant).await;

        for node in 1..3 {
            let resolver = cluster
                .resolver(node, Arc::new(StaticTypeRegistry::standard()))
                .unwrap();
            for config in &configs {
                assert_eq!(
                    resolver.mux_id(&tenant, config.kind).await.unwrap(),
                    config.mux_id
                );
            }
        }
    }

    #[tokio::test]
    async fn test_tenants_torn_down_from_another_node() {
        let cluster = TestCluster::new(2);
        let tenant = TenantId::from("app");
        let configs = start_all(&cluster, 0, &tenant).await;
        let slot = configs[0].tenant_mux_id;

        let resolver = cluster
            .resolver(1, Arc::new(StaticTypeRegistry::standard()))
            .unwrap();
        let mut releases = Vec::new();
        for kind in CacheKind::ALL {
            releases.push(resolver.stop_cache(&tenant, kind).await.unwrap());
        }

        assert_eq!(releases.last(), Some(&Release::Released { mux_id: slot }));
        assert_eq!(releases[0].remaining(), CacheKind::COUNT as u32 - 1);
        assert!(matches!(
            resolver.mux_id(&tenant, CacheKind::Default).await,
            Err(Error::TenantNotAllocated(_))
        ));
        assert_eq!(
            resolver.stop_cache(&tenant, CacheKind::Default).await.unwrap(),
            Release::NotAllocated
        );
    }

    #[tokio::test]
    async fn test_routes_tenant_keys_to_tenant_shards() {
        let cluster = TestCluster::new(1);
        let tenants = [TenantId::from("tenantA"), TenantId::from("tenantB")];
        for tenant in &tenants {
            start_all(&cluster, 0, tenant).await;
        }

        let properties = format!(
            "index_name.1={}\nindex_name.2={}\n",
            tenants[0], tenants[1]
        );
        let router = ShardRouter::from_properties_text(
            vec![
                IndexManager::new("default"),
                IndexManager::new("idx-a"),
                IndexManager::new("idx-b"),
            ],
            &properties,
            RouterConfig::default(),
        )
        .unwrap();

        let key_a = encode_key("Greeting(1)", tenants[0].as_str(), DEFAULT_SEPARATOR);
        let key_b = encode_key("Greeting(1)", tenants[1].as_str(), DEFAULT_SEPARATOR);
        assert_eq!(router.addition(&key_a).unwrap().name, "idx-a");
        assert_eq!(router.deletion(&key_b).unwrap()[0].name, "idx-b");
        assert_eq!(router.addition("Greeting(1)").unwrap().name, "default");
        assert_eq!(router.query(&[tenants[1].as_str()]).unwrap()[0].name, "idx-b");

        let unknown = encode_key("Greeting(1)", "tenantC", DEFAULT_SEPARATOR);
        assert!(matches!(
            router.addition(&unknown),
            Err(Error::ShardNotFound(name)) if name == "tenantC"
        ));
    }

    #[tokio::test]
    async fn test_missing_type_leaves_no_reference() {
        let cluster = TestCluster::new(1);
        let tenant = TenantId::from("app");
        let resolver = cluster
            .resolver(0, Arc::new(StaticTypeRegistry::new().with_type("Entity", "entity")))
            .unwrap();

        let err = resolver.start_cache(&tenant, CacheKind::Search).await.unwrap_err();
        assert!(matches!(err, Error::UnknownType(name) if name == "Document"));
        assert!(cluster.node(0).record(&tenant).await.unwrap().is_none());
        assert_eq!(cluster.node(0).metrics().releases.get(), 1);
    }

    #[tokio::test]
    async fn test_failed_give_back_is_counted_as_leak() {
        init_tracing();
        let cluster = TestCluster::new(1);
        let tenant = TenantId::from("app");
        let resolver = cluster
            .resolver(0, Arc::new(StaticTypeRegistry::new().with_type("Entity", "entity")))
            .unwrap();

        // the start commits, the give-back does not
        cluster.store.fail_save_after(1);
        let err = resolver.start_cache(&tenant, CacheKind::Search).await.unwrap_err();
        assert!(matches!(err, Error::UnknownType(name) if name == "Document"));

        let metrics = cluster.node(0).metrics().snapshot();
        assert_eq!(metrics.leaked_references, 1);
        assert_eq!(metrics.releases, 0);

        let record = cluster.node(0).record(&tenant).await.unwrap().unwrap();
        assert_eq!(record.ref_count, 1);
    }
}
