//! Two nodes bringing tenant caches online over a shared, file-backed
//! generator record, plus key routing to the tenants' index shards.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example tenant_caches

use std::sync::Arc;
use tenant_cache_mux::{
    encode_key, CacheKind, FileGeneratorStore, KindTable, MemoryLockManager, MuxConfig,
    MuxIdAllocator, RouterConfig, ShardRouter, StaticTypeRegistry, TenantCacheResolver, TenantId,
    DEFAULT_SEPARATOR,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("tenant_cache_mux=debug,info")
        .init();

    let dir = tempfile::tempdir()?;
    let locks = MemoryLockManager::new();
    let store = Arc::new(FileGeneratorStore::new(dir.path()).await?);
    let registry = Arc::new(StaticTypeRegistry::standard());

    // Two nodes sharing the lock table and the record on disk
    let mut resolvers = Vec::new();
    for _ in 0..2 {
        let allocator = Arc::new(MuxIdAllocator::new(
            MuxConfig::default(),
            Arc::new(locks.clone()),
            store.clone(),
        ));
        resolvers.push(TenantCacheResolver::new(
            allocator,
            KindTable::standard(),
            registry.clone(),
        )?);
    }

    let tenants = [TenantId::from("guestbook"), TenantId::from("shop")];

    println!("--- Starting caches ---");
    for (i, tenant) in tenants.iter().enumerate() {
        let resolver = &resolvers[i % resolvers.len()];
        for kind in CacheKind::ALL {
            let config = resolver.start_cache(tenant, kind).await?;
            println!(
                "  {:<28} slot {:>3}  mux id {:>5}  types {:?}",
                config.cache_name,
                config.tenant_mux_id,
                config.mux_id,
                config
                    .indexed_types
                    .iter()
                    .map(|t| t.name.as_ref())
                    .collect::<Vec<_>>()
            );
        }
    }

    println!("\n--- Routing keys ---");
    let properties = format!("index_name.1={}\nindex_name.2={}\n", tenants[0], tenants[1]);
    let router = ShardRouter::from_properties_text(
        vec![
            Arc::new("default-index"),
            Arc::new("guestbook-index"),
            Arc::new("shop-index"),
        ],
        &properties,
        RouterConfig::default(),
    )?;

    let keys = [
        encode_key("Greeting(1)", tenants[0].as_str(), DEFAULT_SEPARATOR),
        encode_key("Order(7)", tenants[1].as_str(), DEFAULT_SEPARATOR),
        "Global(3)".to_string(),
    ];
    for key in &keys {
        println!("  {:<24} -> {}", key, router.addition(key)?);
    }

    println!("\n--- Stopping caches ---");
    for tenant in &tenants {
        for kind in CacheKind::ALL {
            let release = resolvers[1].stop_cache(tenant, kind).await?;
            if release.remaining() == 0 {
                println!("  {} released: {:?}", tenant, release);
            }
        }
    }

    let metrics = resolvers[0].allocator().metrics().snapshot();
    println!("\nNode 1 metrics: {:?}", metrics);
    println!("Routing metrics: {:?}", router.metrics().snapshot());

    Ok(())
}
