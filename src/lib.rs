//! Shard routing and mux-id allocation for multi-tenant caches.
//!
//! This crate provides the two pieces a multi-tenant host needs to run
//! many tenants' caches and indexes side by side:
//! - **Shard routing** of entity keys and queries to per-tenant index shards
//! - **Mux-id allocation** giving every tenant cache a distinct id on one
//!   shared group-communication channel
//!
//! # Features
//!
//! - Key-suffix routing with a default shard for untagged keys
//! - Cluster-wide, reference-counted tenant slots behind a single lock
//! - Transactional generator updates: a failed commit leaves no trace
//! - Collision checking of the cache kind table at startup
//! - In-memory and file-backed generator stores
//!
//! # Example
//!
//! ```rust,no_run
//! use tenant_cache_mux::{
//!     CacheKind, IndexNameProperties, KindTable, MuxConfig, MuxIdAllocator, RouterConfig,
//!     ShardRouter, StaticTypeRegistry, TenantCacheResolver, TenantId,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Route entity keys to per-tenant shards
//!     let names = IndexNameProperties::new().with_name(1, "tenantA");
//!     let router = ShardRouter::new(
//!         vec![Arc::new("default-index"), Arc::new("tenant-a-index")],
//!         &names,
//!         RouterConfig::default(),
//!     )?;
//!     assert_eq!(*router.addition("Order(1)!!tenantA")?, "tenant-a-index");
//!
//!     // Allocate mux ids for a tenant's caches
//!     let allocator = Arc::new(MuxIdAllocator::in_memory(MuxConfig::default()));
//!     let resolver = TenantCacheResolver::new(
//!         allocator,
//!         KindTable::standard(),
//!         Arc::new(StaticTypeRegistry::standard()),
//!     )?;
//!
//!     let tenant = TenantId::from("tenantA");
//!     let search = resolver.start_cache(&tenant, CacheKind::Search).await?;
//!     println!("{} uses mux id {}", search.cache_name, search.mux_id);
//!
//!     resolver.stop_cache(&tenant, CacheKind::Search).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Host                         │
//! │  request path          cache lifecycle       │
//! └─────────────────────────────────────────────┘
//!         │                        │
//!         ▼                        ▼
//! ┌───────────────┐      ┌─────────────────────┐
//! │  ShardRouter  │      │ TenantCacheResolver │
//! │  addition     │      │  start_cache        │
//! │  deletion     │      │  stop_cache         │
//! │  query        │      │  mux_id             │
//! └───────────────┘      └─────────────────────┘
//!                           │               │
//!                           ▼               ▼
//!                  ┌────────────────┐ ┌────────────┐
//!                  │ MuxIdAllocator │ │ KindTable  │
//!                  └────────────────┘ └────────────┘
//!                     │          │
//!                     ▼          ▼
//!              ┌────────────┐ ┌────────────────┐
//!              │LockManager │ │ GeneratorStore │
//!              └────────────┘ └────────────────┘
//! ```
//!
//! # Consistency Model
//!
//! - **Routing**: immutable after construction, no locking on lookups
//! - **Allocation**: every `start`/`get`/`stop` on every node serializes on
//!   the lock of one generator key; the stored record only changes on commit
//! - **Mux ids**: a pure function of the tenant slot and the kind table,
//!   identical on every node

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mux;
pub mod sharding;
pub mod testing;
pub mod types;

pub use cache::{
    CacheIndexingSpec, CacheKind, KindTable, StaticTypeRegistry, TenantCacheConfig,
    TenantCacheResolver, TypeHandle, TypeRegistry,
};
pub use config::{MuxConfig, ReclaimPolicy, RouterConfig, GENERATOR_KEY, INDEX_NAME_PREFIX};
pub use error::{Error, Result, StorageError};
pub use metrics::{MuxMetrics, MuxMetricsSnapshot, RoutingMetrics, RoutingMetricsSnapshot};
pub use mux::{
    compute_mux_id, FileGeneratorStore, GeneratorRecord, GeneratorStore, InMemoryGeneratorStore,
    LockGuard, LockManager, LockStatus, MemoryLockManager, MuxIdAllocator,
};
pub use sharding::{
    decode_shard_name, encode_key, IndexNameProperties, ShardRouter, DEFAULT_SEPARATOR,
};
pub use types::{MuxId, Release, TenantId, TenantMuxId, TenantMuxRecord};
