//! Testing utilities for mux-id allocation across nodes.
//!
//! Nodes of a cluster are separate [`MuxIdAllocator`] instances sharing
//! one lock table and one generator store, the same way production nodes
//! share the cluster lock service and the replicated record.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TestCluster                          │
//! │                                                              │
//! │   ┌──────────┐    ┌──────────┐    ┌──────────┐               │
//! │   │ node 1   │    │ node 2   │    │ node 3   │  allocators   │
//! │   └────┬─────┘    └────┬─────┘    └────┬─────┘               │
//! │        └───────────────┼───────────────┘                     │
//! │                        ▼                                     │
//! │   ┌───────────────────────┐   ┌──────────────────────────┐   │
//! │   │  MemoryLockManager    │   │  FailingGeneratorStore   │   │
//! │   │  (shared lock table)  │   │  (fault injection)       │   │
//! │   └───────────────────────┘   └──────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let cluster = TestCluster::new(3);
//! let id = cluster.node(0).start(&"app".into()).await?;
//! assert_eq!(cluster.node(2).get(&"app".into()).await?, id);
//!
//! cluster.store.fail_next_save();
//! assert!(cluster.node(1).start(&"other".into()).await.is_err());
//! ```

mod faults;

mod tenant_cache_tests;

pub use faults::{FailingGeneratorStore, FaultStats};

use crate::cache::{KindTable, TenantCacheResolver, TypeRegistry};
use crate::config::MuxConfig;
use crate::error::Result;
use crate::mux::{GeneratorRecord, MemoryLockManager, MuxIdAllocator};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A set of allocator nodes over one shared backend.
#[derive(Debug)]
pub struct TestCluster {
    /// Allocator per node.
    pub nodes: Vec<Arc<MuxIdAllocator>>,

    /// Lock table shared by all nodes.
    pub locks: MemoryLockManager,

    /// Generator store shared by all nodes.
    pub store: Arc<FailingGeneratorStore>,

    /// When the test started.
    pub started_at: Instant,
}

impl TestCluster {
    /// Create a cluster with the default allocator config.
    pub fn new(node_count: usize) -> Self {
        Self::with_config(node_count, MuxConfig::default())
    }

    /// Create a cluster whose nodes all use `config`.
    pub fn with_config(node_count: usize, config: MuxConfig) -> Self {
        let locks = MemoryLockManager::new();
        let store = Arc::new(FailingGeneratorStore::in_memory());

        let nodes = (0..node_count)
            .map(|_| {
                Arc::new(MuxIdAllocator::new(
                    config.clone(),
                    Arc::new(locks.clone()),
                    store.clone(),
                ))
            })
            .collect();

        Self {
            nodes,
            locks,
            store,
            started_at: Instant::now(),
        }
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get a node by position.
    pub fn node(&self, index: usize) -> &Arc<MuxIdAllocator> {
        &self.nodes[index]
    }

    /// Build a cache resolver on top of one node.
    pub fn resolver(
        &self,
        index: usize,
        registry: Arc<dyn TypeRegistry>,
    ) -> Result<TenantCacheResolver> {
        TenantCacheResolver::new(self.nodes[index].clone(), KindTable::standard(), registry)
    }

    /// Read the shared generator record through the first node.
    pub async fn snapshot(&self) -> Result<GeneratorRecord> {
        self.nodes[0].snapshot().await
    }

    /// Sum of failures with `label` over all nodes.
    pub fn errors_of(&self, label: &str) -> u64 {
        self.nodes
            .iter()
            .map(|n| n.metrics().snapshot().errors_of(label))
            .sum()
    }

    /// Get elapsed time since the cluster was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Install a test log subscriber once per process.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tenant_cache_mux=debug")
        .with_test_writer()
        .try_init();
}
