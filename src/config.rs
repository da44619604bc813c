//! Configuration types for shard routing and mux-id allocation.

use crate::cache::KindTable;
use crate::error::{Error, Result};
use crate::sharding::key::DEFAULT_SEPARATOR;
use crate::types::TenantMuxId;
use std::time::Duration;

/// Prefix of the properties naming non-default shards (`index_name.<i>`).
pub const INDEX_NAME_PREFIX: &str = "index_name.";

/// Well-known key of the cluster-wide generator record.
pub const GENERATOR_KEY: &str = "__mux_id_generator__";

/// Configuration for the shard router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Token separating the entity id from the trailing shard name.
    pub separator: String,

    /// Prefix of the shard name properties.
    pub index_name_prefix: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            index_name_prefix: INDEX_NAME_PREFIX.to_string(),
        }
    }
}

impl RouterConfig {
    /// Create a router config with the given separator.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            ..Default::default()
        }
    }

    /// Set the shard name property prefix.
    pub fn with_index_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_name_prefix = prefix.into();
        self
    }

    /// Check the config is usable.
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(Error::Config("separator must not be empty".to_string()));
        }
        Ok(())
    }
}

/// How tenant mux ids are handed out after a tenant is fully stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReclaimPolicy {
    /// Never-used ids first. Ids of fully stopped tenants are only reused,
    /// lowest first, once the range is used up.
    #[default]
    WhenExhausted,

    /// Ids of fully stopped tenants are reused, lowest first, before any
    /// never-used id.
    LowestReleased,
}

/// Configuration for the mux-id allocator.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Key of the generator record, also the lock resource.
    pub generator_key: String,

    /// How long to wait for the generator lock.
    pub lock_timeout: Duration,

    /// Number of indexable cache kinds sharing the multiplexing space.
    pub indexing_cache_count: u16,

    /// First tenant mux id handed out.
    ///
    /// With the standard kind table, id 1 maps both LOGS and CHANNEL to 0.
    pub first_mux_id: TenantMuxId,

    /// Largest tenant mux id handed out.
    pub max_mux_id: TenantMuxId,

    /// Id reuse policy.
    pub reclaim: ReclaimPolicy,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            generator_key: GENERATOR_KEY.to_string(),
            lock_timeout: Duration::from_secs(10),
            indexing_cache_count: 4,
            first_mux_id: 2,
            max_mux_id: 1000,
            reclaim: ReclaimPolicy::WhenExhausted,
        }
    }
}

impl MuxConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generator record key.
    pub fn with_generator_key(mut self, key: impl Into<String>) -> Self {
        self.generator_key = key.into();
        self
    }

    /// Set the lock wait timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the indexing cache count.
    pub fn with_indexing_cache_count(mut self, count: u16) -> Self {
        self.indexing_cache_count = count;
        self
    }

    /// Set the inclusive range of tenant mux ids.
    pub fn with_id_range(mut self, first: TenantMuxId, max: TenantMuxId) -> Self {
        self.first_mux_id = first;
        self.max_mux_id = max;
        self
    }

    /// Set the id reuse policy.
    pub fn with_reclaim(mut self, reclaim: ReclaimPolicy) -> Self {
        self.reclaim = reclaim;
        self
    }

    /// Check the config and verify the kind table over the whole id range.
    pub fn validate(&self, table: &KindTable) -> Result<()> {
        if self.generator_key.is_empty() {
            return Err(Error::Config("generator key must not be empty".to_string()));
        }
        if self.lock_timeout.is_zero() {
            return Err(Error::Config("lock timeout must be positive".to_string()));
        }
        if self.first_mux_id == 0 {
            return Err(Error::Config("first mux id must be at least 1".to_string()));
        }
        if self.first_mux_id > self.max_mux_id {
            return Err(Error::Config(format!(
                "first mux id {} exceeds max mux id {}",
                self.first_mux_id, self.max_mux_id
            )));
        }
        table.verify(self.first_mux_id..=self.max_mux_id, self.indexing_cache_count)
    }
}
