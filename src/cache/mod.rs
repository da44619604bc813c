//! Per-tenant cache kinds and their multiplexing constants.
//!
//! Every tenant application gets its own instance of each [`CacheKind`].
//! All of those caches share one group-communication channel, so each
//! cache needs a distinct mux id. The id is derived from the tenant's slot
//! (handed out by [`crate::mux::MuxIdAllocator`]) and the kind's
//! `(prefix, offset)` pair:
//!
//! ```text
//! mux_id = (indexing_cache_count / 2) * tenant_mux_id * prefix + offset
//! ```
//!
//! # Standard table
//!
//! | kind               | prefix | offset |
//! |--------------------|--------|--------|
//! | default            |  1     | -1     |
//! | search             | -1     |  1     |
//! | prospective_search | -1     |  0     |
//! | tasks              |  1     |  0     |
//! | logs               |  1     | -2     |
//! | channel            | -1     |  2     |
//!
//! The pairs are fixed constants; [`KindTable::verify`] checks that they
//! stay collision-free over a range of tenant slots.

pub mod registry;
pub mod resolver;

pub use registry::{StaticTypeRegistry, TypeHandle, TypeRegistry};
pub use resolver::{TenantCacheConfig, TenantCacheResolver};

use crate::error::{Error, Result};
use crate::mux::compute_mux_id;
use crate::types::{MuxId, TenantMuxId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::RangeInclusive;

/// Purpose a tenant cache serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Default entity store.
    Default,
    /// Full-text search index.
    Search,
    /// Prospective-search subscriptions.
    ProspectiveSearch,
    /// Task queue.
    Tasks,
    /// Request and application logs.
    Logs,
    /// Pub/sub channel.
    Channel,
}

impl CacheKind {
    /// Number of kinds.
    pub const COUNT: usize = 6;

    /// All kinds, in declaration order.
    pub const ALL: [CacheKind; CacheKind::COUNT] = [
        CacheKind::Default,
        CacheKind::Search,
        CacheKind::ProspectiveSearch,
        CacheKind::Tasks,
        CacheKind::Logs,
        CacheKind::Channel,
    ];

    /// Stable lowercase name, used in cache names.
    pub fn name(&self) -> &'static str {
        match self {
            CacheKind::Default => "default",
            CacheKind::Search => "search",
            CacheKind::ProspectiveSearch => "prospective_search",
            CacheKind::Tasks => "tasks",
            CacheKind::Logs => "logs",
            CacheKind::Channel => "channel",
        }
    }

    /// Look a kind up by its name.
    pub fn from_name(name: &str) -> Option<CacheKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Multiplexing constants and indexed types of one cache kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndexingSpec {
    /// Sign applied to the tenant slot, one of -1, 0, 1.
    pub prefix: i8,

    /// Constant added after scaling.
    pub offset: i8,

    /// Names of the types indexed in this cache.
    pub indexed_types: BTreeSet<String>,
}

impl CacheIndexingSpec {
    /// Create a spec without indexed types.
    pub fn new(prefix: i8, offset: i8) -> Self {
        Self {
            prefix,
            offset,
            indexed_types: BTreeSet::new(),
        }
    }

    /// Add indexed type names. Duplicates collapse.
    pub fn with_indexed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexed_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Mux id of this kind for a tenant slot.
    pub fn mux_id(&self, tenant_mux_id: TenantMuxId, indexing_cache_count: u16) -> Result<MuxId> {
        compute_mux_id(tenant_mux_id, self.prefix, self.offset, indexing_cache_count)
    }
}

/// Cache kind to indexing spec table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindTable {
    specs: [CacheIndexingSpec; CacheKind::COUNT],
}

impl KindTable {
    /// The standard table used by every deployment.
    pub fn standard() -> Self {
        Self {
            specs: [
                CacheIndexingSpec::new(1, -1).with_indexed_types(["Entity"]),
                CacheIndexingSpec::new(-1, 1).with_indexed_types(["Document"]),
                CacheIndexingSpec::new(-1, 0).with_indexed_types(["Subscription"]),
                CacheIndexingSpec::new(1, 0).with_indexed_types(["Task"]),
                CacheIndexingSpec::new(1, -2).with_indexed_types(["RequestLogs", "AppLogLine"]),
                CacheIndexingSpec::new(-1, 2),
            ],
        }
    }

    /// Replace the spec of one kind.
    pub fn with_spec(mut self, kind: CacheKind, spec: CacheIndexingSpec) -> Self {
        self.specs[kind.index()] = spec;
        self
    }

    /// Get the spec of a kind.
    pub fn spec(&self, kind: CacheKind) -> &CacheIndexingSpec {
        &self.specs[kind.index()]
    }

    /// Iterate over all kinds and their specs.
    pub fn iter(&self) -> impl Iterator<Item = (CacheKind, &CacheIndexingSpec)> {
        CacheKind::ALL.into_iter().zip(self.specs.iter())
    }

    /// Mux id of a kind for a tenant slot.
    pub fn mux_id(
        &self,
        kind: CacheKind,
        tenant_mux_id: TenantMuxId,
        indexing_cache_count: u16,
    ) -> Result<MuxId> {
        self.spec(kind).mux_id(tenant_mux_id, indexing_cache_count)
    }

    /// Check that no two kinds share a mux id for any tenant slot in `range`.
    ///
    /// Also rejects prefixes outside {-1, 0, 1} and results outside `i16`.
    pub fn verify(
        &self,
        range: RangeInclusive<TenantMuxId>,
        indexing_cache_count: u16,
    ) -> Result<()> {
        for (kind, spec) in self.iter() {
            if !(-1..=1).contains(&spec.prefix) {
                return Err(Error::Config(format!(
                    "prefix of {} must be -1, 0 or 1, got {}",
                    kind, spec.prefix
                )));
            }
        }

        for tenant_mux_id in range {
            let mut seen: HashMap<MuxId, CacheKind> = HashMap::with_capacity(CacheKind::COUNT);
            for (kind, spec) in self.iter() {
                let mux_id = spec.mux_id(tenant_mux_id, indexing_cache_count)?;
                if let Some(&first) = seen.get(&mux_id) {
                    return Err(Error::MuxIdCollision {
                        first,
                        second: kind,
                        tenant_mux_id,
                        mux_id,
                    });
                }
                seen.insert(mux_id, kind);
            }
        }
        Ok(())
    }
}

impl Default for KindTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in CacheKind::ALL {
            assert_eq!(CacheKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CacheKind::from_name("blobstore"), None);
        assert_eq!(CacheKind::ProspectiveSearch.to_string(), "prospective_search");
    }

    #[test]
    fn test_standard_table_constants() {
        let table = KindTable::standard();
        let pairs: Vec<(i8, i8)> = table.iter().map(|(_, s)| (s.prefix, s.offset)).collect();
        assert_eq!(
            pairs,
            vec![(1, -1), (-1, 1), (-1, 0), (1, 0), (1, -2), (-1, 2)]
        );
    }

    #[test]
    fn test_standard_table_is_collision_free_from_two() {
        let table = KindTable::standard();
        assert!(table.verify(2..=1000, 4).is_ok());
    }

    #[test]
    fn test_tenant_slot_one_collides_logs_and_channel() {
        let table = KindTable::standard();
        assert_eq!(table.mux_id(CacheKind::Logs, 1, 4).unwrap(), 0);
        assert_eq!(table.mux_id(CacheKind::Channel, 1, 4).unwrap(), 0);

        let err = table.verify(1..=1, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::MuxIdCollision {
                first: CacheKind::Logs,
                second: CacheKind::Channel,
                tenant_mux_id: 1,
                mux_id: 0,
            }
        ));
    }

    #[test]
    fn test_neighbouring_slots_overlap() {
        // uniqueness holds per tenant slot only
        let table = KindTable::standard();
        for t in 3..=1000u16 {
            assert_eq!(
                table.mux_id(CacheKind::Logs, t, 4).unwrap(),
                table.mux_id(CacheKind::Tasks, t - 1, 4).unwrap()
            );
            assert_eq!(
                table.mux_id(CacheKind::Channel, t, 4).unwrap(),
                table.mux_id(CacheKind::ProspectiveSearch, t - 1, 4).unwrap()
            );
        }
    }

    #[test]
    fn test_indexed_types_deduplicate() {
        let spec = CacheIndexingSpec::new(1, 0).with_indexed_types(["Task", "Lease", "Task"]);
        assert_eq!(spec.indexed_types.len(), 2);
        assert!(spec.indexed_types.contains("Lease"));
    }

    #[test]
    fn test_verify_rejects_bad_prefix() {
        let table = KindTable::standard().with_spec(CacheKind::Tasks, CacheIndexingSpec::new(2, 0));
        assert!(matches!(table.verify(2..=3, 4), Err(Error::Config(_))));
    }

    #[test]
    fn test_verify_detects_custom_collision() {
        // tasks now equals default for every slot
        let table = KindTable::standard().with_spec(CacheKind::Tasks, CacheIndexingSpec::new(1, -1));
        let err = table.verify(2..=2, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::MuxIdCollision {
                first: CacheKind::Default,
                second: CacheKind::Tasks,
                ..
            }
        ));
    }
}
