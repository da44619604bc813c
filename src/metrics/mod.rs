//! Metrics for shard routing and mux-id allocation.
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        RoutingMetrics        │   │          MuxMetrics          │
//! │ - additions / deletions      │   │ - starts / stops / lookups   │
//! │ - queries                    │   │ - allocations / releases     │
//! │ - default routes             │   │ - rollbacks / leaked refs    │
//! │ - misses                     │   │ - active tenants (gauge)     │
//! │                              │   │ - errors by type             │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```

mod counters;
mod gauges;

pub use counters::{Counter, LabeledCounter};
pub use gauges::Gauge;

/// Counters kept by a [`crate::sharding::ShardRouter`].
#[derive(Debug)]
pub struct RoutingMetrics {
    /// Addition lookups.
    pub additions: Counter,
    /// Deletion lookups.
    pub deletions: Counter,
    /// Query lookups.
    pub queries: Counter,
    /// Lookups answered by the default shard.
    pub default_routes: Counter,
    /// Lookups naming an unregistered shard.
    pub misses: Counter,
}

impl RoutingMetrics {
    /// Create zeroed routing metrics.
    pub fn new() -> Self {
        Self {
            additions: Counter::new("shard_router_additions_total"),
            deletions: Counter::new("shard_router_deletions_total"),
            queries: Counter::new("shard_router_queries_total"),
            default_routes: Counter::new("shard_router_default_routes_total"),
            misses: Counter::new("shard_router_misses_total"),
        }
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> RoutingMetricsSnapshot {
        RoutingMetricsSnapshot {
            additions: self.additions.get(),
            deletions: self.deletions.get(),
            queries: self.queries.get(),
            default_routes: self.default_routes.get(),
            misses: self.misses.get(),
        }
    }
}

impl Default for RoutingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`RoutingMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingMetricsSnapshot {
    pub additions: u64,
    pub deletions: u64,
    pub queries: u64,
    pub default_routes: u64,
    pub misses: u64,
}

/// Counters kept by a [`crate::mux::MuxIdAllocator`].
#[derive(Debug)]
pub struct MuxMetrics {
    /// Successful `start` calls.
    pub starts: Counter,
    /// Successful `stop` calls.
    pub stops: Counter,
    /// Successful `get` calls.
    pub lookups: Counter,
    /// Tenant ids handed out.
    pub allocations: Counter,
    /// Tenant records removed at zero references.
    pub releases: Counter,
    /// Transactions rolled back.
    pub rollbacks: Counter,
    /// Tenant references a caller failed to give back after an aborted start.
    pub leaked_references: Counter,
    /// Tenants holding an id as of the last commit seen by this node.
    pub active_tenants: Gauge,
    /// Failed calls by error type.
    pub errors: LabeledCounter,
}

impl MuxMetrics {
    /// Create zeroed allocator metrics.
    pub fn new() -> Self {
        Self {
            starts: Counter::new("mux_starts_total"),
            stops: Counter::new("mux_stops_total"),
            lookups: Counter::new("mux_lookups_total"),
            allocations: Counter::new("mux_allocations_total"),
            releases: Counter::new("mux_releases_total"),
            rollbacks: Counter::new("mux_rollbacks_total"),
            leaked_references: Counter::new("mux_leaked_references_total"),
            active_tenants: Gauge::new(),
            errors: LabeledCounter::new("mux_errors_total", "type"),
        }
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> MuxMetricsSnapshot {
        MuxMetricsSnapshot {
            starts: self.starts.get(),
            stops: self.stops.get(),
            lookups: self.lookups.get(),
            allocations: self.allocations.get(),
            releases: self.releases.get(),
            rollbacks: self.rollbacks.get(),
            leaked_references: self.leaked_references.get(),
            active_tenants: self.active_tenants.get(),
            errors: self.errors.get_all(),
        }
    }
}

impl Default for MuxMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`MuxMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuxMetricsSnapshot {
    pub starts: u64,
    pub stops: u64,
    pub lookups: u64,
    pub allocations: u64,
    pub releases: u64,
    pub rollbacks: u64,
    pub leaked_references: u64,
    pub active_tenants: i64,
    pub errors: Vec<(&'static str, u64)>,
}

impl MuxMetricsSnapshot {
    /// Count of failures of one error type.
    pub fn errors_of(&self, label: &str) -> u64 {
        self.errors
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}
