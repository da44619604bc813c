//! Key-suffix routing to index shards.

use super::key::decode_shard_name;
use super::properties::IndexNameProperties;
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::metrics::RoutingMetrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Index of the shard serving keys without a tenant marker.
pub const DEFAULT_SHARD_INDEX: usize = 0;

/// Routes entity keys and query filters to shards.
///
/// Built once from an ordered shard array and the `index_name.<i>`
/// properties; immutable afterwards. Shard `0` is the default shard and is
/// never named. Non-default shards without a name are kept in
/// [`all_shards`](Self::all_shards) but cannot be reached by key.
///
/// `H` is whatever handle the host uses for an index or cache shard.
#[derive(Debug)]
pub struct ShardRouter<H> {
    config: RouterConfig,

    /// Shards in initialization order.
    shards: Vec<Arc<H>>,

    /// Shard name to index in `shards`.
    by_name: HashMap<String, usize>,

    metrics: RoutingMetrics,
}

impl<H> ShardRouter<H> {
    /// Create a router over `shards`, naming them from `names`.
    pub fn new(
        shards: Vec<Arc<H>>,
        names: &IndexNameProperties,
        config: RouterConfig,
    ) -> Result<Self> {
        config.validate()?;
        if shards.is_empty() {
            return Err(Error::Config(
                "shard router needs at least the default shard".to_string(),
            ));
        }

        let mut by_name = HashMap::with_capacity(names.len());
        for (index, name) in names.iter() {
            if index == DEFAULT_SHARD_INDEX {
                warn!(shard = name, "Ignoring name for the default shard");
                continue;
            }
            if index >= shards.len() {
                warn!(
                    shard = name,
                    index,
                    shards = shards.len(),
                    "Ignoring name for a shard that does not exist"
                );
                continue;
            }
            if let Some(previous) = by_name.insert(name.to_string(), index) {
                warn!(shard = name, previous, index, "Duplicate shard name, later index wins");
            }
        }

        let named: HashSet<usize> = by_name.values().copied().collect();
        let unnamed = shards.len() - 1 - named.len();
        if unnamed > 0 {
            debug!(unnamed, "Some non-default shards have no name");
        }

        Ok(Self {
            config,
            shards,
            by_name,
            metrics: RoutingMetrics::new(),
        })
    }

    /// Create a router, reading shard names from properties text.
    pub fn from_properties_text(
        shards: Vec<Arc<H>>,
        text: &str,
        config: RouterConfig,
    ) -> Result<Self> {
        let names = IndexNameProperties::parse(&config.index_name_prefix, text)?;
        Self::new(shards, &names, config)
    }

    /// Shard that stores the entity with `key`.
    pub fn addition(&self, key: &str) -> Result<Arc<H>> {
        self.metrics.additions.inc();
        let index = self.index_for_key(key)?;
        Ok(Arc::clone(&self.shards[index]))
    }

    /// Shards to delete the entity with `key` from. Always exactly one.
    pub fn deletion(&self, key: &str) -> Result<Vec<Arc<H>>> {
        self.metrics.deletions.inc();
        let index = self.index_for_key(key)?;
        Ok(vec![Arc::clone(&self.shards[index])])
    }

    /// Shards a filtered query runs against.
    ///
    /// Without filters the query runs on the default shard. Otherwise the
    /// first filter name is taken as the shard name; later filters do not
    /// widen the target set.
    pub fn query<S: AsRef<str>>(&self, filter_names: &[S]) -> Result<Vec<Arc<H>>> {
        self.metrics.queries.inc();
        let index = match filter_names.first() {
            None => {
                self.metrics.default_routes.inc();
                DEFAULT_SHARD_INDEX
            }
            Some(name) => self.index_for_name(name.as_ref())?,
        };
        Ok(vec![Arc::clone(&self.shards[index])])
    }

    /// All configured shards in initialization order.
    pub fn all_shards(&self) -> &[Arc<H>] {
        &self.shards
    }

    /// The shard serving keys without a tenant marker.
    pub fn default_shard(&self) -> &Arc<H> {
        &self.shards[DEFAULT_SHARD_INDEX]
    }

    /// Index of the shard registered under `name`.
    pub fn shard_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Name of the shard at `index`, if it has one.
    pub fn shard_name(&self, index: usize) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(name, _)| name.as_str())
    }

    /// Number of configured shards, the default one included.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Always false: a router holds at least the default shard.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Group key positions by the shard index their additions go to.
    ///
    /// Fails on the first key naming an unknown shard.
    pub fn route_additions<S: AsRef<str>>(&self, keys: &[S]) -> Result<HashMap<usize, Vec<usize>>> {
        let mut routing: HashMap<usize, Vec<usize>> = HashMap::new();
        for (position, key) in keys.iter().enumerate() {
            self.metrics.additions.inc();
            let index = self.index_for_key(key.as_ref())?;
            routing.entry(index).or_default().push(position);
        }
        Ok(routing)
    }

    /// Get the router config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the routing metrics.
    pub fn metrics(&self) -> &RoutingMetrics {
        &self.metrics
    }

    fn index_for_key(&self, key: &str) -> Result<usize> {
        match decode_shard_name(key, &self.config.separator) {
            None => {
                self.metrics.default_routes.inc();
                Ok(DEFAULT_SHARD_INDEX)
            }
            Some(name) => self.index_for_name(name),
        }
    }

    fn index_for_name(&self, name: &str) -> Result<usize> {
        match self.by_name.get(name) {
            Some(index) => Ok(*index),
            None => {
                self.metrics.misses.inc();
                debug!(shard = name, "No shard registered under name");
                Err(Error::ShardNotFound(name.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::INDEX_NAME_PREFIX;

    #[derive(Debug, PartialEq, Eq)]
    struct Index(&'static str);

    fn shards(names: &[&'static str]) -> Vec<Arc<Index>> {
        names.iter().map(|n| Arc::new(Index(*n))).collect()
    }

    fn tenant_router() -> ShardRouter<Index> {
        let names = IndexNameProperties::new()
            .with_name(1, "tenantA")
            .with_name(2, "tenantB");
        ShardRouter::new(
            shards(&["default", "a", "b"]),
            &names,
            RouterConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_addition_routes_by_suffix() {
        let router = tenant_router();
        assert_eq!(*router.addition("abc!!tenantA").unwrap(), Index("a"));
        assert_eq!(*router.addition("abc!!tenantB").unwrap(), Index("b"));
        assert_eq!(*router.addition("abc").unwrap(), Index("default"));
    }

    #[test]
    fn test_unknown_suffix_is_shard_not_found() {
        let router = tenant_router();
        assert!(matches!(
            router.addition("abc!!tenantC"),
            Err(Error::ShardNotFound(name)) if name == "tenantC"
        ));
        assert!(matches!(
            router.deletion("abc!!"),
            Err(Error::ShardNotFound(name)) if name.is_empty()
        ));
        assert_eq!(router.metrics().snapshot().misses, 2);
    }

    #[test]
    fn test_single_default_shard() {
        let router =
            ShardRouter::new(shards(&["d"]), &IndexNameProperties::new(), RouterConfig::default())
                .unwrap();
        let none: [&str; 0] = [];

        assert_eq!(router.len(), 1);
        assert_eq!(*router.addition("abc").unwrap(), Index("d"));
        assert_eq!(*router.query(&none).unwrap()[0], Index("d"));
        assert_eq!(router.deletion("abc").unwrap(), vec![Arc::new(Index("d"))]);
        assert!(matches!(
            router.addition("abc!!x"),
            Err(Error::ShardNotFound(name)) if name == "x"
        ));
    }

    #[test]
    fn test_deletion_never_fans_out() {
        let router = tenant_router();
        let targets = router.deletion("Order(7)!!tenantB").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(*targets[0], Index("b"));

        let targets = router.deletion("Order(7)").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(*targets[0], Index("default"));
    }

    #[test]
    fn test_query_uses_first_filter_only() {
        let router = tenant_router();

        let none: [&str; 0] = [];
        assert_eq!(*router.query(&none).unwrap()[0], Index("default"));

        let targets = router.query(&["tenantB", "tenantA"]).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(*targets[0], Index("b"));

        // a bad later filter is never looked at
        assert!(router.query(&["tenantA", "nope"]).is_ok());
        assert!(matches!(
            router.query(&["nope", "tenantA"]),
            Err(Error::ShardNotFound(_))
        ));
    }

    #[test]
    fn test_all_shards_keeps_order() {
        let router = tenant_router();
        let names: Vec<_> = router.all_shards().iter().map(|s| s.0).collect();
        assert_eq!(names, vec!["default", "a", "b"]);
        assert_eq!(router.len(), 3);
        assert_eq!(**router.default_shard(), Index("default"));
    }

    #[test]
    fn test_unnamed_and_out_of_range_names() {
        let names = IndexNameProperties::new()
            .with_name(0, "zero")
            .with_name(2, "two")
            .with_name(9, "nine");
        let router =
            ShardRouter::new(shards(&["d", "x", "y"]), &names, RouterConfig::default()).unwrap();

        assert_eq!(router.shard_index("two"), Some(2));
        assert_eq!(router.shard_index("zero"), None);
        assert_eq!(router.shard_index("nine"), None);
        assert_eq!(router.shard_name(1), None);
        assert_eq!(router.shard_name(2), Some("two"));
        assert_eq!(router.all_shards().len(), 3);
    }

    #[test]
    fn test_duplicate_name_later_index_wins() {
        let names = IndexNameProperties::new()
            .with_name(1, "same")
            .with_name(2, "same");
        let router =
            ShardRouter::new(shards(&["d", "x", "y"]), &names, RouterConfig::default()).unwrap();
        assert_eq!(*router.addition("k!!same").unwrap(), Index("y"));
    }

    #[test]
    fn test_empty_shard_array_is_rejected() {
        let result = ShardRouter::<Index>::new(
            Vec::new(),
            &IndexNameProperties::new(),
            RouterConfig::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_custom_separator() {
        let names = IndexNameProperties::new().with_name(1, "t1");
        let router =
            ShardRouter::new(shards(&["d", "one"]), &names, RouterConfig::new("#")).unwrap();
        assert_eq!(*router.addition("k#t1").unwrap(), Index("one"));
        assert_eq!(*router.addition("k!!t1").unwrap(), Index("d"));
    }

    #[test]
    fn test_from_properties_text() {
        let text = format!("{}1=tenantA\n{}2=tenantB\n", INDEX_NAME_PREFIX, INDEX_NAME_PREFIX);
        let router =
            ShardRouter::from_properties_text(shards(&["d", "a", "b"]), &text, RouterConfig::default())
                .unwrap();
        assert_eq!(router.shard_index("tenantB"), Some(2));
    }

    #[test]
    fn test_route_additions_groups_positions() {
        let router = tenant_router();
        let keys = ["1!!tenantA", "2", "3!!tenantB", "4!!tenantA", "5"];
        let routing = router.route_additions(&keys).unwrap();

        assert_eq!(routing[&0], vec![1, 4]);
        assert_eq!(routing[&1], vec![0, 3]);
        assert_eq!(routing[&2], vec![2]);

        let total: usize = routing.values().map(|v| v.len()).sum();
        assert_eq!(total, keys.len());

        assert!(router.route_additions(&["x!!missing"]).is_err());
    }

    #[test]
    fn test_metrics_count_lookups() {
        let router = tenant_router();
        router.addition("a").unwrap();
        router.addition("a!!tenantA").unwrap();
        router.deletion("a").unwrap();
        router.query(&["tenantA"]).unwrap();

        let snapshot = router.metrics().snapshot();
        assert_eq!(snapshot.additions, 2);
        assert_eq!(snapshot.deletions, 1);
        assert_eq!(snapshot.queries, 1);
        assert_eq!(snapshot.default_routes, 2);
        assert_eq!(snapshot.misses, 0);
    }
}
