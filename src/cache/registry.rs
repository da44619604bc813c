//! Type registry capability.
//!
//! The host knows which concrete types are indexed and under which index
//! name. The crate only needs a name lookup.

use super::KindTable;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Handle to an indexed type supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    /// Type name as used in cache indexing specs.
    pub name: Arc<str>,
    /// Name of the index the type is stored in.
    pub index_name: Arc<str>,
}

/// Resolves type names to handles.
pub trait TypeRegistry: Send + Sync + Debug {
    /// Resolve a type by name.
    fn resolve_type(&self, name: &str) -> Option<TypeHandle>;
}

/// Registry backed by a fixed map.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeRegistry {
    types: HashMap<String, TypeHandle>,
}

impl StaticTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every type named by a kind table, each indexed under its own name.
    pub fn from_table(table: &KindTable) -> Self {
        table
            .iter()
            .flat_map(|(_, spec)| spec.indexed_types.iter())
            .fold(Self::new(), |registry, name| registry.with_type(name.as_str(), name.as_str()))
    }

    /// Register every type of the standard table.
    pub fn standard() -> Self {
        Self::from_table(&KindTable::standard())
    }

    /// Register a type under an index name.
    pub fn with_type(mut self, name: impl Into<String>, index_name: impl Into<String>) -> Self {
        let name: String = name.into();
        let index_name: String = index_name.into();
        let handle = TypeHandle {
            name: Arc::from(name.as_str()),
            index_name: Arc::from(index_name),
        };
        self.types.insert(name, handle);
        self
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeRegistry for StaticTypeRegistry {
    fn resolve_type(&self, name: &str) -> Option<TypeHandle> {
        self.types.get(name).cloned()
    }
}
