//! Core types shared by the router and the allocator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-tenant slot in the shared multiplexing space, handed out by the allocator.
pub type TenantMuxId = u16;

/// Final multiplexing id of one cache, passed to the group-communication layer.
pub type MuxId = i16;

/// Identifier of a tenant application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Allocation state of one tenant inside the generator record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMuxRecord {
    /// Number of caches currently started for the tenant.
    pub ref_count: u32,
    /// The tenant's slot in the multiplexing space.
    pub mux_id: TenantMuxId,
}

/// Outcome of stopping a tenant reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other references remain.
    Decremented { mux_id: TenantMuxId, remaining: u32 },
    /// The last reference was dropped and the record removed.
    Released { mux_id: TenantMuxId },
    /// The tenant had no record.
    NotAllocated,
}

impl Release {
    /// Remaining references after the stop.
    pub fn remaining(&self) -> u32 {
        match self {
            Release::Decremented { remaining, .. } => *remaining,
            Release::Released { .. } | Release::NotAllocated => 0,
        }
    }
}
