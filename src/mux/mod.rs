//! Multiplexing id allocation.
//!
//! Many tenant caches share one group-communication channel. Each message
//! carries a small mux id telling the receiver which cache it belongs to.
//! Ids are built in two steps:
//!
//! 1. [`MuxIdAllocator`] gives every tenant a slot (a small positive
//!    integer) from a cluster-shared, reference-counted generator record.
//! 2. [`compute_mux_id`] combines the slot with a cache kind's constants.
//!
//! ```text
//!   cache start(tenant, kind)
//!            │
//!            ▼
//!   ┌─────────────────────┐   lock(generator key)   ┌──────────────────┐
//!   │   MuxIdAllocator    │ ──────────────────────► │   LockManager    │
//!   │  start / get / stop │                         └──────────────────┘
//!   │                     │   load / save record    ┌──────────────────┐
//!   │                     │ ──────────────────────► │  GeneratorStore  │
//!   └─────────────────────┘                         └──────────────────┘
//!            │ tenant slot
//!            ▼
//!   compute_mux_id(slot, prefix, offset, indexing_cache_count)
//! ```
//!
//! # Consistency
//!
//! All allocator operations on all nodes serialize on one lock. That is the
//! single source of truth guaranteeing no two active tenants share a slot.

pub mod allocator;
pub mod id;
pub mod lock;
pub mod store;

pub use allocator::MuxIdAllocator;
pub use id::compute_mux_id;
pub use lock::{LockGuard, LockManager, LockStatus, MemoryLockManager};
pub use store::{FileGeneratorStore, GeneratorRecord, GeneratorStore, InMemoryGeneratorStore};
