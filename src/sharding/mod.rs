//! Shard routing for multi-tenant index storage.
//!
//! Entity keys carry their tenant as a trailing marker:
//!
//! ```text
//!   "Order(42)!!tenantA"
//!    └──id───┘└┬┘└─┬──┘
//!          separator shard name
//! ```
//!
//! The [`ShardRouter`] decodes the marker and maps the name to one of the
//! configured shards. Keys without a marker go to the default shard at
//! index 0. Shard names come from `index_name.<i>` properties
//! ([`IndexNameProperties`]).

pub mod key;
pub mod properties;
pub mod router;

pub use key::{decode_shard_name, encode_key, DEFAULT_SEPARATOR};
pub use properties::IndexNameProperties;
pub use router::{ShardRouter, DEFAULT_SHARD_INDEX};
