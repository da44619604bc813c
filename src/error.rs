//! Error types for shard routing and mux-id allocation.

use crate::cache::CacheKind;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for routing and allocation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The decoded or selected shard name has no registered shard.
    #[error("shard not found: {0:?}")]
    ShardNotFound(String),

    /// The cluster lock guarding the mux-id generator was not granted in time.
    #[error("lock unavailable on {resource} after {waited:?}")]
    LockUnavailable { resource: String, waited: Duration },

    /// The transaction around a generator mutation aborted and was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// The tenant holds no mux id.
    #[error("tenant not allocated: {0}")]
    TenantNotAllocated(String),

    /// The per-cache mux id does not fit in 16 bits.
    #[error("mux id overflow: tenant mux id {tenant_mux_id}, prefix {prefix}, offset {offset}")]
    MuxIdOverflow {
        tenant_mux_id: u16,
        prefix: i8,
        offset: i8,
    },

    /// Every tenant mux id up to the configured maximum is in use.
    #[error("mux id space exhausted: max {max}")]
    MuxIdSpaceExhausted { max: u16 },

    /// Two cache kinds map to the same mux id for one tenant.
    #[error("mux id collision: {first} and {second} both yield {mux_id} for tenant mux id {tenant_mux_id}")]
    MuxIdCollision {
        first: CacheKind,
        second: CacheKind,
        tenant_mux_id: u16,
        mux_id: i16,
    },

    /// An indexed type name is not known to the type registry.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Generator store errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the host may retry the failed call.
    ///
    /// Only lock acquisition failures are transient. Nothing in this crate
    /// retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockUnavailable { .. })
    }

    /// Short variant name, used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Error::ShardNotFound(_) => "shard_not_found",
            Error::LockUnavailable { .. } => "lock_unavailable",
            Error::TransactionFailed(_) => "transaction_failed",
            Error::TenantNotAllocated(_) => "tenant_not_allocated",
            Error::MuxIdOverflow { .. } => "mux_id_overflow",
            Error::MuxIdSpaceExhausted { .. } => "mux_id_space_exhausted",
            Error::MuxIdCollision { .. } => "mux_id_collision",
            Error::UnknownType(_) => "unknown_type",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}

/// Generator store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error.
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The backing store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Storage(StorageError::Serialization(e.to_string()))
    }
}
