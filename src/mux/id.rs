//! Per-cache mux id arithmetic.

use crate::error::{Error, Result};
use crate::types::{MuxId, TenantMuxId};

/// Combine a tenant slot with a cache kind's constants.
///
/// `(indexing_cache_count / 2) * tenant_mux_id * prefix + offset`, computed
/// in 32 bits. Results outside `i16` are rejected rather than wrapped so
/// every node either agrees on the id or fails the same way.
pub fn compute_mux_id(
    tenant_mux_id: TenantMuxId,
    prefix: i8,
    offset: i8,
    indexing_cache_count: u16,
) -> Result<MuxId> {
    let scale = i32::from(indexing_cache_count / 2);
    let raw = scale * i32::from(tenant_mux_id) * i32::from(prefix) + i32::from(offset);
    MuxId::try_from(raw).map_err(|_| Error::MuxIdOverflow {
        tenant_mux_id,
        prefix,
        offset,
    })
}
