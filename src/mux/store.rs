//! Generator record storage.
//!
//! The generator record is the single piece of cluster-shared state behind
//! mux-id allocation. Stores only load and save whole records; the
//! allocator holds the cluster lock around every read-modify-write, so a
//! save either lands completely or not at all.
//!
//! # Storage Format
//!
//! [`FileGeneratorStore`] keeps one bincode file per record key:
//!
//! ```text
//! <base_dir>/
//!   ├── __mux_id_generator__.bin
//!   └── other_key.bin
//! ```

use crate::error::{Error, Result, StorageError};
use crate::types::{TenantId, TenantMuxId, TenantMuxRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Cluster-wide allocation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorRecord {
    /// Next never-used tenant mux id.
    pub next_id: TenantMuxId,

    /// Tenants with at least one active reference.
    pub tenants: BTreeMap<TenantId, TenantMuxRecord>,

    /// Ids given back by fully stopped tenants, available for reuse.
    pub released: BTreeSet<TenantMuxId>,

    /// Incremented on every committed change.
    pub version: u64,
}

impl GeneratorRecord {
    /// Create an empty record whose first id is `first_id`.
    pub fn new(first_id: TenantMuxId) -> Self {
        Self {
            next_id: first_id,
            tenants: BTreeMap::new(),
            released: BTreeSet::new(),
            version: 0,
        }
    }

    /// Get a tenant's record.
    pub fn tenant(&self, tenant: &TenantId) -> Option<&TenantMuxRecord> {
        self.tenants.get(tenant)
    }

    /// Number of tenants holding an id.
    pub fn active_tenants(&self) -> usize {
        self.tenants.len()
    }
}

/// Storage for generator records.
#[async_trait]
pub trait GeneratorStore: Send + Sync + std::fmt::Debug {
    /// Load the record stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<GeneratorRecord>>;

    /// Replace the record stored under `key`.
    async fn save(&self, key: &str, record: &GeneratorRecord) -> Result<()>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// In-memory store. Clones of an `Arc` to it act as one shared backend.
#[derive(Debug, Default)]
pub struct InMemoryGeneratorStore {
    records: RwLock<HashMap<String, GeneratorRecord>>,
}

impl InMemoryGeneratorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeneratorStore for InMemoryGeneratorStore {
    async fn load(&self, key: &str) -> Result<Option<GeneratorRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn save(&self, key: &str, record: &GeneratorRecord) -> Result<()> {
        self.records.write().insert(key.to_string(), record.clone());
        Ok(())
    }
}

// ============================================================================
// File-Based Implementation (using async tokio::fs)
// ============================================================================

/// File-backed store surviving process restarts.
#[derive(Debug)]
pub struct FileGeneratorStore {
    base_dir: PathBuf,
}

impl FileGeneratorStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(StorageError::from)?;
        Ok(Self { base_dir })
    }

    /// File of a record key. Bytes outside `[A-Za-z0-9_-]` are
    /// percent-encoded, so distinct keys never share a file.
    fn record_path(&self, key: &str) -> PathBuf {
        let mut file_name = String::with_capacity(key.len() + 4);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                file_name.push(char::from(byte));
            } else {
                let _ = write!(file_name, "%{:02X}", byte);
            }
        }
        file_name.push_str(".bin");
        self.base_dir.join(file_name)
    }

    /// Write to a temp file, then rename over the target.
    async fn atomic_write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(StorageError::from)?;
        file.write_all(content).await.map_err(StorageError::from)?;
        file.sync_all().await.map_err(StorageError::from)?;

        fs::rename(&temp_path, path)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[async_trait]
impl GeneratorStore for FileGeneratorStore {
    async fn load(&self, key: &str) -> Result<Option<GeneratorRecord>> {
        let path = self.record_path(key);
        match fs::read(&path).await {
            Ok(content) => {
                let record = bincode::deserialize(&content).map_err(|e| {
                    Error::Storage(StorageError::Deserialization(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }

    async fn save(&self, key: &str, record: &GeneratorRecord) -> Result<()> {
        let path = self.record_path(key);
        let content = bincode::serialize(record)?;
        self.atomic_write(&path, &content).await?;

        tracing::debug!(
            key,
            version = record.version,
            tenants = record.tenants.len(),
            "Saved generator record"
        );
        Ok(())
    }
}
