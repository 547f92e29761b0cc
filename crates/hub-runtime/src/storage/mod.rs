//! # Storage Backends
//!
//! - `memory` - `InMemoryRepository` from the coordinator crate (default)
//! - `rocksdb` - persistent store, enabled with the `rocksdb` feature
//!
//! Both halves of the storage port (core repository and target catalog)
//! are served by the same backing store.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_repository;

#[cfg(feature = "rocksdb")]
pub use rocksdb_repository::{RocksDbConfig, RocksDbRepository, COLUMN_FAMILIES};

use crate::config::{StorageBackend, StorageConfig};
use hub_coordinator::{InMemoryRepository, MonitoringRepository, StorageError, TargetCatalog};
use std::sync::Arc;
use tracing::info;

/// The two storage ports, backed by one store.
#[derive(Clone)]
pub struct Storage {
    pub repository: Arc<dyn MonitoringRepository>,
    pub catalog: Arc<dyn TargetCatalog>,
}

impl Storage {
    /// Wrap any store implementing both ports.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: MonitoringRepository + TargetCatalog + 'static,
    {
        Self {
            repository: store.clone(),
            catalog: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryRepository::new()))
    }
}

/// Open the configured backend.
pub fn open_storage(config: &StorageConfig) -> Result<Storage, StorageError> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(Storage::in_memory())
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::Rocksdb => {
            info!(path = %config.path.display(), "Opening RocksDB storage");
            let repo = RocksDbRepository::open(RocksDbConfig {
                path: config.path.clone(),
                ..Default::default()
            })?;
            Ok(Storage::from_store(Arc::new(repo)))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::Rocksdb => Err(StorageError::Backend(
            "RocksDB support not compiled in; rebuild with --features rocksdb".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_shares_state() {
        let storage = open_storage(&StorageConfig::default()).unwrap();
        storage
            .catalog
            .create_target("https://example.com", "o")
            .await
            .unwrap();
        assert_eq!(storage.repository.list_active_targets().await.unwrap().len(), 1);
    }

    #[cfg(feature = "rocksdb")]
    #[tokio::test]
    async fn test_rocksdb_backend_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = open_storage(&StorageConfig {
            backend: StorageBackend::Rocksdb,
            path: dir.path().to_path_buf(),
        })
        .unwrap();
        assert!(storage.repository.list_active_targets().await.unwrap().is_empty());
    }
}
