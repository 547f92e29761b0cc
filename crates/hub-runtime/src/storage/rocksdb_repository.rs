//! # RocksDB Repository
//!
//! Persistent `MonitoringRepository` and `TargetCatalog`.
//!
//! ## Column Families
//!
//! - `targets` - `TargetId` -> `MonitoredTarget`
//! - `validators` - `ValidatorId` -> `Validator`
//! - `validator_keys` - base58 public key -> `ValidatorId`
//! - `observations` - `TargetId ‖ observed_at_ms ‖ ObservationId` -> `Observation`
//!
//! Values are bincode-encoded. Multi-record writes go through one
//! `WriteBatch` under a write lock, so an observation and its payout credit
//! land together or not at all.

use async_trait::async_trait;
use chrono::Utc;
use hub_coordinator::{
    MonitoringRepository, NewValidator, ObservationRecord, StorageError, TargetCatalog,
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{MonitoredTarget, Observation, ObservationId, TargetId, Validator, ValidatorId};
use std::path::PathBuf;
use std::sync::Arc;

pub const CF_TARGETS: &str = "targets";
pub const CF_VALIDATORS: &str = "validators";
pub const CF_VALIDATOR_KEYS: &str = "validator_keys";
pub const CF_OBSERVATIONS: &str = "observations";

/// All column families used by the hub
pub const COLUMN_FAMILIES: &[&str] = &[CF_TARGETS, CF_VALIDATORS, CF_VALIDATOR_KEYS, CF_OBSERVATIONS];

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/watchtower"),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

struct Inner {
    db: DB,
    config: RocksDbConfig,
    /// Serializes read-modify-write sequences
    write_lock: Mutex<()>,
}

/// RocksDB-backed repository
#[derive(Clone)]
pub struct RocksDbRepository {
    inner: Arc<Inner>,
}

impl RocksDbRepository {
    /// Open or create the database
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StorageError::Backend(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                config,
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Run a storage operation off the async executor.
    async fn blocking<T, F>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Inner) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || operation(&inner))
            .await
            .map_err(|e| StorageError::Backend(format!("storage task failed: {}", e)))?
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| StorageError::Backend(format!("encode failed: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Corruption(format!("decode failed: {}", e)))
}

fn observation_key(observation: &Observation) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(observation.target_id.as_uuid().as_bytes());
    key.extend_from_slice(&observation.observed_at.timestamp_millis().to_be_bytes());
    key.extend_from_slice(observation.id.as_uuid().as_bytes());
    key
}

impl Inner {
    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::Backend(format!("missing column family {}", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>, StorageError> {
        self.db
            .get_cf(self.cf(cf)?, key)
            .map_err(|e| StorageError::Backend(format!("RocksDB get failed: {}", e)))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>, StorageError> {
        let mut values = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_, value) =
                item.map_err(|e| StorageError::Backend(format!("RocksDB scan failed: {}", e)))?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| StorageError::Backend(format!("RocksDB batch write failed: {}", e)))
    }

    fn validator_by_key(&self, public_key: &str) -> Result<Option<Validator>, StorageError> {
        let Some(id) = self.get::<ValidatorId>(CF_VALIDATOR_KEYS, public_key.as_bytes())? else {
            return Ok(None);
        };
        self.get(CF_VALIDATORS, id.as_uuid().as_bytes())
    }

    fn put_target(&self, target: &MonitoredTarget) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_TARGETS)?, target.id.as_uuid().as_bytes(), encode(target)?);
        self.write(batch)
    }
}

#[async_trait]
impl MonitoringRepository for RocksDbRepository {
    async fn list_active_targets(&self) -> Result<Vec<MonitoredTarget>, StorageError> {
        self.blocking(|inner| {
            let targets: Vec<MonitoredTarget> = inner.scan(CF_TARGETS)?;
            Ok(targets.into_iter().filter(|t| !t.disabled).collect())
        })
        .await
    }

    async fn find_validator_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Validator>, StorageError> {
        let public_key = public_key.to_string();
        self.blocking(move |inner| inner.validator_by_key(&public_key))
            .await
    }

    async fn create_validator(&self, validator: NewValidator) -> Result<Validator, StorageError> {
        self.blocking(move |inner| {
            let _guard = inner.write_lock.lock();

            if let Some(existing) = inner.validator_by_key(&validator.public_key)? {
                return Ok(existing);
            }

            let record = Validator {
                id: ValidatorId::new(),
                public_key: validator.public_key,
                location: validator.location,
                ip_address: validator.ip_address,
                pending_payout: 0,
            };

            let mut batch = WriteBatch::default();
            batch.put_cf(
                inner.cf(CF_VALIDATORS)?,
                record.id.as_uuid().as_bytes(),
                encode(&record)?,
            );
            batch.put_cf(
                inner.cf(CF_VALIDATOR_KEYS)?,
                record.public_key.as_bytes(),
                encode(&record.id)?,
            );
            inner.write(batch)?;
            Ok(record)
        })
        .await
    }

    async fn record_observation_and_credit_payout(
        &self,
        record: ObservationRecord,
        reward: u64,
    ) -> Result<Observation, StorageError> {
        self.blocking(move |inner| {
            let _guard = inner.write_lock.lock();

            if inner
                .get::<MonitoredTarget>(CF_TARGETS, record.target_id.as_uuid().as_bytes())?
                .is_none()
            {
                return Err(StorageError::NotFound(format!("target {}", record.target_id)));
            }

            let mut validator: Validator = inner
                .get(CF_VALIDATORS, record.validator_id.as_uuid().as_bytes())?
                .ok_or_else(|| {
                    StorageError::NotFound(format!("validator {}", record.validator_id))
                })?;
            validator.pending_payout =
                validator.pending_payout.checked_add(reward).ok_or_else(|| {
                    StorageError::Backend(format!("payout overflow for validator {}", validator.id))
                })?;

            let observation = Observation {
                id: ObservationId::new(),
                target_id: record.target_id,
                validator_id: record.validator_id,
                status: record.status,
                latency_ms: record.latency_ms,
                observed_at: Utc::now(),
            };

            let mut batch = WriteBatch::default();
            batch.put_cf(
                inner.cf(CF_OBSERVATIONS)?,
                observation_key(&observation),
                encode(&observation)?,
            );
            batch.put_cf(
                inner.cf(CF_VALIDATORS)?,
                validator.id.as_uuid().as_bytes(),
                encode(&validator)?,
            );
            inner.write(batch)?;
            Ok(observation)
        })
        .await
    }

    async fn get_validator(&self, id: ValidatorId) -> Result<Option<Validator>, StorageError> {
        self.blocking(move |inner| inner.get(CF_VALIDATORS, id.as_uuid().as_bytes()))
            .await
    }
}

#[async_trait]
impl TargetCatalog for RocksDbRepository {
    async fn create_target(
        &self,
        url: &str,
        owner_id: &str,
    ) -> Result<MonitoredTarget, StorageError> {
        let target = MonitoredTarget::new(url, owner_id);
        self.blocking(move |inner| {
            inner.put_target(&target)?;
            Ok(target)
        })
        .await
    }

    async fn get_target(&self, id: TargetId) -> Result<Option<MonitoredTarget>, StorageError> {
        self.blocking(move |inner| inner.get(CF_TARGETS, id.as_uuid().as_bytes()))
            .await
    }

    async fn list_targets_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<MonitoredTarget>, StorageError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |inner| {
            let targets: Vec<MonitoredTarget> = inner.scan(CF_TARGETS)?;
            let mut owned: Vec<_> = targets
                .into_iter()
                .filter(|t| !t.disabled && t.owner_id == owner_id)
                .collect();
            owned.sort_by(|a, b| a.url.cmp(&b.url));
            Ok(owned)
        })
        .await
    }

    async fn disable_target(&self, id: TargetId, owner_id: &str) -> Result<(), StorageError> {
        let owner_id = owner_id.to_string();
        self.blocking(move |inner| {
            let _guard = inner.write_lock.lock();
            match inner.get::<MonitoredTarget>(CF_TARGETS, id.as_uuid().as_bytes())? {
                Some(mut target) if target.owner_id == owner_id => {
                    target.disabled = true;
                    inner.put_target(&target)
                }
                _ => Err(StorageError::NotFound(format!("target {}", id))),
            }
        })
        .await
    }

    async fn recent_observations(
        &self,
        target_id: TargetId,
        limit: usize,
    ) -> Result<Vec<Observation>, StorageError> {
        self.blocking(move |inner| {
            let prefix = target_id.as_uuid().as_bytes().to_vec();
            let mut upper = prefix.clone();
            upper.extend_from_slice(&[0xff; 24]);

            let mut observations = Vec::new();
            let iter = inner
                .db
                .iterator_cf(inner.cf(CF_OBSERVATIONS)?, IteratorMode::From(&upper, Direction::Reverse));
            for item in iter {
                if observations.len() >= limit {
                    break;
                }
                let (key, value) = item
                    .map_err(|e| StorageError::Backend(format!("RocksDB scan failed: {}", e)))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                observations.push(decode(&value)?);
            }
            Ok(observations)
        })
        .await
    }

    async fn list_validators(&self) -> Result<Vec<Validator>, StorageError> {
        self.blocking(|inner| {
            let mut validators: Vec<Validator> = inner.scan(CF_VALIDATORS)?;
            validators.sort_by(|a, b| a.public_key.cmp(&b.public_key));
            Ok(validators)
        })
        .await
    }
}
