//! The authoritative version register for a single table.
//!
//! Every version is one JSON object in the log directory; writing that object
//! is the commit point. Conflict detection happens above this layer (the
//! transaction compares versions before writing), so `write` itself has plain
//! create-or-overwrite semantics. Commits within one process are serialized
//! by the log's commit lock; cross-process writers would need a conditional
//! put the storage interface does not offer.

use super::actions::Action;
use super::error::DeltaError;
use super::filename::LogFileName;
use super::snapshot::Snapshot;
use super::storage::Storage;
use super::transaction::{IsolationLevel, OptimisticTransaction};
use std::sync::{Arc, Mutex};
use tokio::sync::MutexGuard;

pub struct DeltaLog {
    storage: Arc<dyn Storage>,
    table_path: String,
    log_path: String,
    data_path: String,
    current_snapshot: Mutex<Option<Arc<Snapshot>>>,
    commit_lock: tokio::sync::Mutex<()>,
}

impl DeltaLog {
    /// Creates the log handle for a table. Nothing is read until the first
    /// operation; a table with no committed versions is simply empty.
    pub fn new(storage: Arc<dyn Storage>, table_path: &str) -> Arc<Self> {
        let table_path = if table_path.ends_with('/') {
            table_path.to_string()
        } else {
            format!("{}/", table_path)
        };
        Arc::new(Self {
            log_path: format!("{}_delta_log/", table_path),
            data_path: format!("{}data/", table_path),
            storage,
            table_path,
            current_snapshot: Mutex::new(None),
            commit_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn table_path(&self) -> &str {
        &self.table_path
    }

    pub fn log_path(&self) -> &str {
        &self.log_path
    }

    pub fn data_path(&self) -> &str {
        &self.data_path
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Begins an optimistic transaction whose baseline is the current
    /// snapshot of this log.
    pub async fn start_transaction(
        self: &Arc<Self>,
    ) -> Result<OptimisticTransaction, DeltaError> {
        OptimisticTransaction::begin(self.clone(), IsolationLevel::Serializable).await
    }

    /// Versions present in the log directory, unordered. Filenames that are
    /// not valid log entries are skipped; a listing failure reads as an empty
    /// log.
    pub async fn list_versions(&self) -> Vec<i64> {
        let log_files = match self.storage.list_objects(&self.log_path).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Failed to list log at {}: {}", self.log_path, e);
                return Vec::new();
            }
        };
        log_files
            .iter()
            .map(|file| LogFileName::version_from_name(file))
            .filter(|&version| version >= 0)
            .collect()
    }

    /// The highest committed version, or -1 for an empty log.
    pub async fn latest_version(&self) -> i64 {
        self.list_versions().await.into_iter().max().unwrap_or(-1)
    }

    /// Writes the actions of `version` to the log. **This is the commit
    /// point**: once the underlying object write returns, the version exists.
    /// The caller is responsible for conflict detection before writing.
    pub async fn write(&self, version: i64, actions: &[Action]) -> Result<(), DeltaError> {
        if version < 0 {
            return Err(DeltaError::NegativeVersion(version));
        }
        let path = LogFileName::from_version(version)?.path_in(&self.log_path);
        let payload = serde_json::to_vec(actions)?;
        self.storage.write_object(&path, payload).await?;
        tracing::debug!("Wrote version {} with {} actions", version, actions.len());
        Ok(())
    }

    /// Reads back the actions committed at `version`.
    pub async fn read_version(&self, version: i64) -> Result<Vec<Action>, DeltaError> {
        let path = LogFileName::from_version(version)?.path_in(&self.log_path);
        let payload = self.storage.read_object(&path).await?;
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Reconstructs the snapshot at the latest version by replaying every
    /// version in ascending order.
    pub async fn snapshot(&self) -> Result<Snapshot, DeltaError> {
        let mut versions = self.list_versions().await;
        versions.sort_unstable();
        let Some(&latest) = versions.last() else {
            return Ok(Snapshot::empty());
        };

        let mut actions = Vec::new();
        for version in versions {
            actions.extend(self.read_version(version).await?);
        }
        Ok(Snapshot::new(latest, actions))
    }

    /// Returns the snapshot of the latest version, recomputing it only when
    /// the log has moved. Two consecutive calls with no intervening write
    /// return the identical snapshot instance.
    pub async fn update(&self) -> Result<Arc<Snapshot>, DeltaError> {
        let _guard = self.commit_lock.lock().await;
        self.update_locked().await
    }

    /// [`update`] for callers already holding the commit lock.
    ///
    /// [`update`]: DeltaLog::update
    pub async fn update_locked(&self) -> Result<Arc<Snapshot>, DeltaError> {
        let latest = self.latest_version().await;
        if let Some(cached) = self.current_snapshot.lock().unwrap().clone() {
            if cached.version() == latest {
                return Ok(cached);
            }
        }
        let snapshot = Arc::new(self.snapshot().await?);
        *self.current_snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Acquires the process-local commit lock. The guard releases it on every
    /// exit path, panics included. The lock is not reentrant: while holding
    /// the guard, refresh the snapshot through [`update_locked`], not
    /// [`update`].
    ///
    /// [`update_locked`]: DeltaLog::update_locked
    /// [`update`]: DeltaLog::update
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock().await
    }
}
