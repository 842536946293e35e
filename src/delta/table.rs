//! Table-level operations: writing data files and reading them back.
//!
//! The table format does not care what is inside a data file; the log only
//! records a path and a size. The record codec here is a stand-in for a real
//! columnar writer and encodes a batch of records as JSON, one file per
//! insert, under the table's `data/` directory.

use super::actions::{now_ms, Action, AddFile};
use super::error::DeltaError;
use super::log::DeltaLog;
use super::storage::Storage;
use super::transaction::OptimisticTransaction;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A record is a flat map of column names to values.
pub type Record = HashMap<String, String>;

pub struct DeltaTable {
    log: Arc<DeltaLog>,
}

impl DeltaTable {
    pub fn new(storage: Arc<dyn Storage>, table_path: &str) -> Self {
        Self {
            log: DeltaLog::new(storage, table_path),
        }
    }

    /// Builds a table view sharing an existing log (and thus its commit lock).
    pub fn with_log(log: Arc<DeltaLog>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<DeltaLog> {
        &self.log
    }

    pub async fn start_transaction(&self) -> Result<OptimisticTransaction, DeltaError> {
        self.log.start_transaction().await
    }

    /// Writes `records` as a new data file and returns the actions describing
    /// it. The file lands in storage immediately; it only becomes part of the
    /// table when the actions are committed through a transaction.
    pub async fn insert(&self, records: &[Record]) -> Result<Vec<Action>, DeltaError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let file_name = format!("part-{}.parquet", Uuid::new_v4());
        let relative_path = format!("data/{}", file_name);
        let full_path = format!("{}{}", self.log.table_path(), relative_path);
        let timestamp = now_ms();

        let payload = serde_json::to_vec(records)?;
        let size = payload.len() as u64;
        self.log.storage().write_object(&full_path, payload).await?;
        tracing::debug!("Wrote data file {} ({} bytes)", full_path, size);

        Ok(vec![Action::Add(AddFile::new(relative_path, size, timestamp))])
    }

    /// Reads every record of the table at its latest snapshot.
    pub async fn read_all(&self) -> Result<Vec<Record>, DeltaError> {
        let snapshot = self.log.update().await?;
        self.read_files(&snapshot.active_files()).await
    }

    /// Reads and concatenates the records of the given data files, in order.
    pub(crate) async fn read_files(&self, files: &[AddFile]) -> Result<Vec<Record>, DeltaError> {
        let mut records = Vec::new();
        for file in files {
            let full_path = format!("{}{}", self.log.table_path(), file.path);
            let payload = self.log.storage().read_object(&full_path).await?;
            let file_records: Vec<Record> = serde_json::from_slice(&payload)?;
            records.extend(file_records);
        }
        Ok(records)
    }
}
