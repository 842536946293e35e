//! Optimistic concurrency control for table commits.
//!
//! A transaction is single-shot: it captures the log's snapshot version as
//! its baseline, stages actions, and commits exactly once. The conflict check
//! is pessimistic on version numbers alone; read predicates and staged
//! metadata are recorded so a finer conflict analysis can use them later, but
//! they do not influence the current check.

use super::actions::{now_ms, Action, CommitInfo};
use super::error::DeltaError;
use super::log::DeltaLog;
use super::snapshot::Snapshot;
use super::table::{DeltaTable, Record};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_MAX_RETRY_COUNT: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// How strictly a commit is checked against concurrent transactions.
///
/// Both levels currently share the version-based conflict predicate; the
/// level is recorded in the commit info as a ready-for-extension marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// The transaction appears to have occurred at a single point in time,
    /// with no concurrent transactions.
    Serializable,
    /// Only write operations cause conflicts, allowing concurrent reads.
    WriteSerializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::WriteSerializable => "WRITE_SERIALIZABLE",
        }
    }
}

pub struct OptimisticTransaction {
    log: Arc<DeltaLog>,
    table: DeltaTable,
    isolation_level: IsolationLevel,
    read_version: i64,
    baseline: Arc<Snapshot>,
    app_id: String,
    actions: Mutex<Vec<Action>>,
    read_predicates: Mutex<HashSet<String>>,
    new_metadata: Mutex<HashMap<String, String>>,
    committed: AtomicBool,
    max_retry_count: u32,
}

impl OptimisticTransaction {
    /// Captures the log's current snapshot as this transaction's baseline.
    pub(crate) async fn begin(
        log: Arc<DeltaLog>,
        isolation_level: IsolationLevel,
    ) -> Result<Self, DeltaError> {
        let baseline = log.update().await?;
        Ok(Self {
            table: DeltaTable::with_log(log.clone()),
            log,
            isolation_level,
            read_version: baseline.version(),
            baseline,
            app_id: Uuid::new_v4().to_string(),
            actions: Mutex::new(Vec::new()),
            read_predicates: Mutex::new(HashSet::new()),
            new_metadata: Mutex::new(HashMap::new()),
            committed: AtomicBool::new(false),
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
        })
    }

    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count;
        self
    }

    /// The log version this transaction observed at construction; the commit
    /// succeeds only if no newer version has appeared since.
    pub fn read_version(&self) -> i64 {
        self.read_version
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The staged actions so far.
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    /// Stages an action. Fails once the transaction has committed.
    pub fn add_action(&self, action: Action) -> Result<(), DeltaError> {
        if self.committed.load(Ordering::SeqCst) {
            return Err(DeltaError::AlreadyCommitted);
        }
        self.actions.lock().unwrap().push(action);
        Ok(())
    }

    /// Records that a predicate was read as part of this transaction.
    pub fn read_predicate(&self, predicate: impl Into<String>) {
        self.read_predicates.lock().unwrap().insert(predicate.into());
    }

    /// Records a file read for conflict analysis.
    pub fn read_file(&self, path: &str) {
        self.read_predicate(format!("file:{}", path));
    }

    /// Records a metadata read for conflict analysis.
    pub fn read_metadata(&self, key: &str) {
        self.read_predicate(format!("metadata:{}", key));
    }

    /// Stages a metadata update.
    pub fn update_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.new_metadata.lock().unwrap().insert(key.into(), value.into());
    }

    /// Writes `records` to a new data file and stages the resulting actions.
    pub async fn insert(&self, records: &[Record]) -> Result<Vec<Action>, DeltaError> {
        if self.committed.load(Ordering::SeqCst) {
            return Err(DeltaError::AlreadyCommitted);
        }
        let actions = self.table.insert(records).await?;
        let mut staged = self.actions.lock().unwrap();
        staged.extend(actions.iter().cloned());
        Ok(actions)
    }

    /// Reads every record visible to this transaction's baseline snapshot.
    pub async fn read_all(&self) -> Result<Vec<Record>, DeltaError> {
        self.table.read_files(&self.baseline.active_files()).await
    }

    /// Commits the staged actions as the next version.
    ///
    /// Protocol: take the log's commit lock, refresh the snapshot, fail with
    /// `ConcurrentModification` if anything committed past the baseline,
    /// append a commit-info action, write `read_version + 1`, refresh again.
    /// The lock guard releases on every exit path. Returns the committed
    /// version; afterwards the transaction is terminal.
    pub async fn commit(&self, operation: &str) -> Result<i64, DeltaError> {
        if self.committed.load(Ordering::SeqCst) {
            return Err(DeltaError::AlreadyCommitted);
        }

        let _guard = self.log.lock().await;

        let current = self.log.update_locked().await?;
        if current.version() > self.read_version {
            return Err(DeltaError::ConcurrentModification {
                read: self.read_version,
                current: current.version(),
            });
        }

        let commit_info = CommitInfo::create(operation)
            .with_parameter("isolationLevel", self.isolation_level.as_str())
            .with_parameter("startVersion", self.read_version.to_string())
            .with_parameter("commitTime", now_ms().to_string());

        let mut to_write = self.actions.lock().unwrap().clone();
        to_write.push(Action::CommitInfo(commit_info));

        let next_version = self.read_version + 1;
        self.log.write(next_version, &to_write).await?;
        self.log.update_locked().await?;
        self.committed.store(true, Ordering::SeqCst);
        tracing::info!(
            "Committed version {} ({} actions, operation {})",
            next_version,
            to_write.len(),
            operation
        );
        Ok(next_version)
    }

    /// [`commit`] with exponential backoff on conflicts.
    ///
    /// Retrying does not re-stage against a fresh snapshot: a conflict keeps
    /// conflicting until the caller builds a new transaction, so this only
    /// helps when the competing writer has not advanced the log yet at
    /// re-check time. Non-conflict errors propagate immediately.
    ///
    /// [`commit`]: OptimisticTransaction::commit
    pub async fn commit_with_retry(&self, operation: &str) -> Result<i64, DeltaError> {
        let mut attempts = 0;
        loop {
            match self.commit(operation).await {
                Ok(version) => return Ok(version),
                Err(conflict @ DeltaError::ConcurrentModification { .. }) => {
                    attempts += 1;
                    if attempts >= self.max_retry_count {
                        return Err(DeltaError::RetriesExhausted {
                            attempts,
                            source: Box::new(conflict),
                        });
                    }
                    let backoff = RETRY_BASE_DELAY * 2u32.pow(attempts);
                    tracing::debug!(
                        "Commit attempt {} conflicted; retrying in {:?}",
                        attempts,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
