use crate::store::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeltaError {
    /// The log moved past the transaction's read version before it committed.
    /// The transaction cannot be salvaged; build a new one from the current
    /// snapshot and re-stage.
    #[error("conflict detected: version {current} was committed after read version {read}")]
    ConcurrentModification { read: i64, current: i64 },

    #[error("version number cannot be negative: {0}")]
    NegativeVersion(i64),

    #[error("invalid delta log file name: {0}")]
    InvalidLogFileName(String),

    #[error("transaction already committed")]
    AlreadyCommitted,

    #[error("failed to commit after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<DeltaError>,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("invalid log entry: {0}")]
    Encoding(#[from] serde_json::Error),
}
