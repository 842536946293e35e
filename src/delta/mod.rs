//! Transactional Table Layer Module
//!
//! Implements a minimal lakehouse-style table format on top of the object
//! store: a table is a directory of opaque data files plus an append-only,
//! versioned log of actions under `_delta_log/`.
//!
//! ## Core Mechanisms
//! - **Versioned Log**: Each committed version is one JSON object at
//!   `<table>/_delta_log/<20-digit-version>.json` holding the ordered actions
//!   of that commit. The object write is atomic and is the commit point.
//! - **Snapshots**: Replaying all versions in ascending order materializes the
//!   set of active data files at a version. Snapshots are immutable values;
//!   the log caches the latest one and swaps it on update.
//! - **Optimistic Concurrency**: A transaction captures the snapshot version
//!   it started from, stages actions, and commits the next version only if no
//!   newer version has appeared since. Conflicts surface as
//!   `ConcurrentModification` and the caller retries with a fresh transaction.

pub mod actions;
pub mod error;
pub mod filename;
pub mod log;
pub mod snapshot;
pub mod storage;
pub mod table;
pub mod transaction;
