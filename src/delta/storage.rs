//! Storage abstraction consumed by the log.
//!
//! The log never talks to the object store client directly; it goes through
//! the [`Storage`] trait so tests (and future backends) can swap the
//! implementation. [`ObjectStorage`] is the production implementation: it
//! forwards to the cluster client and imposes the deadline the client itself
//! does not have.

use crate::store::client::StoreClient;
use crate::store::error::StoreError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads an object, failing with `NotFound` if it is missing.
    async fn read_object(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Writes an object with create-or-overwrite semantics. The write is
    /// atomic: readers see the old bytes or the new bytes, never a mix.
    async fn write_object(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError>;

    async fn object_exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Deletes an object; deleting an absent object succeeds.
    async fn delete_object(&self, path: &str) -> Result<(), StoreError>;

    /// Lists the paths of objects whose stored path starts with `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// [`Storage`] over the distributed object store, with a per-call deadline.
///
/// When the deadline expires the pending request is abandoned (its
/// correlation entry is cleaned up by the client) and `Timeout` is returned;
/// a response arriving later is discarded with a warning.
pub struct ObjectStorage {
    client: Arc<StoreClient>,
    timeout: Duration,
}

impl ObjectStorage {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self::with_timeout(client, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(client: Arc<StoreClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn deadline<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn read_object(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.deadline(self.client.get_object(path)).await
    }

    async fn write_object(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.deadline(self.client.put_object(path, data)).await
    }

    async fn object_exists(&self, path: &str) -> Result<bool, StoreError> {
        match self.deadline(self.client.get_object(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        self.deadline(self.client.delete_object(path)).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.deadline(self.client.list_objects(prefix)).await
    }
}
