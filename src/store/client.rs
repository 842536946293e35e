//! Object store client.
//!
//! The client is the async face of the store: every operation allocates a
//! correlation id, registers a pending future, routes the request to the
//! owning server through the hash ring, and resolves when the response comes
//! back over the bus. `list_objects` is the exception: a prefix does not hash
//! to one shard, so it fans out to every known server and unions the results.
//!
//! The client never times out by itself; deadlines are imposed by the storage
//! facade layered on top. A pending entry is removed either when its response
//! arrives or when the awaiting future is dropped, so an abandoned request
//! cannot leak map entries, and a late response only produces a warning.

use super::error::StoreError;
use super::protocol::Message;
use super::ring::HashRing;
use crate::network::bus::{MessageBus, MessageHandler};
use crate::network::types::Endpoint;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

pub struct StoreClient {
    bus: Arc<MessageBus>,
    endpoint: Endpoint,
    ring: HashRing,
    pending: DashMap<String, oneshot::Sender<Message>>,
}

/// Removes a pending-request entry when dropped.
///
/// Completion removes the entry first, making the drop a no-op; cancellation
/// (e.g. a facade timeout dropping the op future) hits the removal path here.
struct PendingCleanup<'a> {
    pending: &'a DashMap<String, oneshot::Sender<Message>>,
    correlation_id: String,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.correlation_id);
    }
}

impl StoreClient {
    /// Creates a client, registers it on the bus, and seeds the hash ring
    /// with the known servers.
    pub fn new(
        bus: Arc<MessageBus>,
        endpoint: Endpoint,
        server_endpoints: Vec<Endpoint>,
    ) -> Arc<Self> {
        let client = Arc::new(Self {
            bus: bus.clone(),
            endpoint: endpoint.clone(),
            ring: HashRing::new(),
            pending: DashMap::new(),
        });
        bus.register_handler(endpoint, client.clone());
        for server in server_endpoints {
            client.ring.add_server(server);
        }
        client
    }

    pub fn add_server(&self, server: Endpoint) {
        self.ring.add_server(server);
    }

    pub fn remove_server(&self, server: &Endpoint) {
        self.ring.remove_server(server);
    }

    /// The server a key routes to under the current ring.
    pub fn target_server(&self, key: &str) -> Endpoint {
        self.ring.server_for_key(key)
    }

    async fn request(
        &self,
        target: Endpoint,
        build: impl FnOnce(String) -> Message,
    ) -> Result<Message, StoreError> {
        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id.clone(), tx);
        let _cleanup = PendingCleanup {
            pending: &self.pending,
            correlation_id: correlation_id.clone(),
        };
        self.bus
            .send(build(correlation_id), self.endpoint.clone(), target);
        rx.await.map_err(|_| StoreError::Disconnected)
    }

    /// Stores a blob, overwriting any existing value for the key.
    pub async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        tracing::debug!("Sending PUT_OBJECT for key {}", key);
        let target = self.target_server(key);
        let key_owned = key.to_string();
        let response = self
            .request(target, move |correlation_id| Message::PutObject {
                key: key_owned,
                data,
                overwrite: true,
                correlation_id,
            })
            .await?;
        match response {
            Message::PutObjectResponse { ok: true, .. } => {
                tracing::debug!("PUT_OBJECT successful for key {}", key);
                Ok(())
            }
            Message::PutObjectResponse { error, .. } => Err(StoreError::Server(
                error.unwrap_or_else(|| "put failed".to_string()),
            )),
            other => Err(StoreError::Server(format!(
                "unexpected response {} to PUT_OBJECT",
                other.kind()
            ))),
        }
    }

    /// Fetches the blob stored under `key`.
    ///
    /// Any server-side failure surfaces as `NotFound` carrying the exact
    /// `Failed to retrieve object: <key>` message; existence probes rely on
    /// that marker.
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        tracing::debug!("Sending GET_OBJECT for key {}", key);
        let target = self.target_server(key);
        let key_owned = key.to_string();
        let response = self
            .request(target, move |correlation_id| Message::GetObject {
                key: key_owned,
                correlation_id,
            })
            .await?;
        match response {
            Message::GetObjectResponse {
                ok: true,
                data: Some(data),
                ..
            } => {
                tracing::debug!("GET_OBJECT successful for key {}", key);
                Ok(data)
            }
            Message::GetObjectResponse { .. } => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            other => Err(StoreError::Server(format!(
                "unexpected response {} to GET_OBJECT",
                other.kind()
            ))),
        }
    }

    /// Deletes `key`; deleting an absent key succeeds.
    pub async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        tracing::debug!("Sending DELETE_OBJECT for key {}", key);
        let target = self.target_server(key);
        let key_owned = key.to_string();
        let response = self
            .request(target, move |correlation_id| Message::DeleteObject {
                key: key_owned,
                correlation_id,
            })
            .await?;
        match response {
            Message::DeleteObjectResponse { ok: true, .. } => {
                tracing::debug!("DELETE_OBJECT successful for key {}", key);
                Ok(())
            }
            Message::DeleteObjectResponse { error, .. } => Err(StoreError::Server(
                error.unwrap_or_else(|| "delete failed".to_string()),
            )),
            other => Err(StoreError::Server(format!(
                "unexpected response {} to DELETE_OBJECT",
                other.kind()
            ))),
        }
    }

    /// Lists keys matching `prefix` across the whole cluster.
    ///
    /// The request is broadcast to every known server; all requests are in
    /// flight before the first response is awaited. A failing server logs a
    /// warning and contributes nothing. Results are deduplicated and returned
    /// in unspecified order.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        tracing::debug!("Sending LIST_OBJECTS for prefix {}", prefix);
        let mut in_flight = Vec::new();
        for server in self.ring.servers() {
            let correlation_id = Uuid::new_v4().to_string();
            let (tx, rx) = oneshot::channel();
            self.pending.insert(correlation_id.clone(), tx);
            let cleanup = PendingCleanup {
                pending: &self.pending,
                correlation_id: correlation_id.clone(),
            };
            self.bus.send(
                Message::ListObjects {
                    prefix: prefix.to_string(),
                    correlation_id,
                },
                self.endpoint.clone(),
                server.clone(),
            );
            in_flight.push((server, rx, cleanup));
        }

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (server, rx, _cleanup) in in_flight {
            match rx.await {
                Ok(Message::ListObjectsResponse {
                    ok: true,
                    keys: server_keys,
                    ..
                }) => {
                    for key in server_keys {
                        if seen.insert(key.clone()) {
                            keys.push(key);
                        }
                    }
                }
                Ok(Message::ListObjectsResponse { error, .. }) => {
                    tracing::warn!(
                        "Failed to list objects from server {}: {}",
                        server,
                        error.unwrap_or_else(|| "unknown error".to_string())
                    );
                }
                Ok(other) => {
                    tracing::warn!(
                        "Unexpected response {} to LIST_OBJECTS from {}",
                        other.kind(),
                        server
                    );
                }
                Err(_) => {
                    tracing::warn!("Lost response channel listing objects from {}", server);
                }
            }
        }
        Ok(keys)
    }
}

impl MessageHandler for StoreClient {
    fn handle_message(&self, message: Message, _sender: Endpoint) {
        let correlation_id = message.correlation_id().to_string();
        match self.pending.remove(&correlation_id) {
            Some((_, tx)) => {
                // A receiver dropped between removal and send just means the
                // caller gave up; nothing to do.
                let _ = tx.send(message);
            }
            None => {
                tracing::warn!("No pending request found for correlationId: {}", correlation_id);
            }
        }
    }
}
