//! Object store server.
//!
//! A stateless RPC handler: each incoming request is executed against the
//! server's `LocalStorage` and answered with the matching response message,
//! echoing the request's correlation id. Errors never propagate out of the
//! handler; they travel back to the caller as `ok = false` responses, subject
//! to the same network conditions as everything else.

use super::local::LocalStorage;
use super::protocol::Message;
use crate::network::bus::{MessageBus, MessageHandler};
use crate::network::types::Endpoint;
use std::sync::Arc;

pub struct StoreServer {
    server_id: String,
    endpoint: Endpoint,
    storage: LocalStorage,
    bus: Arc<MessageBus>,
}

impl StoreServer {
    /// Creates a server and registers it on the bus under its endpoint.
    pub fn new(
        server_id: impl Into<String>,
        storage: LocalStorage,
        bus: Arc<MessageBus>,
        endpoint: Endpoint,
    ) -> Arc<Self> {
        let server = Arc::new(Self {
            server_id: server_id.into(),
            endpoint: endpoint.clone(),
            storage,
            bus: bus.clone(),
        });
        bus.register_handler(endpoint.clone(), server.clone());
        tracing::info!("Server registered with MessageBus at endpoint {}", endpoint);
        server
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Removes this server from the bus; in-flight messages addressed to it
    /// will be dropped with a warning.
    pub fn shutdown(&self) {
        self.bus.unregister_handler(&self.endpoint);
    }

    fn reply(&self, response: Message, sender: Endpoint) {
        self.bus.send(response, self.endpoint.clone(), sender);
    }

    fn handle_put(&self, key: String, data: Vec<u8>, overwrite: bool, correlation_id: String, sender: Endpoint) {
        tracing::debug!("Handling PUT_OBJECT for key {}", key);
        let (ok, error) = match self.storage.put(&key, &data, overwrite) {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        self.reply(
            Message::PutObjectResponse {
                key,
                ok,
                error,
                correlation_id,
            },
            sender,
        );
    }

    fn handle_get(&self, key: String, correlation_id: String, sender: Endpoint) {
        tracing::debug!("Handling GET_OBJECT for key {}", key);
        let (data, ok, error) = match self.storage.get(&key) {
            Ok(data) => (Some(data), true, None),
            Err(e) => (None, false, Some(e.to_string())),
        };
        self.reply(
            Message::GetObjectResponse {
                key,
                data,
                ok,
                error,
                correlation_id,
            },
            sender,
        );
    }

    fn handle_delete(&self, key: String, correlation_id: String, sender: Endpoint) {
        tracing::debug!("Handling DELETE_OBJECT for key {}", key);
        let (ok, error) = match self.storage.delete(&key) {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        self.reply(
            Message::DeleteObjectResponse {
                key,
                ok,
                error,
                correlation_id,
            },
            sender,
        );
    }

    fn handle_list(&self, prefix: String, correlation_id: String, sender: Endpoint) {
        tracing::debug!("Handling LIST_OBJECTS with prefix {}", prefix);
        let (keys, ok, error) = match self.storage.list_objects(&prefix) {
            Ok(keys) => (keys, true, None),
            Err(e) => (Vec::new(), false, Some(e.to_string())),
        };
        self.reply(
            Message::ListObjectsResponse {
                prefix,
                keys,
                ok,
                error,
                correlation_id,
            },
            sender,
        );
    }
}

impl MessageHandler for StoreServer {
    fn handle_message(&self, message: Message, sender: Endpoint) {
        tracing::debug!(
            "Server {} received {} from {}",
            self.server_id,
            message.kind(),
            sender
        );
        match message {
            Message::PutObject {
                key,
                data,
                overwrite,
                correlation_id,
            } => self.handle_put(key, data, overwrite, correlation_id, sender),
            Message::GetObject {
                key,
                correlation_id,
            } => self.handle_get(key, correlation_id, sender),
            Message::DeleteObject {
                key,
                correlation_id,
            } => self.handle_delete(key, correlation_id, sender),
            Message::ListObjects {
                prefix,
                correlation_id,
            } => self.handle_list(prefix, correlation_id, sender),
            other => {
                tracing::warn!(
                    "Server {} ignoring unexpected message {}",
                    self.server_id,
                    other.kind()
                );
            }
        }
    }
}
