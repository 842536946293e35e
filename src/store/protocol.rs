//! Object Store Wire Protocol
//!
//! Defines the request/response message pairs exchanged between store clients
//! and servers over the message bus.
//!
//! Every request carries a `correlation_id` (a UUIDv4 string) and the matching
//! response echoes it, so an asynchronous client can pair them up. Expressing
//! the protocol as one tagged sum type keeps handler code free of downcasts:
//! servers and clients simply match on the variant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Store a blob under a key. `overwrite = false` makes the put fail if
    /// the key already exists.
    PutObject {
        key: String,
        data: Vec<u8>,
        overwrite: bool,
        correlation_id: String,
    },
    PutObjectResponse {
        key: String,
        ok: bool,
        error: Option<String>,
        correlation_id: String,
    },

    /// Fetch the blob stored under a key.
    GetObject {
        key: String,
        correlation_id: String,
    },
    GetObjectResponse {
        key: String,
        data: Option<Vec<u8>>,
        ok: bool,
        error: Option<String>,
        correlation_id: String,
    },

    /// Delete a key. Deleting an absent key succeeds.
    DeleteObject {
        key: String,
        correlation_id: String,
    },
    DeleteObjectResponse {
        key: String,
        ok: bool,
        error: Option<String>,
        correlation_id: String,
    },

    /// List the keys on one server whose stored path starts with a prefix.
    /// A prefix is not hashable to a single shard, so clients broadcast this
    /// to every server and union the results.
    ListObjects {
        prefix: String,
        correlation_id: String,
    },
    ListObjectsResponse {
        prefix: String,
        keys: Vec<String>,
        ok: bool,
        error: Option<String>,
        correlation_id: String,
    },
}

impl Message {
    /// The correlation id linking a request to its response.
    pub fn correlation_id(&self) -> &str {
        match self {
            Message::PutObject { correlation_id, .. }
            | Message::PutObjectResponse { correlation_id, .. }
            | Message::GetObject { correlation_id, .. }
            | Message::GetObjectResponse { correlation_id, .. }
            | Message::DeleteObject { correlation_id, .. }
            | Message::DeleteObjectResponse { correlation_id, .. }
            | Message::ListObjects { correlation_id, .. }
            | Message::ListObjectsResponse { correlation_id, .. } => correlation_id,
        }
    }

    /// Short name of the message kind, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PutObject { .. } => "PUT_OBJECT",
            Message::PutObjectResponse { .. } => "PUT_OBJECT_RESPONSE",
            Message::GetObject { .. } => "GET_OBJECT",
            Message::GetObjectResponse { .. } => "GET_OBJECT_RESPONSE",
            Message::DeleteObject { .. } => "DELETE_OBJECT",
            Message::DeleteObjectResponse { .. } => "DELETE_OBJECT_RESPONSE",
            Message::ListObjects { .. } => "LIST_OBJECTS",
            Message::ListObjectsResponse { .. } => "LIST_OBJECTS_RESPONSE",
        }
    }
}
