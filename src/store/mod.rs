//! Distributed Object Store Module
//!
//! Implements a sharded byte-blob store on top of the simulated network.
//!
//! ## Core Concepts
//! - **Partitioning**: Each server owns the slice of the keyspace assigned to
//!   it by a consistent hash ring with virtual nodes. There is no replication:
//!   losing a server loses its shard.
//! - **Protocol**: Object operations travel as request/response message pairs
//!   over the message bus, matched up by a correlation id.
//! - **Access**: `StoreClient` acts as a smart client, routing each key to its
//!   owning server and resolving pending futures when responses arrive.
//!   `LocalStorage` is the per-server filesystem backend with atomic writes.

pub mod client;
pub mod error;
pub mod local;
pub mod protocol;
pub mod ring;
pub mod server;
