//! Transactional Table Layer over a Partitioned Object Store
//!
//! This library crate defines the core modules that make up the system.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of three tightly coupled subsystems:
//!
//! - **`network`**: A deterministic simulated transport. Messages are scheduled
//!   on an integer tick clock with configurable loss, latency, and partitions,
//!   and a message bus dispatches them to registered endpoint handlers.
//! - **`store`**: The distributed object store. Servers share a keyspace by
//!   consistent hashing; a client routes object RPCs over the message bus and
//!   correlates responses with pending futures.
//! - **`delta`**: The transactional table layer. An append-only versioned log
//!   of actions lives in the object store; optimistic transactions stage
//!   actions against a baseline snapshot and commit the next version only if
//!   no conflicting version appeared in the meantime.

pub mod delta;
pub mod network;
pub mod store;
