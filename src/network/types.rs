use crate::store::protocol::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a participant on the simulated network.
///
/// Endpoints are value types: two endpoints with the same host and port are
/// the same endpoint, regardless of where they were constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint from a host and port.
    ///
    /// # Panics
    /// Panics if the host is empty or the port is zero; both are programmer
    /// errors, not runtime conditions.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        assert!(!host.is_empty(), "host cannot be empty");
        assert!(port > 0, "port must be positive");
        Self { host, port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A message in flight between two endpoints.
///
/// The `message_id` is allocated by the bus and increases monotonically for
/// the lifetime of the bus; it identifies the send, not the request (requests
/// are correlated by the correlation id inside the payload).
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub message_id: u64,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub payload: Message,
}

impl MessageEnvelope {
    pub fn new(message_id: u64, source: Endpoint, destination: Endpoint, payload: Message) -> Self {
        Self {
            message_id,
            source,
            destination,
            payload,
        }
    }
}

/// Source and destination of a delivery, handed to the delivery callback.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub source: Endpoint,
    pub destination: Endpoint,
}

/// An envelope queued inside the simulator, waiting for its delivery tick.
///
/// Ordered by delivery tick first and sequence number second, so messages
/// scheduled for the same tick deliver in the order they were sent.
#[derive(Debug)]
pub(crate) struct ScheduledMessage {
    pub envelope: MessageEnvelope,
    pub delivery_tick: u64,
    pub sequence_number: u64,
}

impl PartialEq for ScheduledMessage {
    fn eq(&self, other: &Self) -> bool {
        self.delivery_tick == other.delivery_tick && self.sequence_number == other.sequence_number
    }
}

impl Eq for ScheduledMessage {}

impl PartialOrd for ScheduledMessage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledMessage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.delivery_tick
            .cmp(&other.delivery_tick)
            .then(self.sequence_number.cmp(&other.sequence_number))
    }
}
