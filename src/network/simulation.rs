//! Tick-driven message scheduler with configurable fault injection.
//!
//! The simulator never touches wall-clock time: one call to [`SimulatedNetwork::tick`]
//! is one unit of simulated time. Everything else (loss, latency, partitions,
//! bandwidth) is expressed in terms of ticks, which keeps tests deterministic.

use super::types::{DeliveryContext, Endpoint, MessageEnvelope, ScheduledMessage};
use dashmap::DashMap;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;

const DEFAULT_MESSAGE_LOSS_RATE: f64 = 0.0;
const DEFAULT_MIN_LATENCY_TICKS: u64 = 0;
const DEFAULT_MAX_LATENCY_TICKS: u64 = 0;
const DEFAULT_MAX_MESSAGES_PER_TICK: usize = usize::MAX;

struct NetworkConfig {
    message_loss_rate: f64,
    min_latency_ticks: u64,
    max_latency_ticks: u64,
    max_messages_per_tick: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            message_loss_rate: DEFAULT_MESSAGE_LOSS_RATE,
            min_latency_ticks: DEFAULT_MIN_LATENCY_TICKS,
            max_latency_ticks: DEFAULT_MAX_LATENCY_TICKS,
            max_messages_per_tick: DEFAULT_MAX_MESSAGES_PER_TICK,
        }
    }
}

struct SchedulerState {
    current_tick: u64,
    queue: BinaryHeap<Reverse<ScheduledMessage>>,
    next_sequence: u64,
}

impl SchedulerState {
    fn allocate_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }
}

/// Simulates a network with configurable conditions like message loss,
/// latency, and partitioning.
pub struct SimulatedNetwork {
    state: Mutex<SchedulerState>,
    config: Mutex<NetworkConfig>,
    disconnected: DashMap<Endpoint, HashSet<Endpoint>>,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                current_tick: 0,
                queue: BinaryHeap::new(),
                next_sequence: 0,
            }),
            config: Mutex::new(NetworkConfig::default()),
            disconnected: DashMap::new(),
        }
    }

    /// Sets the fraction of sends that are silently dropped.
    ///
    /// # Panics
    /// Panics if the rate is outside `[0.0, 1.0]`.
    pub fn set_message_loss_rate(&self, rate: f64) {
        assert!(
            (0.0..=1.0).contains(&rate),
            "message loss rate must be between 0.0 and 1.0"
        );
        self.config.lock().unwrap().message_loss_rate = rate;
    }

    /// Sets the delivery latency range in ticks.
    ///
    /// # Panics
    /// Panics if `min_ticks > max_ticks`.
    pub fn set_latency(&self, min_ticks: u64, max_ticks: u64) {
        assert!(
            min_ticks <= max_ticks,
            "minimum latency cannot be greater than maximum latency"
        );
        let mut config = self.config.lock().unwrap();
        config.min_latency_ticks = min_ticks;
        config.max_latency_ticks = max_ticks;
    }

    /// Caps how many messages a single tick may deliver; overflow is pushed
    /// to the next tick.
    pub fn set_bandwidth_limit(&self, max_messages_per_tick: usize) {
        self.config.lock().unwrap().max_messages_per_tick = max_messages_per_tick;
    }

    /// Creates a bidirectional partition between two endpoints. Messages sent
    /// between them in either direction are dropped until [`reconnect_all`]
    /// is called.
    ///
    /// [`reconnect_all`]: SimulatedNetwork::reconnect_all
    pub fn disconnect(&self, a: &Endpoint, b: &Endpoint) {
        self.disconnected
            .entry(a.clone())
            .or_default()
            .insert(b.clone());
        self.disconnected
            .entry(b.clone())
            .or_default()
            .insert(a.clone());
        tracing::info!("Disconnected endpoints bidirectionally: {} <-> {}", a, b);
    }

    /// Removes all partitions.
    pub fn reconnect_all(&self) {
        self.disconnected.clear();
        tracing::info!("Cleared all network disconnections");
    }

    /// Whether messages can currently flow from `source` to `destination`.
    pub fn can_communicate(&self, source: &Endpoint, destination: &Endpoint) -> bool {
        self.disconnected
            .get(source)
            .map(|peers| !peers.contains(destination))
            .unwrap_or(true)
    }

    /// Schedules a message for delivery.
    ///
    /// Returns `true` if the message was queued, `false` if it was dropped by
    /// a partition or by random loss. Delivery always happens at least one
    /// tick after the send, never on the same tick.
    pub fn send(&self, envelope: MessageEnvelope) -> bool {
        if !self.can_communicate(&envelope.source, &envelope.destination) {
            tracing::debug!(
                "Message dropped due to network partition: {} -> {}, type: {}",
                envelope.source,
                envelope.destination,
                envelope.payload.kind()
            );
            return false;
        }

        let (loss_rate, min_latency, max_latency) = {
            let config = self.config.lock().unwrap();
            (
                config.message_loss_rate,
                config.min_latency_ticks,
                config.max_latency_ticks,
            )
        };

        if loss_rate > 0.0 && rand::thread_rng().gen_bool(loss_rate) {
            tracing::debug!(
                "Message dropped due to random loss: {} -> {}, type: {}, loss rate: {}",
                envelope.source,
                envelope.destination,
                envelope.payload.kind(),
                loss_rate
            );
            return false;
        }

        let delay = if min_latency == max_latency {
            min_latency
        } else {
            rand::thread_rng().gen_range(min_latency..=max_latency)
        };

        let mut state = self.state.lock().unwrap();
        let delivery_tick = state.current_tick + delay.max(1);
        let sequence_number = state.allocate_sequence();
        tracing::debug!(
            "Message from {} to {} scheduled for delivery at tick {}, type: {}",
            envelope.source,
            envelope.destination,
            delivery_tick,
            envelope.payload.kind()
        );
        state.queue.push(Reverse(ScheduledMessage {
            envelope,
            delivery_tick,
            sequence_number,
        }));
        true
    }

    /// Advances the simulation by one tick and delivers every due message
    /// through `deliver`.
    ///
    /// Messages beyond the bandwidth limit are re-enqueued for the next tick
    /// with freshly allocated sequence numbers, so their relative order is
    /// kept but they may interleave with messages arriving at the boundary.
    /// The partition predicate is re-checked at delivery time because
    /// partitions may have changed since a message was scheduled.
    ///
    /// Returns the number of messages delivered.
    pub fn tick(&self, mut deliver: impl FnMut(MessageEnvelope, DeliveryContext)) -> usize {
        let due = {
            let max_messages = self.config.lock().unwrap().max_messages_per_tick;
            let mut state = self.state.lock().unwrap();
            state.current_tick += 1;
            let current_tick = state.current_tick;
            tracing::debug!("SimulatedNetwork advanced to tick {}", current_tick);

            let mut due = Vec::new();
            while let Some(Reverse(next)) = state.queue.peek() {
                if next.delivery_tick > current_tick {
                    break;
                }
                let Some(Reverse(message)) = state.queue.pop() else {
                    break;
                };
                if due.len() < max_messages {
                    due.push(message.envelope);
                } else {
                    // Bandwidth limit reached; push to the next tick.
                    let sequence_number = state.allocate_sequence();
                    state.queue.push(Reverse(ScheduledMessage {
                        envelope: message.envelope,
                        delivery_tick: current_tick + 1,
                        sequence_number,
                    }));
                }
            }
            due
        };

        // The scheduler lock is released before handlers run: a handler is
        // allowed to send new messages from inside the delivery callback.
        let mut delivered = 0;
        for envelope in due {
            if !self.can_communicate(&envelope.source, &envelope.destination) {
                tracing::debug!(
                    "Delayed message dropped due to network partition: {} -> {}, type: {}",
                    envelope.source,
                    envelope.destination,
                    envelope.payload.kind()
                );
                continue;
            }
            let context = DeliveryContext {
                source: envelope.source.clone(),
                destination: envelope.destination.clone(),
            };
            deliver(envelope, context);
            delivered += 1;
        }
        delivered
    }

    /// Restores default settings, clears the queue and all partitions, and
    /// rewinds the tick counter to zero.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.current_tick = 0;
        state.queue.clear();
        *self.config.lock().unwrap() = NetworkConfig::default();
        self.disconnected.clear();
        tracing::info!("Reset network state");
    }

    pub fn current_tick(&self) -> u64 {
        self.state.lock().unwrap().current_tick
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new()
    }
}
