//! Message bus for communication between nodes in the cluster.
//!
//! The bus pairs the endpoint-to-handler registry with a background ticker
//! task that drives the simulated network at a wall-clock interval. Handlers
//! run synchronously on the ticker task, so a single bus never processes two
//! deliveries concurrently; tests that need full determinism skip `start()`
//! and call [`MessageBus::tick_network`] themselves.

use super::simulation::SimulatedNetwork;
use super::types::{Endpoint, MessageEnvelope};
use crate::store::protocol::Message;
use dashmap::DashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives messages delivered to one endpoint.
///
/// Implementations must be cheap enough to run inline on the ticker task;
/// anything long-running belongs on its own task.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: Message, sender: Endpoint);
}

pub struct MessageBus {
    handlers: DashMap<Endpoint, Arc<dyn MessageHandler>>,
    network: SimulatedNetwork,
    message_ids: AtomicU64,
    running: AtomicBool,
    tick_interval: Mutex<Duration>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    stop_signal: Mutex<Option<watch::Sender<bool>>>,
}

impl MessageBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
            network: SimulatedNetwork::new(),
            message_ids: AtomicU64::new(0),
            running: AtomicBool::new(false),
            tick_interval: Mutex::new(DEFAULT_TICK_INTERVAL),
            ticker: Mutex::new(None),
            stop_signal: Mutex::new(None),
        })
    }

    /// Sets the interval between network ticks. Takes effect from the next
    /// tick onward, including while the ticker is already running.
    ///
    /// # Panics
    /// Panics if the interval is zero.
    pub fn set_tick_interval(&self, interval: Duration) {
        assert!(!interval.is_zero(), "tick interval must be positive");
        *self.tick_interval.lock().unwrap() = interval;
    }

    /// Starts the background ticker task.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        *self.stop_signal.lock().unwrap() = Some(stop_tx);

        let bus = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let interval = *bus.tick_interval.lock().unwrap();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let delivered = bus.tick_network();
                        if delivered > 0 {
                            tracing::debug!("Network tick delivered {} messages", delivered);
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });
        *self.ticker.lock().unwrap() = Some(handle);
        tracing::info!("MessageBus started");
    }

    /// Stops the ticker and waits for it to finish, aborting the task if it
    /// does not stop within five seconds. No deliveries happen afterwards.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_signal.lock().unwrap().take() {
            let _ = stop_tx.send(true);
        }
        let handle = self.ticker.lock().unwrap().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Ticker did not stop in time; aborting");
                handle.abort();
            }
        }
        tracing::info!("MessageBus stopped");
    }

    /// Registers a handler for a specific endpoint.
    pub fn register_handler(&self, endpoint: Endpoint, handler: Arc<dyn MessageHandler>) {
        tracing::info!("Registering handler for endpoint: {}", endpoint);
        self.handlers.insert(endpoint, handler);
    }

    /// Unregisters the handler for a specific endpoint.
    pub fn unregister_handler(&self, endpoint: &Endpoint) {
        self.handlers.remove(endpoint);
        tracing::info!("Unregistered handler for endpoint: {}", endpoint);
    }

    /// Sends a message from a source endpoint to a destination endpoint.
    ///
    /// Failures to enqueue are silent: a dropped message is observable only
    /// through the absence of a response.
    pub fn send(&self, message: Message, source: Endpoint, destination: Endpoint) {
        if !self.running.load(Ordering::SeqCst) {
            tracing::warn!("Cannot send message when MessageBus is not running");
            return;
        }

        let message_id = self.message_ids.fetch_add(1, Ordering::SeqCst) + 1;
        let kind = message.kind();
        let envelope = MessageEnvelope::new(message_id, source.clone(), destination.clone(), message);

        if self.network.send(envelope) {
            tracing::debug!("Queued message {} from {} to {}", kind, source, destination);
        } else {
            tracing::debug!("Message {} from {} to {} was dropped", kind, source, destination);
        }
    }

    /// Advances the network by one tick, dispatching due messages to their
    /// handlers. Public so tests can drive the clock manually.
    pub fn tick_network(&self) -> usize {
        self.network.tick(|envelope, _context| self.deliver(envelope))
    }

    fn deliver(&self, envelope: MessageEnvelope) {
        let Some(handler) = self
            .handlers
            .get(&envelope.destination)
            .map(|entry| entry.value().clone())
        else {
            tracing::warn!("No handler found for endpoint: {}", envelope.destination);
            return;
        };

        let kind = envelope.payload.kind();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle_message(envelope.payload, envelope.source.clone());
        }));
        match result {
            Ok(()) => tracing::debug!(
                "Successfully delivered message {} from {} to {}",
                kind,
                envelope.source,
                envelope.destination
            ),
            Err(_) => tracing::error!(
                "Handler panicked processing message {} from {} to {}",
                kind,
                envelope.source,
                envelope.destination
            ),
        }
    }

    /// Resets the network state and the message id counter.
    pub fn reset(&self) {
        self.network.reset();
        self.message_ids.store(0, Ordering::SeqCst);
        tracing::info!("MessageBus reset");
    }

    pub fn set_message_loss_rate(&self, rate: f64) {
        self.network.set_message_loss_rate(rate);
    }

    pub fn set_network_latency(&self, min_ticks: u64, max_ticks: u64) {
        self.network.set_latency(min_ticks, max_ticks);
    }

    pub fn set_bandwidth_limit(&self, max_messages_per_tick: usize) {
        self.network.set_bandwidth_limit(max_messages_per_tick);
    }

    pub fn disconnect_endpoints(&self, a: &Endpoint, b: &Endpoint) {
        self.network.disconnect(a, b);
    }

    pub fn reconnect_all_endpoints(&self) {
        self.network.reconnect_all();
    }

    pub fn current_tick(&self) -> u64 {
        self.network.current_tick()
    }

    pub fn queue_len(&self) -> usize {
        self.network.queue_len()
    }
}
