//! Network Module Tests
//!
//! Validates the simulated transport underneath everything else.
//!
//! ## Test Scopes
//! - **Scheduling**: minimum one-tick delay, FIFO among equal delivery ticks,
//!   strict ordering across ticks, bandwidth-limit overflow.
//! - **Fault Injection**: partitions (including re-checks at delivery time),
//!   full message loss, reset.
//! - **Bus Dispatch**: handler registration, refusal to send when stopped,
//!   panic containment.

#[cfg(test)]
mod tests {
    use crate::network::bus::{MessageBus, MessageHandler};
    use crate::network::simulation::SimulatedNetwork;
    use crate::network::types::{Endpoint, MessageEnvelope};
    use crate::store::protocol::Message;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::new("localhost", port)
    }

    fn envelope(id: u64, source: &Endpoint, destination: &Endpoint) -> MessageEnvelope {
        MessageEnvelope::new(
            id,
            source.clone(),
            destination.clone(),
            Message::GetObject {
                key: format!("key-{}", id),
                correlation_id: id.to_string(),
            },
        )
    }

    fn delivered_ids(network: &SimulatedNetwork) -> Vec<u64> {
        let mut ids = Vec::new();
        network.tick(|env, _| ids.push(env.message_id));
        ids
    }

    // ============================================================
    // SCHEDULING TESTS
    // ============================================================

    #[test]
    fn test_message_never_delivers_on_send_tick() {
        let network = SimulatedNetwork::new();
        let (a, b) = (endpoint(9001), endpoint(9002));

        assert!(network.send(envelope(1, &a, &b)));
        assert_eq!(network.queue_len(), 1);

        // Zero configured latency still means delivery on the next tick.
        assert_eq!(delivered_ids(&network), vec![1]);
    }

    #[test]
    fn test_fifo_order_for_equal_delivery_ticks() {
        let network = SimulatedNetwork::new();
        network.set_latency(1, 1);
        let (a, b) = (endpoint(9001), endpoint(9002));

        for id in 0..20 {
            assert!(network.send(envelope(id, &a, &b)));
        }

        let ids = delivered_ids(&network);
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_cross_tick_ordering_is_strict() {
        let network = SimulatedNetwork::new();
        let (a, b) = (endpoint(9001), endpoint(9002));

        network.set_latency(3, 3);
        network.send(envelope(1, &a, &b));
        network.set_latency(1, 1);
        network.send(envelope(2, &a, &b));

        // Message 2 is due at tick 1, message 1 at tick 3.
        assert_eq!(delivered_ids(&network), vec![2]);
        assert_eq!(delivered_ids(&network), Vec::<u64>::new());
        assert_eq!(delivered_ids(&network), vec![1]);
    }

    #[test]
    fn test_bandwidth_limit_defers_overflow_to_next_tick() {
        let network = SimulatedNetwork::new();
        network.set_latency(1, 1);
        network.set_bandwidth_limit(2);
        let (a, b) = (endpoint(9001), endpoint(9002));

        for id in 0..5 {
            network.send(envelope(id, &a, &b));
        }

        assert_eq!(delivered_ids(&network), vec![0, 1]);
        assert_eq!(delivered_ids(&network), vec![2, 3]);
        assert_eq!(delivered_ids(&network), vec![4]);
    }

    #[test]
    fn test_tick_counts_delivered_messages() {
        let network = SimulatedNetwork::new();
        let (a, b) = (endpoint(9001), endpoint(9002));
        network.send(envelope(1, &a, &b));
        network.send(envelope(2, &a, &b));

        let delivered = network.tick(|_, _| {});
        assert_eq!(delivered, 2);
        assert_eq!(network.current_tick(), 1);
    }

    // ============================================================
    // FAULT INJECTION TESTS
    // ============================================================

    #[test]
    fn test_partition_drops_sends_both_ways() {
        let network = SimulatedNetwork::new();
        let (a, b) = (endpoint(9001), endpoint(9002));
        network.disconnect(&a, &b);

        assert!(!network.send(envelope(1, &a, &b)));
        assert!(!network.send(envelope(2, &b, &a)));
        assert_eq!(network.queue_len(), 0);

        network.reconnect_all();
        assert!(network.send(envelope(3, &a, &b)));
        assert_eq!(delivered_ids(&network), vec![3]);
    }

    #[test]
    fn test_partition_rechecked_at_delivery_time() {
        let network = SimulatedNetwork::new();
        let (a, b) = (endpoint(9001), endpoint(9002));

        assert!(network.send(envelope(1, &a, &b)));
        network.disconnect(&a, &b);

        // The message was scheduled before the partition but must not slip through.
        assert_eq!(delivered_ids(&network), Vec::<u64>::new());
        assert_eq!(network.queue_len(), 0);
    }

    #[test]
    fn test_partition_leaves_other_pairs_untouched() {
        let network = SimulatedNetwork::new();
        let (a, b, c) = (endpoint(9001), endpoint(9002), endpoint(9003));
        network.disconnect(&a, &b);

        assert!(network.send(envelope(1, &a, &c)));
        assert!(network.send(envelope(2, &c, &b)));
        assert_eq!(delivered_ids(&network).len(), 2);
    }

    #[test]
    fn test_full_message_loss_drops_everything() {
        let network = SimulatedNetwork::new();
        network.set_message_loss_rate(1.0);
        let (a, b) = (endpoint(9001), endpoint(9002));

        for id in 0..10 {
            assert!(!network.send(envelope(id, &a, &b)));
        }
        assert_eq!(network.queue_len(), 0);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let network = SimulatedNetwork::new();
        let (a, b) = (endpoint(9001), endpoint(9002));
        network.set_message_loss_rate(1.0);
        network.disconnect(&a, &b);
        network.tick(|_, _| {});
        network.tick(|_, _| {});

        network.reset();

        assert_eq!(network.current_tick(), 0);
        assert_eq!(network.queue_len(), 0);
        assert!(network.can_communicate(&a, &b));
        // Loss rate is back to zero: sends succeed again.
        assert!(network.send(envelope(1, &a, &b)));
    }

    // ============================================================
    // MESSAGE BUS TESTS
    // ============================================================

    struct RecordingHandler {
        received: Arc<Mutex<Vec<Message>>>,
    }

    impl MessageHandler for RecordingHandler {
        fn handle_message(&self, message: Message, _sender: Endpoint) {
            self.received.lock().unwrap().push(message);
        }
    }

    struct PanickingHandler;

    impl MessageHandler for PanickingHandler {
        fn handle_message(&self, _message: Message, _sender: Endpoint) {
            panic!("handler blew up");
        }
    }

    fn recording_handler() -> (Arc<RecordingHandler>, Arc<Mutex<Vec<Message>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(RecordingHandler {
                received: received.clone(),
            }),
            received,
        )
    }

    /// Starts a bus whose ticker interval is effectively never, so tests
    /// drive ticks manually and stay deterministic.
    fn manual_bus() -> Arc<MessageBus> {
        let bus = MessageBus::new();
        bus.set_tick_interval(Duration::from_secs(3600));
        bus.start();
        bus
    }

    #[tokio::test]
    async fn test_send_refused_when_not_running() {
        let bus = MessageBus::new();
        let (a, b) = (endpoint(9001), endpoint(9002));

        bus.send(
            Message::GetObject {
                key: "k".to_string(),
                correlation_id: "c".to_string(),
            },
            a,
            b,
        );

        assert_eq!(bus.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_bus_dispatches_to_registered_handler() {
        let bus = manual_bus();
        let (a, b) = (endpoint(9001), endpoint(9002));
        let (handler, received) = recording_handler();
        bus.register_handler(b.clone(), handler);

        bus.send(
            Message::GetObject {
                key: "k".to_string(),
                correlation_id: "c".to_string(),
            },
            a,
            b,
        );
        assert_eq!(bus.tick_network(), 1);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].correlation_id(), "c");
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_unregistered_endpoint_drops_delivery() {
        let bus = manual_bus();
        let (a, b) = (endpoint(9001), endpoint(9002));
        let (handler, received) = recording_handler();
        bus.register_handler(b.clone(), handler);
        bus.unregister_handler(&b);

        bus.send(
            Message::GetObject {
                key: "k".to_string(),
                correlation_id: "c".to_string(),
            },
            a,
            b,
        );
        bus.tick_network();

        assert!(received.lock().unwrap().is_empty());
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let bus = manual_bus();
        let (a, b, c) = (endpoint(9001), endpoint(9002), endpoint(9003));
        bus.register_handler(b.clone(), Arc::new(PanickingHandler));
        let (handler, received) = recording_handler();
        bus.register_handler(c.clone(), handler);

        bus.send(
            Message::GetObject {
                key: "k1".to_string(),
                correlation_id: "c1".to_string(),
            },
            a.clone(),
            b,
        );
        bus.send(
            Message::GetObject {
                key: "k2".to_string(),
                correlation_id: "c2".to_string(),
            },
            a,
            c,
        );

        // The panic in the first handler must not stop the second delivery.
        bus.tick_network();
        assert_eq!(received.lock().unwrap().len(), 1);
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_no_deliveries_after_stop() {
        let bus = MessageBus::new();
        bus.set_tick_interval(Duration::from_millis(1));
        bus.start();
        let (a, b) = (endpoint(9001), endpoint(9002));
        let (handler, received) = recording_handler();
        bus.register_handler(b.clone(), handler);

        bus.stop().await;
        bus.send(
            Message::GetObject {
                key: "k".to_string(),
                correlation_id: "c".to_string(),
            },
            a,
            b,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(received.lock().unwrap().is_empty());
    }
}
