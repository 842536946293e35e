//! Simulated Network Module
//!
//! Provides the in-process transport every other subsystem communicates over.
//! There are no sockets: messages are scheduled on an integer tick clock and
//! delivered to handlers registered on a message bus.
//!
//! ## Core Mechanisms
//! - **Tick Scheduling**: `SimulatedNetwork` holds a priority queue of scheduled
//!   messages ordered by delivery tick, with a sequence number as FIFO tie-break.
//!   Each call to `tick()` advances the clock and drains everything that is due.
//! - **Fault Injection**: Message loss rate, a latency range in ticks, bandwidth
//!   limits, and bidirectional partitions can all be reconfigured at runtime to
//!   test the layers above under degraded conditions.
//! - **Dispatch**: `MessageBus` owns the endpoint-to-handler registry and a
//!   background ticker task that drives the network at a wall-clock interval.
//!   Tests drive ticks manually instead for full determinism.

pub mod bus;
pub mod simulation;
pub mod types;

#[cfg(test)]
mod tests;
