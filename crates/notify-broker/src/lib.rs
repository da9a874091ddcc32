//! # notify-broker
//!
//! Kafka producer/consumer plumbing for the enqueue pipeline and the
//! Worker's broker-side loop. Grounded on the corpus's only Kafka-bus
//! reference (`other_examples/.../kafka_bus.rs`); the teacher workspace
//! has no broker client of its own.

pub mod consumer;
pub mod producer;

pub use consumer::{BrokerConsumer, QueueHandler};
pub use producer::BrokerProducer;
