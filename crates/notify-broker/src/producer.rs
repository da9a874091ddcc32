//! Kafka producer used by the enqueue pipeline.

use notify_core::config::BrokerConfig;
use notify_core::error::{Error, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Thin wrapper around a `FutureProducer`, tuned for at-least-once
/// delivery: acks from all in-sync replicas, idempotent producer,
/// zstd-compressed batches.
#[derive(Clone)]
pub struct BrokerProducer {
    producer: FutureProducer,
}

impl BrokerProducer {
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("retries", "5")
            .set("retry.backoff.ms", "500")
            .set("compression.type", "zstd")
            .set("batch.size", "65536")
            .set("linger.ms", "5")
            .set("queue.buffering.max.kbytes", "32768")
            .create()
            .map_err(|e| Error::broker_with_source("failed to create kafka producer", e))?;

        Ok(Self { producer })
    }

    /// Publish `payload` to `topic` keyed by `key`, the Queue's assigned
    /// `driver_trace_id`. A single attempt; the enqueue pipeline is
    /// responsible for retrying on failure.
    pub async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::After(Duration::from_secs(10)))
            .await
            .map_err(|(e, _)| Error::broker_with_source("kafka publish failed", e))?;

        Ok(())
    }
}
