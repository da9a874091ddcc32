//! Kafka consumer-group member that drives the Worker's broker-side loop.

use std::sync::Arc;

use async_trait::async_trait;
use notify_core::error::{Error, Result};
use notify_database::QueueReference;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Headers;
use rdkafka::Message;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn, Instrument};

/// Implemented by the Worker for each Queue reference pulled off the
/// broker. Mirrors the job-handler shape used for scheduled jobs
/// elsewhere in this workspace: one `handle` entry point per payload type.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn handle(&self, reference: QueueReference) -> Result<()>;
}

/// One consumer-group member subscribed to a single topic.
pub struct BrokerConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl BrokerConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("max.poll.interval.ms", "300000")
            .set("fetch.min.bytes", "1")
            .set("fetch.max.wait.ms", "500")
            .create()
            .map_err(|e| Error::broker_with_source("failed to create kafka consumer", e))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| Error::broker_with_source(format!("failed to subscribe to {topic}"), e))?;

        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }

    /// Consume until `shutdown` fires. Each record is parsed as a
    /// `QueueReference`, handed to `handler`, and the offset is committed
    /// only after `handler` returns `Ok`. A malformed payload is logged and
    /// acknowledged without reprocessing; a handler error leaves the offset
    /// uncommitted, so the broker redelivers the record.
    pub async fn run(self, handler: Arc<dyn QueueHandler>, mut shutdown: watch::Receiver<bool>) {
        let mut stream = self.consumer.stream();
        info!(topic = %self.topic, "worker consumer started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(topic = %self.topic, "worker consumer shutting down");
                        break;
                    }
                }
                maybe_message = stream.next() => {
                    let Some(message) = maybe_message else { break };
                    match message {
                        Ok(borrowed) => {
                            let payload = borrowed.payload().map(|p| p.to_vec());
                            let traceparent = extract_traceparent(&borrowed);
                            match payload
                                .as_deref()
                                .map(serde_json::from_slice::<QueueReference>)
                            {
                                Some(Ok(reference)) => {
                                    let span = tracing::info_span!("process_queue", queue_id = %reference.queue_id, traceparent = %traceparent);
                                    match handler.handle(reference).instrument(span).await {
                                        Ok(()) => {
                                            if let Err(e) = self.consumer.commit_message(&borrowed, CommitMode::Async) {
                                                warn!(error = %e, "failed to commit offset after successful handling");
                                            }
                                        }
                                        Err(e) => {
                                            error!(error = %e, "queue handler failed, offset left uncommitted for redelivery");
                                        }
                                    }
                                }
                                Some(Err(e)) => {
                                    warn!(error = %e, "malformed queue reference payload, acknowledging without reprocessing");
                                    if let Err(e) = self.consumer.commit_message(&borrowed, CommitMode::Async) {
                                        warn!(error = %e, "failed to commit offset for malformed payload");
                                    }
                                }
                                None => {
                                    debug!("received record with no payload");
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "kafka stream error");
                        }
                    }
                }
            }
        }
    }
}

/// Pull a W3C `traceparent` header off a broker record, if the producer
/// attached one, so the processing span can be correlated with the
/// request that originally enqueued this Queue.
fn extract_traceparent(message: &rdkafka::message::BorrowedMessage<'_>) -> String {
    let Some(headers) = message.headers() else {
        return String::new();
    };
    for header in headers.iter() {
        if header.key == "traceparent" {
            return header.value.map(|v| String::from_utf8_lossy(v).into_owned()).unwrap_or_default();
        }
    }
    String::new()
}
