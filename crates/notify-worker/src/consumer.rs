//! Topic-bound `QueueHandler` implementations and the Worker runtime that
//! spins up `kafka_consumer_group_instance_num` consumer-group members
//! per topic.
//!
//! Grounded on `examples/original_source/internal/consumer/consumer.go`
//! for the handler-registry-by-topic shape, and on
//! `rustpress-jobs/src/handlers.rs`'s `JobHandler` trait for the
//! async-handler-per-payload-type convention this crate's `QueueHandler`
//! impls mirror.

use std::sync::Arc;

use async_trait::async_trait;
use notify_broker::{BrokerConsumer, QueueHandler};
use notify_core::cipher::AesGcmCipher;
use notify_core::config::AppConfig;
use notify_core::error::Result;
use notify_database::{QueueReference, Repository};
use notify_providers::{MailProvider, SmsProvider};
use tokio::sync::watch;
use tracing::info;

use crate::reconcile::{process_mail_queue, process_sms_queue};

pub struct SmsQueueHandler {
    repository: Repository,
    cipher: Arc<AesGcmCipher>,
    provider: Arc<dyn SmsProvider>,
}

impl SmsQueueHandler {
    pub fn new(repository: Repository, cipher: Arc<AesGcmCipher>, provider: Arc<dyn SmsProvider>) -> Self {
        Self { repository, cipher, provider }
    }
}

#[async_trait]
impl QueueHandler for SmsQueueHandler {
    async fn handle(&self, reference: QueueReference) -> Result<()> {
        process_sms_queue(&self.repository, &self.cipher, self.provider.as_ref(), reference).await
    }
}

pub struct MailQueueHandler {
    repository: Repository,
    cipher: Arc<AesGcmCipher>,
    provider: Arc<dyn MailProvider>,
}

impl MailQueueHandler {
    pub fn new(repository: Repository, cipher: Arc<AesGcmCipher>, provider: Arc<dyn MailProvider>) -> Self {
        Self { repository, cipher, provider }
    }
}

#[async_trait]
impl QueueHandler for MailQueueHandler {
    async fn handle(&self, reference: QueueReference) -> Result<()> {
        process_mail_queue(&self.repository, &self.cipher, self.provider.as_ref(), reference).await
    }
}

/// Owns the consumer-group members for both topics and the shutdown
/// signal they share. `run` does not return until every member has
/// stopped.
pub struct Worker {
    config: Arc<AppConfig>,
    sms_handler: Arc<SmsQueueHandler>,
    mail_handler: Arc<MailQueueHandler>,
}

impl Worker {
    pub fn new(config: Arc<AppConfig>, sms_handler: SmsQueueHandler, mail_handler: MailQueueHandler) -> Self {
        Self { config, sms_handler: Arc::new(sms_handler), mail_handler: Arc::new(mail_handler) }
    }

    /// Start `kafka_consumer_group_instance_num` members per topic and run
    /// until `shutdown` signals true.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let instances = self.config.broker.consumer_group_instance_num.max(1);
        let mut handles = Vec::with_capacity(instances * 2);

        for i in 0..instances {
            let consumer = BrokerConsumer::new(&self.config.broker.brokers, &self.config.broker.consumer_group, &self.config.broker.sms_topic)?;
            let handler = Arc::clone(&self.sms_handler) as Arc<dyn QueueHandler>;
            let shutdown = shutdown.clone();
            info!(member = i, topic = %self.config.broker.sms_topic, "starting worker consumer member");
            handles.push(tokio::spawn(consumer.run(handler, shutdown)));
        }

        for i in 0..instances {
            let consumer = BrokerConsumer::new(&self.config.broker.brokers, &self.config.broker.consumer_group, &self.config.broker.mail_topic)?;
            let handler = Arc::clone(&self.mail_handler) as Arc<dyn QueueHandler>;
            let shutdown = shutdown.clone();
            info!(member = i, topic = %self.config.broker.mail_topic, "starting worker consumer member");
            handles.push(tokio::spawn(consumer.run(handler, shutdown)));
        }

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}
