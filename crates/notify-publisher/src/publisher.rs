//! Publisher (§4.1): validates a send request, materializes a Message
//! with its Queues and Targets in one transaction, and enqueues
//! immediately unless the Message is scheduled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use notify_broker::BrokerProducer;
use notify_core::cipher::{receiver_hash, AesGcmCipher};
use notify_core::config::AppConfig;
use notify_core::error::Result;
use notify_core::id;
use notify_database::{Channel, MessageStatus, NewQueue, NewTarget, Repository};
use uuid::Uuid;

use crate::enqueue::{enqueue_message, EnqueueLimits};
use crate::validation::{check_scheduled_at, validate_request, SendMailRequest, SendSmsRequest};

/// The lifecycle services a Publisher call needs: persistence, the
/// broker, the shared cipher, and the limits/provider config.
#[derive(Clone)]
pub struct Publisher {
    repository: Repository,
    producer: BrokerProducer,
    cipher: Arc<AesGcmCipher>,
    config: Arc<AppConfig>,
}

impl Publisher {
    pub fn new(repository: Repository, producer: BrokerProducer, cipher: Arc<AesGcmCipher>, config: Arc<AppConfig>) -> Self {
        Self { repository, producer, cipher, config }
    }

    fn limits(&self) -> EnqueueLimits {
        EnqueueLimits {
            concurrency: self.config.limits.enqueue_concurrency,
            max_attempts: self.config.limits.publish_max_attempts,
        }
    }

    /// Publish an SMS send request, returning the new Message id.
    pub async fn send_sms(&self, request: SendSmsRequest) -> Result<Uuid> {
        validate_request(&request)?;
        check_scheduled_at(request.scheduled_at, self.config.limits.schedule_limit_days)?;

        self.publish(
            Channel::Sms,
            &request.body,
            None,
            None,
            None,
            request.scheduled_at,
            &request.receivers,
            self.config.limits.sms_batch_limit,
            "mitake",
        )
        .await
    }

    /// Publish a mail send request, returning the new Message id.
    pub async fn send_mail(&self, request: SendMailRequest) -> Result<Uuid> {
        validate_request(&request)?;
        check_scheduled_at(request.scheduled_at, self.config.limits.schedule_limit_days)?;

        self.publish(
            Channel::Mail,
            &request.body,
            Some(&request.sender_name),
            Some(&request.sender_address),
            Some(&request.subject),
            request.scheduled_at,
            &request.receivers,
            self.config.limits.mail_batch_limit,
            "sendgrid",
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish(
        &self,
        channel: Channel,
        body: &str,
        sender_name: Option<&str>,
        sender_address: Option<&str>,
        subject: Option<&str>,
        scheduled_at: Option<DateTime<Utc>>,
        receivers: &[String],
        batch_limit: usize,
        provider: &str,
    ) -> Result<Uuid> {
        let message_id = id::new_id();
        let initial_status = if scheduled_at.is_some() { MessageStatus::Scheduled } else { MessageStatus::Pending };

        let mut queues = Vec::new();
        for chunk in receivers.chunks(batch_limit.max(1)) {
            let mut targets = Vec::with_capacity(chunk.len());
            for receiver in chunk {
                let encrypted_receiver = self.cipher.encrypt(receiver)?;
                targets.push(NewTarget {
                    target_id: id::new_id(),
                    encrypted_receiver,
                    receiver_hash: receiver_hash(receiver),
                    provider: provider.to_string(),
                });
            }
            queues.push(NewQueue { queue_id: id::new_id(), targets });
        }

        self.repository
            .create_message(message_id, channel, body, sender_name, sender_address, subject, scheduled_at, initial_status, queues)
            .await?;

        if scheduled_at.is_none() {
            let queue_rows = self.repository.queues_for_message(message_id).await?;
            enqueue_message(&self.repository, &self.producer, message_id, channel, queue_rows, &self.limits()).await?;
        }

        Ok(message_id)
    }
}
