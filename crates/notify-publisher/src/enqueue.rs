//! Enqueue pipeline (§4.2): promotes a Message's Queues from `PENDING` to
//! `ENQUEUED` by publishing each to the broker, with bounded concurrency
//! and linear-backoff retry.
//!
//! The 10-in-flight cap and "abort retries on cancellation" requirement
//! are implemented the idiomatic Rust way rather than literally mirroring
//! a `context.Context`: a `tokio::sync::Semaphore` bounds concurrency, and
//! cancellation is structural — callers hand in a future built from
//! `futures::future::join_all` over *un-spawned* async blocks (never
//! `tokio::spawn`, which would detach the tasks and defeat drop-based
//! cancellation). Dropping the enqueue future mid-flight stops every
//! in-flight publish at its next await point.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify_broker::BrokerProducer;
use notify_core::error::{Error, Result};
use notify_core::id;
use notify_database::{Channel, QueueReference, QueueRow, Repository};
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

pub struct EnqueueLimits {
    pub concurrency: usize,
    pub max_attempts: u32,
}

/// Slack bracketing the Message id's embedded timestamp when writing to
/// it here: wide enough to cover a Message scheduled up to the
/// dispatcher's `schedule_limit_days` horizon ahead of its own creation.
const ENQUEUE_SLACK: chrono::Duration = chrono::Duration::days(32);

/// Run the enqueue pipeline (§4.2 steps 1-4) for every Queue of one
/// Message. Queues must all belong to `message_id` and share `channel`.
pub async fn enqueue_message(
    repository: &Repository,
    producer: &BrokerProducer,
    message_id: Uuid,
    channel: Channel,
    queues: Vec<QueueRow>,
    limits: &EnqueueLimits,
) -> Result<()> {
    if queues.is_empty() {
        return Ok(());
    }

    let queue_ids: Vec<Uuid> = queues.iter().map(|q| q.id).collect();
    let window = id::created_at_window(message_id, ENQUEUE_SLACK);
    repository.mark_process(message_id, &queue_ids, window).await?;

    let topic = match channel {
        Channel::Sms => "notify-sms",
        Channel::Mail => "notify-mail",
    };

    let semaphore = Arc::new(Semaphore::new(limits.concurrency));
    let mut publishes = Vec::with_capacity(queues.len());
    for queue in queues {
        let repository = repository.clone();
        let producer = producer.clone();
        let semaphore = Arc::clone(&semaphore);
        let max_attempts = limits.max_attempts;
        publishes.push(async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            publish_one_queue(&repository, &producer, topic, message_id, queue.id, max_attempts).await
        });
    }

    let results = futures::future::join_all(publishes).await;

    let mut succeeded = Vec::new();
    let mut failed_count = 0usize;
    for result in results {
        match result {
            Ok((queue_id, driver_trace_id)) => succeeded.push((queue_id, driver_trace_id)),
            Err(queue_id) => {
                failed_count += 1;
                warn!(%message_id, %queue_id, "queue left in PROCESS after exhausting publish retries");
            }
        }
    }

    if failed_count > 0 {
        warn!(
            %message_id,
            failed_count,
            "enqueue fan-out completed with Queues left in PROCESS; recoverable by operational replay"
        );
    }

    repository.mark_enqueued(message_id, &succeeded, window).await
}

/// Publish one Queue with linear backoff (1s, 2s, 3s, ...) up to
/// `max_attempts`. Returns the assigned `driver_trace_id` on success, or
/// the Queue id (for logging) if every attempt failed.
async fn publish_one_queue(
    repository: &Repository,
    producer: &BrokerProducer,
    topic: &str,
    message_id: Uuid,
    queue_id: Uuid,
    max_attempts: u32,
) -> std::result::Result<(Uuid, String), Uuid> {
    let target_ids = repository.target_ids_for_queue(queue_id).await.map_err(|e| {
        warn!(%queue_id, error = %e, "failed to load target ids for publish");
        queue_id
    })?;

    let driver_trace_id = id::new_id();
    let reference = QueueReference {
        queue_id,
        message_id,
        target_ids,
    };
    let payload = match serde_json::to_vec(&reference) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(%queue_id, error = %e, "failed to serialize queue reference");
            return Err(queue_id);
        }
    };
    let key = driver_trace_id.to_string();

    for attempt in 0..max_attempts {
        match producer.publish(topic, &key, &payload).await {
            Ok(()) => return Ok((queue_id, key)),
            Err(e) => {
                warn!(%queue_id, attempt, error = %e, "queue publish attempt failed");
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(Duration::from_secs((attempt + 1) as u64)).await;
                }
            }
        }
    }
    Err(queue_id)
}

/// The lower bound on a scan for a Message created no earlier than
/// `horizon_days` ago, mirroring the dispatcher's §4.3 step 1.
pub fn horizon_lower_bound(horizon_days: i64) -> chrono::DateTime<Utc> {
    id::lower_bound(chrono::Duration::days(horizon_days))
}

/// Surface a consistent error when an already-terminal Message is fed back
/// into the enqueue pipeline (defensive; the pipeline's callers already
/// filter by status).
pub fn reject_if_not_pending_or_scheduled(status: notify_database::MessageStatus) -> Result<()> {
    use notify_database::MessageStatus::*;
    match status {
        Pending | Scheduled => Ok(()),
        _ => Err(Error::internal("message is not eligible for enqueue")),
    }
}
