//! The scheduled-dispatch job (§4.3): promotes due `SCHEDULED` Messages
//! into the enqueue pipeline.
//!
//! Grounded on
//! `examples/original_source/internal/jobs/dispatch_scheduled_messages.go`
//! for the scan predicate, and on `rustpress-jobs/src/scheduler.rs`'s
//! job-registry-by-name idiom for `run_named_job` below, even though this
//! binary runs a single job per invocation rather than hosting a full
//! in-process `Scheduler`.

use async_trait::async_trait;
use notify_broker::BrokerProducer;
use notify_core::config::AppConfig;
use notify_core::error::{Error, Result};
use notify_database::Repository;
use notify_publisher::enqueue::{enqueue_message, horizon_lower_bound, EnqueueLimits};
use tracing::{error, info, warn};

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

/// §4.3 steps 1-4. A failure enqueueing one Message is logged and does
/// not abort the scan; the job itself only fails on a scan/setup error.
pub struct DispatchScheduledMessagesJob {
    repository: Repository,
    producer: BrokerProducer,
    limits: EnqueueLimits,
    horizon_days: i64,
}

impl DispatchScheduledMessagesJob {
    pub fn new(repository: Repository, producer: BrokerProducer, config: &AppConfig) -> Self {
        Self {
            repository,
            producer,
            limits: EnqueueLimits { concurrency: config.limits.enqueue_concurrency, max_attempts: config.limits.publish_max_attempts },
            horizon_days: config.limits.schedule_limit_days,
        }
    }
}

#[async_trait]
impl Job for DispatchScheduledMessagesJob {
    fn name(&self) -> &'static str {
        "dispatch_scheduled_messages"
    }

    async fn run(&self) -> Result<()> {
        let lower_bound = horizon_lower_bound(self.horizon_days);
        let due = self.repository.due_scheduled_messages(lower_bound).await?;
        info!(count = due.len(), "scanned due scheduled messages");

        let mut enqueued = 0usize;
        let mut failed = 0usize;
        for message in due {
            let queues = match self.repository.queues_for_message(message.id).await {
                Ok(queues) => queues,
                Err(e) => {
                    error!(message_id = %message.id, error = %e, "failed to load queues for due message, skipping");
                    failed += 1;
                    continue;
                }
            };

            match enqueue_message(&self.repository, &self.producer, message.id, message.channel, queues, &self.limits).await {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    error!(message_id = %message.id, error = %e, "enqueue failed for due message, continuing with next");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            warn!(enqueued, failed, "dispatch scan completed with per-message failures");
        } else {
            info!(enqueued, "dispatch scan completed");
        }
        Ok(())
    }
}

/// Resolve and run the job named by `config.job_name`. Mirrors the intent
/// of `Scheduler::schedule`'s name-keyed registry, scaled down to the
/// single job this binary currently ships.
pub async fn run_named_job(job_name: &str, job: &dyn Job) -> Result<()> {
    if job_name != job.name() {
        return Err(Error::Configuration { message: format!("unknown job_name '{job_name}', only '{}' is registered", job.name()) });
    }
    job.run().await
}
