//! Persistence for the Message / Queue / Target / Event tables.
//!
//! Operations that must be atomic span more than one table (a Message's
//! full fan-out, a Queue's status transition alongside its Targets), so
//! this is one repository facade over the pool rather than one struct per
//! table, the way `rustpress-database`'s per-entity repositories assume
//! single-table operations.

use chrono::{DateTime, Utc};
use notify_core::error::{Error, Result};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Channel, Driver, MessageRow, MessageStatus, QueueRow, QueueStatus, TargetRow, TargetStatus};

#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
}

/// The `created_at` range an id-keyed lookup or write constrains itself
/// to, bracketing the id's own embedded timestamp (see
/// `notify_core::id::created_at_window`). `(None, None)` means
/// unconstrained.
pub type CreatedAtWindow = (Option<DateTime<Utc>>, Option<DateTime<Utc>>);

/// Everything the Publisher needs to materialize one chunk of recipients.
pub struct NewQueue {
    pub queue_id: Uuid,
    pub targets: Vec<NewTarget>,
}

pub struct NewTarget {
    pub target_id: Uuid,
    pub encrypted_receiver: String,
    pub receiver_hash: String,
    pub provider: String,
}

/// Per-recipient outcome fed back into a reconciliation transaction.
pub struct TargetOutcome {
    pub target_id: Uuid,
    pub status: TargetStatus,
    pub provider_trace_id: Option<String>,
}

/// One Event row to append as part of a reconciliation transaction.
pub struct NewEvent {
    pub provider: String,
    pub status: String,
    pub provider_trace_id: Option<String>,
    pub data: serde_json::Value,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -- Publisher (4.1) -----------------------------------------------

    /// Persist a Message with all its Queues and Targets in one
    /// transaction. `initial_status` is `Scheduled` when `scheduled_at` is
    /// set, `Pending` otherwise.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_message(
        &self,
        message_id: Uuid,
        channel: Channel,
        body: &str,
        sender_name: Option<&str>,
        sender_address: Option<&str>,
        subject: Option<&str>,
        scheduled_at: Option<DateTime<Utc>>,
        initial_status: MessageStatus,
        queues: Vec<NewQueue>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin create_message", e))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, channel, body, sender_name, sender_address, subject, status, scheduled_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            "#,
        )
        .bind(message_id)
        .bind(channel)
        .bind(body)
        .bind(sender_name)
        .bind(sender_address)
        .bind(subject)
        .bind(initial_status)
        .bind(scheduled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("insert message", e))?;

        for queue in &queues {
            sqlx::query(
                r#"
                INSERT INTO queues (id, message_id, driver, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW(), NOW())
                "#,
            )
            .bind(queue.queue_id)
            .bind(message_id)
            .bind(Driver::Kafka)
            .bind(QueueStatus::Pending)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("insert queue", e))?;

            for target in &queue.targets {
                sqlx::query(
                    r#"
                    INSERT INTO targets (id, message_id, queue_id, encrypted_receiver, receiver_hash, provider, status, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
                    "#,
                )
                .bind(target.target_id)
                .bind(message_id)
                .bind(queue.queue_id)
                .bind(&target.encrypted_receiver)
                .bind(&target.receiver_hash)
                .bind(&target.provider)
                .bind(TargetStatus::Pending)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database_with_source("insert target", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit create_message", e))?;
        Ok(())
    }

    // -- Enqueue pipeline (4.2) ------------------------------------------

    /// Move a Message and the given Queues (plus their Targets) into
    /// `PROCESS`, the first half of the enqueue transition. `window`
    /// brackets the Message id's embedded timestamp (its Queues were
    /// created in the same transaction, so the same window covers them).
    pub async fn mark_process(&self, message_id: Uuid, queue_ids: &[Uuid], window: CreatedAtWindow) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin mark_process", e))?;

        set_message_status(&mut tx, message_id, MessageStatus::Process, window).await?;
        set_queue_status(&mut tx, queue_ids, QueueStatus::Process, window).await?;
        set_target_status_for_queues(&mut tx, queue_ids, TargetStatus::Process).await?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit mark_process", e))?;
        Ok(())
    }

    /// Second half: promote successfully published Queues (and their
    /// Targets) to `ENQUEUED`, stamping each Target's `driver_trace_id`,
    /// and the owning Message to `ENQUEUED`. `window` brackets the
    /// Message id's embedded timestamp, same as `mark_process`.
    pub async fn mark_enqueued(
        &self,
        message_id: Uuid,
        succeeded: &[(Uuid, String)],
        window: CreatedAtWindow,
    ) -> Result<()> {
        if succeeded.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin mark_enqueued", e))?;

        let queue_ids: Vec<Uuid> = succeeded.iter().map(|(id, _)| *id).collect();
        set_queue_status(&mut tx, &queue_ids, QueueStatus::Enqueued, window).await?;

        for (queue_id, trace_id) in succeeded {
            sqlx::query(
                r#"
                UPDATE targets
                SET status = $2, driver_trace_id = $3, updated_at = NOW()
                WHERE queue_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(queue_id)
            .bind(TargetStatus::Enqueued)
            .bind(trace_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("enqueue targets", e))?;
        }

        let (lo, hi) = window;
        sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(message_id)
        .bind(MessageStatus::Enqueued)
        .bind(lo)
        .bind(hi)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("enqueue message", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit mark_enqueued", e))?;
        Ok(())
    }

    /// Queues of a Message still in `PENDING`, used to build the initial
    /// enqueue fan-out right after `create_message`.
    pub async fn queues_for_message(&self, message_id: Uuid) -> Result<Vec<QueueRow>> {
        sqlx::query_as::<_, QueueRow>(
            "SELECT * FROM queues WHERE message_id = $1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("queues_for_message", e))
    }

    pub async fn target_ids_for_queue(&self, queue_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM targets WHERE queue_id = $1 AND deleted_at IS NULL",
        )
        .bind(queue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("target_ids_for_queue", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // -- Dispatcher (4.3) -------------------------------------------------

    /// Messages due for dispatch: `SCHEDULED`, `scheduled_at <= now`, and
    /// `created_at >= lower_bound` (the horizon guard).
    pub async fn due_scheduled_messages(&self, lower_bound: DateTime<Utc>) -> Result<Vec<MessageRow>> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM messages
            WHERE status = $1
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= NOW()
              AND created_at >= $2
              AND deleted_at IS NULL
            ORDER BY scheduled_at
            "#,
        )
        .bind(MessageStatus::Scheduled)
        .bind(lower_bound)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("due_scheduled_messages", e))
    }

    // -- Worker (4.4) ------------------------------------------------------

    /// Load a Queue by id, bounded by the `created_at` window recovered
    /// from its own time-sortable id.
    pub async fn load_queue(
        &self,
        queue_id: Uuid,
        window: CreatedAtWindow,
    ) -> Result<Option<QueueRow>> {
        let (lo, hi) = window;
        sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT * FROM queues
            WHERE id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND deleted_at IS NULL
            "#,
        )
        .bind(queue_id)
        .bind(lo)
        .bind(hi)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("load_queue", e))
    }

    /// Load a Message by id, bounded by the `created_at` window recovered
    /// from its own time-sortable id.
    pub async fn load_message(&self, message_id: Uuid, window: CreatedAtWindow) -> Result<Option<MessageRow>> {
        let (lo, hi) = window;
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM messages
            WHERE id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND deleted_at IS NULL
            "#,
        )
        .bind(message_id)
        .bind(lo)
        .bind(hi)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("load_message", e))
    }

    pub async fn load_targets_for_queue(&self, queue_id: Uuid) -> Result<Vec<TargetRow>> {
        sqlx::query_as::<_, TargetRow>(
            "SELECT * FROM targets WHERE queue_id = $1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(queue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("load_targets_for_queue", e))
    }

    /// Transition a Queue and its Targets to `SENDING`, the step right
    /// before the provider is invoked. `window` brackets the Queue id's
    /// embedded timestamp, the same window the caller used to `load_queue`.
    pub async fn mark_sending(&self, queue_id: Uuid, window: CreatedAtWindow) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin mark_sending", e))?;

        let (lo, hi) = window;
        sqlx::query(
            r#"
            UPDATE queues
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(queue_id)
        .bind(QueueStatus::Sending)
        .bind(lo)
        .bind(hi)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("mark_sending queue", e))?;

        sqlx::query("UPDATE targets SET status = $2, updated_at = NOW() WHERE queue_id = $1 AND deleted_at IS NULL")
            .bind(queue_id)
            .bind(TargetStatus::Sending)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("mark_sending targets", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit mark_sending", e))?;
        Ok(())
    }

    /// Reconcile a successful batch send: Queue -> SUCCESS, Message ->
    /// SENT, per-recipient Target updates, and one appended Event per
    /// outcome. `window` brackets the Queue id's embedded timestamp (the
    /// Message and its Targets were created in the same transaction, so
    /// the same window bounds all three id-keyed writes below).
    pub async fn reconcile_success(
        &self,
        queue_id: Uuid,
        message_id: Uuid,
        outcomes: &[TargetOutcome],
        events: &[NewEvent],
        window: CreatedAtWindow,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin reconcile_success", e))?;

        let (lo, hi) = window;

        sqlx::query(
            r#"
            UPDATE queues
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(queue_id)
        .bind(QueueStatus::Success)
        .bind(lo)
        .bind(hi)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("reconcile_success queue", e))?;

        sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(message_id)
        .bind(MessageStatus::Sent)
        .bind(lo)
        .bind(hi)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("reconcile_success message", e))?;

        for outcome in outcomes {
            sqlx::query(
                r#"
                UPDATE targets
                SET status = $2, provider_trace_id = $3, updated_at = NOW()
                WHERE id = $1
                  AND ($4::timestamptz IS NULL OR created_at >= $4)
                  AND ($5::timestamptz IS NULL OR created_at <= $5)
                "#,
            )
            .bind(outcome.target_id)
            .bind(outcome.status)
            .bind(&outcome.provider_trace_id)
            .bind(lo)
            .bind(hi)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("reconcile_success target", e))?;
        }

        append_events(&mut tx, queue_id, events).await?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit reconcile_success", e))?;
        Ok(())
    }

    /// Reconcile a failed batch: Queue -> FAILED, Message -> FAILED, all
    /// Targets -> FAILED, and the failure Events. `window` brackets the
    /// Queue id's embedded timestamp, the same window the caller used to
    /// `load_queue`.
    pub async fn reconcile_failure(
        &self,
        queue_id: Uuid,
        message_id: Uuid,
        events: &[NewEvent],
        window: CreatedAtWindow,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin reconcile_failure", e))?;

        let (lo, hi) = window;

        sqlx::query(
            r#"
            UPDATE queues
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(queue_id)
        .bind(QueueStatus::Failed)
        .bind(lo)
        .bind(hi)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("reconcile_failure queue", e))?;

        sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(message_id)
        .bind(MessageStatus::Failed)
        .bind(lo)
        .bind(hi)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("reconcile_failure message", e))?;

        sqlx::query("UPDATE targets SET status = $2, updated_at = NOW() WHERE queue_id = $1 AND deleted_at IS NULL")
            .bind(queue_id)
            .bind(TargetStatus::Failed)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("reconcile_failure targets", e))?;

        append_events(&mut tx, queue_id, events).await?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit reconcile_failure", e))?;
        Ok(())
    }

    // -- Cancellation (4.5) ------------------------------------------------

    /// Find a Message by id within the time window recovered from the id
    /// itself (±1h).
    pub async fn find_message_in_window(
        &self,
        message_id: Uuid,
        window: CreatedAtWindow,
    ) -> Result<Option<MessageRow>> {
        let (lo, hi) = window;
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM messages
            WHERE id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND deleted_at IS NULL
            "#,
        )
        .bind(message_id)
        .bind(lo)
        .bind(hi)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("find_message_in_window", e))
    }

    /// Cancel a Message and all of its Queues/Targets within the same
    /// window, soft-deleting each. Only rows whose status still admits a
    /// transition to `CANCELED` are touched.
    pub async fn cancel_message(
        &self,
        message_id: Uuid,
        window: CreatedAtWindow,
    ) -> Result<()> {
        let (lo, hi) = window;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("begin cancel_message", e))?;

        sqlx::query(
            r#"
            UPDATE messages
            SET status = $4, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1
              AND status IN ('pending', 'scheduled')
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(message_id)
        .bind(lo)
        .bind(hi)
        .bind(MessageStatus::Canceled)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("cancel message", e))?;

        sqlx::query(
            r#"
            UPDATE queues
            SET status = $2, deleted_at = NOW(), updated_at = NOW()
            WHERE message_id = $1 AND status IN ('pending', 'process')
            "#,
        )
        .bind(message_id)
        .bind(QueueStatus::Canceled)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("cancel queues", e))?;

        sqlx::query(
            r#"
            UPDATE targets
            SET status = $2, deleted_at = NOW(), updated_at = NOW()
            WHERE message_id = $1 AND status IN ('pending', 'process')
            "#,
        )
        .bind(message_id)
        .bind(TargetStatus::Canceled)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::database_with_source("cancel targets", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("commit cancel_message", e))?;
        Ok(())
    }

    // -- Listing (4.6) -------------------------------------------------------

    pub async fn list_targets(&self, params: &ListTargetsParams) -> Result<(Vec<TargetWithMessage>, i64)> {
        let sort_column = params.sort_field.allowed_column();
        let direction = if params.sort_descending { "DESC" } else { "ASC" };
        let offset = (params.page_index.max(1) - 1) * params.page_size;

        let query = format!(
            r#"
            SELECT t.*, m.channel AS message_channel, m.body AS message_body
            FROM targets t
            JOIN messages m ON m.id = t.message_id
            WHERE m.channel = $1
              AND t.created_at BETWEEN $2 AND $3
              AND m.created_at BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR t.message_id = $4)
              AND ($5::text IS NULL OR t.receiver_hash = $5)
            ORDER BY t.{sort_column} {direction}
            LIMIT $6 OFFSET $7
            "#
        );

        let rows = sqlx::query_as::<_, TargetWithMessage>(&query)
            .bind(params.channel)
            .bind(params.start_at)
            .bind(params.end_at)
            .bind(params.message_id)
            .bind(&params.receiver_hash)
            .bind(params.page_size as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("list_targets", e))?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM targets t
            JOIN messages m ON m.id = t.message_id
            WHERE m.channel = $1
              AND t.created_at BETWEEN $2 AND $3
              AND m.created_at BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR t.message_id = $4)
              AND ($5::text IS NULL OR t.receiver_hash = $5)
            "#,
        )
        .bind(params.channel)
        .bind(params.start_at)
        .bind(params.end_at)
        .bind(params.message_id)
        .bind(&params.receiver_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("list_targets count", e))?;

        Ok((rows, total))
    }
}

/// A target row joined with the channel/body of its parent message, for
/// the listing RPC (§4.6) which reports `message_type`/`message_content`
/// alongside each target's own fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TargetWithMessage {
    pub id: Uuid,
    pub message_id: Uuid,
    pub queue_id: Uuid,
    pub encrypted_receiver: String,
    pub receiver_hash: String,
    pub provider: String,
    pub driver_trace_id: Option<String>,
    pub provider_trace_id: Option<String>,
    pub status: TargetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub message_channel: Channel,
    pub message_body: String,
}

/// Columns the list RPC is allowed to sort by. An allow-list keeps the
/// caller-supplied sort field out of the SQL string directly.
#[derive(Debug, Clone, Copy)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Status,
}

impl SortField {
    fn allowed_column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Status => "status",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "status" => Ok(SortField::Status),
            other => Err(Error::value("sort_field", format!("unsupported sort field {other}"))),
        }
    }
}

pub struct ListTargetsParams {
    pub channel: Channel,
    pub message_id: Option<Uuid>,
    pub receiver_hash: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub page_index: u32,
    pub page_size: u32,
    pub sort_field: SortField,
    pub sort_descending: bool,
}

async fn set_message_status(
    tx: &mut Transaction<'_, Postgres>,
    message_id: Uuid,
    status: MessageStatus,
    window: CreatedAtWindow,
) -> Result<()> {
    let (lo, hi) = window;
    sqlx::query(
        r#"
        UPDATE messages
        SET status = $2, updated_at = NOW()
        WHERE id = $1
          AND ($3::timestamptz IS NULL OR created_at >= $3)
          AND ($4::timestamptz IS NULL OR created_at <= $4)
        "#,
    )
    .bind(message_id)
    .bind(status)
    .bind(lo)
    .bind(hi)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::database_with_source("set_message_status", e))?;
    Ok(())
}

async fn set_queue_status(
    tx: &mut Transaction<'_, Postgres>,
    queue_ids: &[Uuid],
    status: QueueStatus,
    window: CreatedAtWindow,
) -> Result<()> {
    let (lo, hi) = window;
    sqlx::query(
        r#"
        UPDATE queues
        SET status = $2, updated_at = NOW()
        WHERE id = ANY($1)
          AND ($3::timestamptz IS NULL OR created_at >= $3)
          AND ($4::timestamptz IS NULL OR created_at <= $4)
        "#,
    )
    .bind(queue_ids)
    .bind(status)
    .bind(lo)
    .bind(hi)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::database_with_source("set_queue_status", e))?;
    Ok(())
}

async fn set_target_status_for_queues(
    tx: &mut Transaction<'_, Postgres>,
    queue_ids: &[Uuid],
    status: TargetStatus,
) -> Result<()> {
    sqlx::query("UPDATE targets SET status = $2, updated_at = NOW() WHERE queue_id = ANY($1) AND deleted_at IS NULL")
        .bind(queue_ids)
        .bind(status)
        .execute(&mut **tx)
        .await
        .map_err(|e| Error::database_with_source("set_target_status_for_queues", e))?;
    Ok(())
}

async fn append_events(
    tx: &mut Transaction<'_, Postgres>,
    queue_id: Uuid,
    events: &[NewEvent],
) -> Result<()> {
    for event in events {
        sqlx::query(
            r#"
            INSERT INTO events (id, queue_id, provider, status, provider_trace_id, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            "#,
        )
        .bind(notify_core::id::new_id())
        .bind(queue_id)
        .bind(&event.provider)
        .bind(&event.status)
        .bind(&event.provider_trace_id)
        .bind(&event.data)
        .execute(&mut **tx)
        .await
        .map_err(|e| Error::database_with_source("append_event", e))?;
    }
    Ok(())
}
