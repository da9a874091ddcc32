//! Row types and status enums for the message lifecycle tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification channel. Drives batch limits, provider selection, and
/// broker topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Mail,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Mail => "mail",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = notify_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Channel::Sms),
            "mail" => Ok(Channel::Mail),
            other => Err(notify_core::Error::value("channel", format!("unknown channel {other}"))),
        }
    }
}

/// Message.status DAG: Pending -> (Scheduled | Process) -> Enqueued ->
/// Sent | Failed; Pending/Scheduled -> Canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Scheduled,
    Process,
    Enqueued,
    Sent,
    Failed,
    Canceled,
}

/// Queue.status DAG: Pending -> Process -> Enqueued -> Sending ->
/// Success | Failed; Pending/Process -> Canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Process,
    Enqueued,
    Sending,
    Success,
    Failed,
    Canceled,
}

/// Target.status DAG: Pending -> Process -> Enqueued -> Sending ->
/// Sent | Failed; Pending/Process -> Canceled. Never ahead of its Queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Process,
    Enqueued,
    Sending,
    Sent,
    Failed,
    Canceled,
}

/// Broker driver a Queue is routed through. Only `kafka` is implemented,
/// but the column exists so a second driver doesn't need a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Kafka,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: Uuid,
    pub channel: Channel,
    pub body: String,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    pub subject: Option<String>,
    pub status: MessageStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct QueueRow {
    pub id: Uuid,
    pub message_id: Uuid,
    pub driver: Driver,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TargetRow {
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
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct EventRow {
    pub id: Uuid,
    pub queue_id: Uuid,
    pub provider: String,
    pub status: String,
    pub provider_trace_id: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Queue along with the Target ids it owns, the unit a broker record
/// serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueReference {
    pub queue_id: Uuid,
    pub message_id: Uuid,
    pub target_ids: Vec<Uuid>,
}
