//! # notify-providers
//!
//! Provider adapter contracts (§4.7) and the two reference adapters the
//! pipeline ships: `mitake` for SMS and `sendgrid` for mail. Adapters
//! translate a provider's wire response into one common shape; they never
//! touch persistent state — that's the Worker's job (`notify-worker`).
//!
//! Grounded on `examples/original_source/internal/smser/base.go` and
//! `internal/mailer/base.go` for the contract shape, reimplemented as Rust
//! traits the way `rustpress-storage::StorageBackend` defines a
//! backend-swappable trait object.

pub mod mitake;
pub mod sendgrid;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The literal token the Worker gates success reconciliation on (§9, open
/// question 3). Adapters must canonicalize to exactly these two strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Sent,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Sent => "sent",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, BatchStatus::Sent)
    }
}

/// The synthetic row id a provider's batch-level-only status is filed
/// under, per §4.7: "including a DEFAULT synthetic row when the provider
/// returns a batch-level status only".
pub const DEFAULT_TRACE_ID: &str = "DEFAULT";

/// One recipient's outcome, common across SMS and mail adapters. `data`
/// is copied verbatim into the Event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientResult {
    pub trace_id: String,
    pub status: BatchStatus,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SmsReceiver {
    pub target_id: String,
    pub receiver: String,
}

#[derive(Debug, Clone)]
pub struct SmsBatchRequest {
    pub message_id: String,
    pub message: String,
    pub receivers: Vec<SmsReceiver>,
}

#[derive(Debug, Clone)]
pub struct SmsBatchResponse {
    pub status: BatchStatus,
    pub message_id: String,
    pub results: Vec<RecipientResult>,
}

/// Batch SMS send. Implementations MUST NOT mutate persistent state.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_batch_sms(&self, request: SmsBatchRequest) -> SmsBatchResponse;
}

#[derive(Debug, Clone)]
pub struct MailReceiver {
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub sender_name: String,
    pub sender_address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct MailRequest {
    pub receivers: Vec<MailReceiver>,
    pub message: MailMessage,
}

/// Mail providers report one batch-level outcome rather than a
/// per-recipient breakdown (§4.7); the Worker applies `status`/`trace_id`
/// to every Target in the Queue.
#[derive(Debug, Clone)]
pub struct MailResponse {
    pub status: BatchStatus,
    pub trace_id: String,
    pub raw_response: serde_json::Value,
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_email(&self, request: MailRequest) -> MailResponse;
}

/// Construct the SMS adapter named by `config.providers.sms_provider`.
/// Shared by `notify-worker` (which invokes it) and `notify-server`
/// (which wires it into the Publisher's target provider assignment),
/// the way `rustpress-storage`'s `Storage` backend is selected once at
/// startup by config and handed around as a trait object.
pub fn build_sms_provider(config: &notify_core::config::ProvidersConfig) -> notify_core::error::Result<std::sync::Arc<dyn SmsProvider>> {
    match config.sms_provider.as_str() {
        "mitake" => Ok(std::sync::Arc::new(mitake::MitakeProvider::new(
            config.mitake_username.clone(),
            config.mitake_password.clone(),
        ))),
        other => Err(notify_core::error::Error::Configuration { message: format!("unknown sms_provider '{other}'") }),
    }
}

/// Construct the mail adapter named by `config.providers.mail_provider`.
pub fn build_mail_provider(config: &notify_core::config::ProvidersConfig) -> notify_core::error::Result<std::sync::Arc<dyn MailProvider>> {
    match config.mail_provider.as_str() {
        "sendgrid" => Ok(std::sync::Arc::new(sendgrid::SendGridProvider::new(config.sendgrid_token.clone()))),
        other => Err(notify_core::error::Error::Configuration { message: format!("unknown mail_provider '{other}'") }),
    }
}
