//! Per-Queue reconciliation (§4.4 steps 2-7): load, transition to
//! `SENDING`, invoke the channel-appropriate provider adapter, and fold
//! the result back into Queue/Target/Message status plus appended
//! Events.
//!
//! Grounded on `examples/original_source/internal/consumer/consumer.go`
//! for the step order and on `internal/jobs/runner.go` for the
//! "reconcile even a partially-loaded row" discipline (§9 open question
//! 2: a `mark_sending` failure still reconciles, with a `None` provider
//! response that marshals to JSON `null` rather than being unwrapped).

use std::sync::Arc;

use chrono::Duration;
use notify_core::cipher::AesGcmCipher;
use notify_core::error::Result;
use notify_core::id;
use notify_database::{CreatedAtWindow, MessageRow, NewEvent, QueueReference, QueueRow, Repository, TargetOutcome, TargetRow, TargetStatus};
use notify_providers::{
    BatchStatus, MailMessage, MailProvider, MailReceiver, MailRequest, RecipientResult, SmsBatchRequest, SmsProvider, SmsReceiver,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

/// Slack bracketing the Queue id's embedded timestamp when loading it;
/// wide enough to tolerate broker redelivery lag, narrow enough to keep
/// the lookup an index range scan rather than a table scan.
const LOAD_SLACK: Duration = Duration::hours(1);

/// Outcome of loading the Queue a broker record refers to. `Stale` means
/// the id doesn't resolve within the lookup window — there is nothing to
/// reconcile, so the record is simply acknowledged.
enum Loaded {
    Found { queue: QueueRow, message: MessageRow, targets: Vec<TargetRow>, window: CreatedAtWindow },
    Stale,
}

async fn load(repository: &Repository, queue_id: Uuid) -> Result<Loaded> {
    let window = id::created_at_window(queue_id, LOAD_SLACK);
    let Some(queue) = repository.load_queue(queue_id, window).await? else {
        warn!(%queue_id, "queue not found within lookup window, nothing to reconcile");
        return Ok(Loaded::Stale);
    };
    let Some(message) = repository.load_message(queue.message_id, window).await? else {
        warn!(%queue_id, message_id = %queue.message_id, "queue references a missing message");
        return Ok(Loaded::Stale);
    };
    let targets = repository.load_targets_for_queue(queue_id).await?;
    Ok(Loaded::Found { queue, message, targets, window })
}

/// A receiver that decrypted successfully, paired with the Target row it
/// came from.
struct Decrypted {
    target: TargetRow,
    receiver: String,
}

/// Decrypt every Target's receiver. A per-target decryption failure is
/// logged and the Target excluded from the provider batch (§4.4 step 4);
/// it is still reconciled, just always as `Failed`.
fn decrypt_targets(cipher: &AesGcmCipher, targets: Vec<TargetRow>) -> (Vec<Decrypted>, Vec<TargetRow>) {
    let mut ok = Vec::with_capacity(targets.len());
    let mut skipped = Vec::new();
    for target in targets {
        match cipher.decrypt(&target.encrypted_receiver) {
            Ok(receiver) => ok.push(Decrypted { target, receiver }),
            Err(e) => {
                warn!(target_id = %target.id, error = %e, "failed to decrypt receiver, excluding from provider batch");
                skipped.push(target);
            }
        }
    }
    (ok, skipped)
}

/// Events and a `None` provider-response marker for Targets that never
/// reached the provider: decryption failures plus, when `mark_sending`
/// itself failed, every Target in the Queue.
fn skipped_outcomes(skipped: &[TargetRow], reason: &str) -> (Vec<TargetOutcome>, Vec<NewEvent>) {
    let mut outcomes = Vec::with_capacity(skipped.len());
    let mut events = Vec::with_capacity(skipped.len());
    for target in skipped {
        outcomes.push(TargetOutcome { target_id: target.id, status: TargetStatus::Failed, provider_trace_id: None });
        events.push(NewEvent {
            provider: target.provider.clone(),
            status: "failed".to_string(),
            provider_trace_id: None,
            data: json!({ "error": reason }),
        });
    }
    (outcomes, events)
}

async fn reconcile_mark_sending_failure(
    repository: &Repository,
    queue: &QueueRow,
    message: &MessageRow,
    targets: &[TargetRow],
    window: CreatedAtWindow,
) -> Result<()> {
    // §9 open question 2: the provider was never invoked, so the Event
    // payload is JSON null rather than a real provider response.
    let events: Vec<NewEvent> = targets
        .iter()
        .map(|t| NewEvent { provider: t.provider.clone(), status: "failed".to_string(), provider_trace_id: None, data: serde_json::Value::Null })
        .collect();
    repository.reconcile_failure(queue.id, message.id, &events, window).await
}

/// Process one SMS Queue reference end-to-end.
pub async fn process_sms_queue(
    repository: &Repository,
    cipher: &AesGcmCipher,
    provider: &dyn SmsProvider,
    reference: QueueReference,
) -> Result<()> {
    let Loaded::Found { queue, message, targets, window } = load(repository, reference.queue_id).await? else {
        return Ok(());
    };

    if repository.mark_sending(queue.id, window).await.is_err() {
        warn!(queue_id = %queue.id, "mark_sending failed, reconciling as failure with no provider response");
        return reconcile_mark_sending_failure(repository, &queue, &message, &targets, window).await;
    }

    let (decrypted, skipped) = decrypt_targets(cipher, targets);
    let (mut outcomes, mut events) = skipped_outcomes(&skipped, "receiver decryption failed");

    if decrypted.is_empty() {
        warn!(queue_id = %queue.id, "no decryptable targets, reconciling as failure");
        return repository.reconcile_failure(queue.id, message.id, &events, window).await;
    }

    let request = SmsBatchRequest {
        message_id: message.id.to_string(),
        message: message.body.clone(),
        receivers: decrypted
            .iter()
            .map(|d| SmsReceiver { target_id: d.target.id.to_string(), receiver: d.receiver.clone() })
            .collect(),
    };

    let response = provider.send_batch_sms(request).await;
    info!(queue_id = %queue.id, status = response.status.as_str(), "sms provider batch completed");

    for result in &response.results {
        let Ok(target_id) = result.trace_id.parse::<Uuid>() else { continue };
        let Some(decrypted) = decrypted.iter().find(|d| d.target.id == target_id) else { continue };
        let (outcome, event) = recipient_outcome(decrypted.target.id, &decrypted.target.provider, result);
        outcomes.push(outcome);
        events.push(event);
    }

    if response.status.is_sent() {
        repository.reconcile_success(queue.id, message.id, &outcomes, &events, window).await
    } else {
        repository.reconcile_failure(queue.id, message.id, &events, window).await
    }
}

fn recipient_outcome(target_id: Uuid, provider_name: &str, result: &RecipientResult) -> (TargetOutcome, NewEvent) {
    let provider_trace_id = result
        .data
        .get("provider_trace_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let status = if result.status.is_sent() { TargetStatus::Sent } else { TargetStatus::Failed };
    let outcome = TargetOutcome { target_id, status, provider_trace_id: provider_trace_id.clone() };
    let event = NewEvent {
        provider: provider_name.to_string(),
        status: result.status.as_str().to_string(),
        provider_trace_id,
        data: result.data.clone(),
    };
    (outcome, event)
}

/// Process one mail Queue reference end-to-end. Mail providers report a
/// single batch-level outcome (§4.7), so the same status/trace id is
/// applied to every successfully decrypted Target.
pub async fn process_mail_queue(
    repository: &Repository,
    cipher: &AesGcmCipher,
    provider: &dyn MailProvider,
    reference: QueueReference,
) -> Result<()> {
    let Loaded::Found { queue, message, targets, window } = load(repository, reference.queue_id).await? else {
        return Ok(());
    };

    if repository.mark_sending(queue.id, window).await.is_err() {
        warn!(queue_id = %queue.id, "mark_sending failed, reconciling as failure with no provider response");
        return reconcile_mark_sending_failure(repository, &queue, &message, &targets, window).await;
    }

    let (decrypted, skipped) = decrypt_targets(cipher, targets);
    let (mut outcomes, mut events) = skipped_outcomes(&skipped, "receiver decryption failed");

    if decrypted.is_empty() {
        warn!(queue_id = %queue.id, "no decryptable targets, reconciling as failure");
        return repository.reconcile_failure(queue.id, message.id, &events, window).await;
    }

    let request = MailRequest {
        receivers: decrypted.iter().map(|d| MailReceiver { email: d.receiver.clone() }).collect(),
        message: MailMessage {
            sender_name: message.sender_name.clone().unwrap_or_else(|| "Notify".to_string()),
            sender_address: message.sender_address.clone().unwrap_or_else(|| "notify@notify.com".to_string()),
            subject: message.subject.clone().unwrap_or_default(),
            body: message.body.clone(),
        },
    };

    let response = provider.send_email(request).await;
    info!(queue_id = %queue.id, status = response.status.as_str(), "mail provider batch completed");

    let target_status = if response.status.is_sent() { TargetStatus::Sent } else { TargetStatus::Failed };
    for decrypted in &decrypted {
        outcomes.push(TargetOutcome {
            target_id: decrypted.target.id,
            status: target_status,
            provider_trace_id: Some(response.trace_id.clone()),
        });
        events.push(NewEvent {
            provider: decrypted.target.provider.clone(),
            status: response.status.as_str().to_string(),
            provider_trace_id: Some(response.trace_id.clone()),
            data: response.raw_response.clone(),
        });
    }

    if response.status.is_sent() {
        repository.reconcile_success(queue.id, message.id, &outcomes, &events, window).await
    } else {
        repository.reconcile_failure(queue.id, message.id, &events, window).await
    }
}

/// Used only by tests to assert the exact `BatchStatus` gate (§9 open
/// question 3): the worker compares against the literal token, never a
/// loose truthiness check.
pub fn is_sent(status: BatchStatus) -> bool {
    status.is_sent()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_gate_is_exact() {
        assert!(is_sent(BatchStatus::Sent));
        assert!(!is_sent(BatchStatus::Failed));
    }
}
