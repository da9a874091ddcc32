//! Cancellation (§4.5): reject a cancel request once a Message has left
//! the {PENDING, SCHEDULED} states, otherwise soft-delete it and every
//! Queue/Target still eligible for cancellation.

use chrono::Duration;
use notify_core::error::{Error, Result};
use notify_core::id;
use notify_database::{MessageStatus, Repository};
use uuid::Uuid;

/// Window (§4.5 step 1) symmetrically bracketing the id's embedded
/// timestamp, bounding every lookup and update to a narrow index scan.
const LOOKUP_SLACK: Duration = Duration::hours(1);

pub async fn cancel_scheduled_by_message_id(repository: &Repository, message_id: Uuid) -> Result<()> {
    let window = id::created_at_window(message_id, LOOKUP_SLACK);

    let message = repository
        .find_message_in_window(message_id, window)
        .await?
        .ok_or_else(|| Error::not_found("Message", message_id.to_string()))?;

    if !matches!(message.status, MessageStatus::Pending | MessageStatus::Scheduled) {
        return Err(Error::AlreadyEnqueued { message_id: message_id.to_string() });
    }

    repository.cancel_message(message_id, window).await
}
