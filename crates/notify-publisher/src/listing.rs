//! Listing (§4.6): a paged read of Targets joined to their owning
//! Message, with the receiver decrypted in the response-assembly step.
//! Decryption errors abort the whole response rather than returning a
//! partially-decrypted page.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use notify_core::cipher::{receiver_hash, AesGcmCipher};
use notify_core::error::Result;
use notify_database::{Channel, ListTargetsParams, Repository, SortField, TargetWithMessage};
use uuid::Uuid;

use crate::validation::{ListStatusWithPagingRequest, SortOrder};

pub struct ListedTarget {
    pub id: Uuid,
    pub message_id: Uuid,
    pub message_type: Channel,
    pub message_content: String,
    pub receiver: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ListedPage {
    pub targets: Vec<ListedTarget>,
    pub total: i64,
}

pub async fn list_status_with_paging(
    repository: &Repository,
    cipher: &Arc<AesGcmCipher>,
    request: &ListStatusWithPagingRequest,
) -> Result<ListedPage> {
    request.validate_request()?;

    let channel: Channel = request.message_type.parse()?;
    let message_id = request
        .message_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Uuid>())
        .transpose()
        .map_err(|e| notify_core::error::Error::value("message_id", e.to_string()))?;
    let receiver_hash = request
        .receiver
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(receiver_hash);

    let sort_field = match &request.page.sort_field {
        Some(field) if !field.is_empty() => field.parse::<SortField>()?,
        _ => SortField::CreatedAt,
    };
    let sort_descending = match &request.page.sort_order {
        Some(order) if !order.is_empty() => order.parse::<SortOrder>()?.is_descending(),
        _ => false,
    };

    let params = ListTargetsParams {
        channel,
        message_id,
        receiver_hash,
        start_at: request.start_at,
        end_at: request.end_at,
        page_index: request.page.index,
        page_size: request.page.size,
        sort_field,
        sort_descending,
    };

    let (rows, total) = repository.list_targets(&params).await?;

    let mut targets = Vec::with_capacity(rows.len());
    for row in rows {
        targets.push(decrypt_row(cipher, row)?);
    }

    Ok(ListedPage { targets, total })
}

fn decrypt_row(cipher: &Arc<AesGcmCipher>, row: TargetWithMessage) -> Result<ListedTarget> {
    let receiver = cipher.decrypt(&row.encrypted_receiver)?;
    Ok(ListedTarget {
        id: row.id,
        message_id: row.message_id,
        message_type: row.message_channel,
        message_content: row.message_body,
        receiver,
        status: format!("{:?}", row.status).to_lowercase(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
