//! Request validation (§6 "Validation rules"), built on the `validator`
//! crate the way `rustpress-server`'s `ValidatedJson` extractor expects a
//! `Validate` impl on every inbound body.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError};

use notify_core::error::{Error, Result};

static SMS_RECEIVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^09[0-9]{8}$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

fn validate_sms_receivers(receivers: &[String]) -> std::result::Result<(), ValidationError> {
    if receivers.is_empty() || receivers.len() > 1000 {
        return Err(ValidationError::new("receivers_length"));
    }
    if receivers.iter().any(|r| !SMS_RECEIVER_RE.is_match(r)) {
        return Err(ValidationError::new("receivers_format"));
    }
    Ok(())
}

fn validate_mail_receivers(receivers: &[String]) -> std::result::Result<(), ValidationError> {
    if receivers.is_empty() || receivers.len() > 1000 {
        return Err(ValidationError::new("receivers_length"));
    }
    if receivers.iter().any(|r| !EMAIL_RE.is_match(r)) {
        return Err(ValidationError::new("receivers_format"));
    }
    Ok(())
}

#[derive(Debug, Clone, Validate)]
pub struct SendSmsRequest {
    #[validate(length(min = 1, message = "body must not be empty"))]
    pub body: String,
    #[validate(custom = "validate_sms_receivers")]
    pub receivers: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Validate)]
pub struct SendMailRequest {
    pub sender_name: String,
    pub sender_address: String,
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject: String,
    #[validate(length(min = 1, message = "body must not be empty"))]
    pub body: String,
    #[validate(custom = "validate_mail_receivers")]
    pub receivers: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Validate)]
pub struct CancelScheduledByMessageIdRequest {
    #[validate(length(min = 1, message = "message_id must not be empty"))]
    pub message_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn is_descending(&self) -> bool {
        matches!(self, SortOrder::Desc)
    }
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::value("sort_order", format!("must be asc or desc, got {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub index: u32,
    pub size: u32,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListStatusWithPagingRequest {
    pub message_type: String,
    pub message_id: Option<String>,
    pub receiver: Option<String>,
    pub page: PageRequest,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl ListStatusWithPagingRequest {
    /// Hand-rolled in place of a derive: `validator` has no built-in
    /// "exactly one of these two fields" rule, and the allowed values for
    /// `message_type`/page bounds are simple enough to check directly.
    pub fn validate_request(&self) -> Result<()> {
        if self.message_type != "sms" && self.message_type != "mail" {
            return Err(Error::value("message_type", "must be sms or mail"));
        }
        let has_message_id = self.message_id.as_deref().is_some_and(|s| !s.is_empty());
        let has_receiver = self.receiver.as_deref().is_some_and(|s| !s.is_empty());
        if has_message_id && has_receiver {
            return Err(Error::value(
                "message_id/receiver",
                "at most one of message_id or receiver may be set",
            ));
        }
        if self.page.index < 1 {
            return Err(Error::value("page.index", "must be >= 1"));
        }
        if self.page.size < 1 {
            return Err(Error::value("page.size", "must be >= 1"));
        }
        if let Some(order) = &self.page.sort_order {
            order.parse::<SortOrder>()?;
        }
        Ok(())
    }
}

/// Run a `validator::Validate` impl and fold its field errors into one
/// `Error::Value`, the shape the gRPC boundary maps to `InvalidArgument`.
pub fn validate_request<T: Validate>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|e| Error::value("request", e.to_string()))
}

/// Shared by every send path (§4.1, §4.3): `scheduled_at` must be strictly
/// in the future and within `horizon_days`.
pub fn check_scheduled_at(scheduled_at: Option<DateTime<Utc>>, horizon_days: i64) -> Result<()> {
    let Some(scheduled_at) = scheduled_at else {
        return Ok(());
    };
    let now = Utc::now();
    if scheduled_at <= now {
        return Err(Error::value("scheduled_at", "must be in the future"));
    }
    let horizon = now + chrono::Duration::days(horizon_days);
    if scheduled_at > horizon {
        return Err(Error::value(
            "scheduled_at",
            format!("must be within the next {horizon_days} days"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_sms_request_passes() {
        let req = SendSmsRequest {
            body: "hi".to_string(),
            receivers: vec!["0911222333".to_string()],
            scheduled_at: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn malformed_sms_receiver_fails() {
        let req = SendSmsRequest {
            body: "hi".to_string(),
            receivers: vec!["invalid".to_string()],
            scheduled_at: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn malformed_email_fails() {
        let req = SendMailRequest {
            sender_name: "Notify".to_string(),
            sender_address: "notify@notify.com".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
            receivers: vec!["not-an-email".to_string()],
            scheduled_at: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn scheduled_at_must_be_future() {
        assert!(check_scheduled_at(Some(Utc::now() - chrono::Duration::minutes(1)), 30).is_err());
        assert!(check_scheduled_at(Some(Utc::now() + chrono::Duration::minutes(10)), 30).is_ok());
    }

    #[test]
    fn scheduled_at_beyond_horizon_fails() {
        let scheduled = Utc::now() + chrono::Duration::days(31);
        assert!(check_scheduled_at(Some(scheduled), 30).is_err());
    }

    #[test]
    fn list_allows_neither_filter_but_rejects_both() {
        let base = ListStatusWithPagingRequest {
            message_type: "sms".to_string(),
            message_id: None,
            receiver: None,
            page: PageRequest { index: 1, size: 10, sort_field: None, sort_order: None },
            start_at: Utc::now() - chrono::Duration::days(1),
            end_at: Utc::now(),
        };
        assert!(base.validate_request().is_ok());

        let mut with_id = base.clone();
        with_id.message_id = Some("abc".to_string());
        assert!(with_id.validate_request().is_ok());

        let mut with_both = with_id.clone();
        with_both.receiver = Some("a@b.com".to_string());
        assert!(with_both.validate_request().is_err());
    }
}
