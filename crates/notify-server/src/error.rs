//! The single conversion point from `notify_core::Error` into
//! `tonic::Status` (§6 "Errors surfaced to RPC", §7). Domain and
//! persistence code never constructs a `tonic::Status` directly; this
//! mirrors the teacher's `rustpress-server/src/error.rs` rule that
//! `ApiError`/`HttpError` construction lives only at the transport edge.

use notify_core::error::Error as CoreError;
use tonic::{Code, Status};

pub fn to_status(error: CoreError) -> Status {
    let code = match &error {
        CoreError::Value { .. } | CoreError::Key { .. } => Code::InvalidArgument,
        CoreError::Duplicate { .. } => Code::AlreadyExists,
        CoreError::NotFound { .. } => Code::NotFound,
        CoreError::AlreadyEnqueued { .. } => Code::FailedPrecondition,
        _ => Code::Internal,
    };
    let reason = error.error_code();
    let mut status = Status::new(code, error.to_string());
    if let Ok(value) = reason.parse() {
        status.metadata_mut().insert("reason", value);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_maps_to_invalid_argument() {
        let status = to_status(CoreError::value("receiver", "bad format"));
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.metadata().get("reason").unwrap().to_str().unwrap(), "VALUE_ERROR");
    }

    #[test]
    fn not_found_maps_correctly() {
        let status = to_status(CoreError::not_found("Message", "abc"));
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn already_enqueued_maps_to_failed_precondition() {
        let status = to_status(CoreError::AlreadyEnqueued { message_id: "abc".to_string() });
        assert_eq!(status.code(), Code::FailedPrecondition);
    }

    #[test]
    fn database_error_maps_to_internal() {
        let status = to_status(CoreError::database("conn reset"));
        assert_eq!(status.code(), Code::Internal);
    }
}
