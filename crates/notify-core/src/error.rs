//! Unified error type for the notification pipeline using thiserror.

use thiserror::Error;

/// The unified error type for notify-* operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {field} - {message}")]
    Value { field: String, message: String },

    #[error("invalid key: {field} - {message}")]
    Key { field: String, message: String },

    #[error("duplicate {entity_type}: {field}")]
    Duplicate { entity_type: String, field: String },

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("broker error: {message}")]
    Broker {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("cipher error: {message}")]
    Cipher { message: String },

    #[error("cannot cancel message {message_id}: already enqueued")]
    AlreadyEnqueued { message_id: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("shutdown in progress")]
    ShutdownInProgress,

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Value {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn key(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Key {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Error::Database {
            message: message.into(),
            source: None,
        }
    }

    pub fn database_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn broker(message: impl Into<String>) -> Self {
        Error::Broker {
            message: message.into(),
            source: None,
        }
    }

    pub fn broker_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Broker {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn cipher(message: impl Into<String>) -> Self {
        Error::Cipher {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the operation that produced this error might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database { .. } | Error::Broker { .. })
    }

    /// Stable machine-readable reason code, used in RPC error detail metadata.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Value { .. } => "VALUE_ERROR",
            Error::Key { .. } => "KEY_ERROR",
            Error::Duplicate { .. } => "DUPLICATE",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Database { .. } => "DATABASE_ERROR",
            Error::Broker { .. } => "BROKER_ERROR",
            Error::Provider { .. } => "PROVIDER_ERROR",
            Error::Cipher { .. } => "CIPHER_ERROR",
            Error::AlreadyEnqueued { .. } => "ALREADY_ENQUEUED",
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::ShutdownInProgress => "SHUTDOWN",
            Error::Internal { .. } => "INTERNAL_ERROR",
            Error::Other(_) => "UNKNOWN_ERROR",
        }
    }
}

/// Result type alias for notify-* operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(Error::database("conn reset").is_retryable());
        assert!(Error::broker("timeout").is_retryable());
        assert!(!Error::not_found("Message", "abc").is_retryable());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(Error::value("receiver", "bad format").error_code(), "VALUE_ERROR");
        assert_eq!(
            Error::AlreadyEnqueued {
                message_id: "x".into()
            }
            .error_code(),
            "ALREADY_ENQUEUED"
        );
    }
}
