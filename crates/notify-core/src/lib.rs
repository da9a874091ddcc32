//! # notify-core
//!
//! Shared primitives for the notification pipeline: the unified error type,
//! configuration loading, time-sortable identifiers, and the symmetric
//! cipher used to protect receiver addresses at rest.

pub mod cipher;
pub mod config;
pub mod error;
pub mod id;

pub use cipher::{receiver_hash, AesGcmCipher};
pub use config::{load_config, AppConfig};
pub use error::{Error, Result};
