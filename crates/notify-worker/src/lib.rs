//! # notify-worker
//!
//! The broker-side consumer (§4.4): pulls Queue references off the two
//! topics, transitions them through `SENDING`, invokes the
//! channel-appropriate provider adapter, and reconciles the outcome into
//! Queue/Target/Message status plus appended Events.

pub mod consumer;
pub mod reconcile;

pub use consumer::{MailQueueHandler, SmsQueueHandler, Worker};
