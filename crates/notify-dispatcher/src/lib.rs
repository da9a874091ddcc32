//! # notify-dispatcher
//!
//! The one-shot scheduled-dispatch job (§4.3): selected at startup by
//! `job_name`, exits 0 once its scan completes regardless of individual
//! enqueue failures.

pub mod job;

pub use job::{run_named_job, DispatchScheduledMessagesJob, Job};
