//! # notify-database
//!
//! Postgres persistence for the Message / Queue / Target / Event tables:
//! row types, connection pool construction, and the repository facade the
//! lifecycle services (Publisher, Worker, Dispatcher) drive.

pub mod models;
pub mod pool;
pub mod repository;

pub use models::{Channel, Driver, EventRow, MessageRow, MessageStatus, QueueReference, QueueRow, QueueStatus, TargetRow, TargetStatus};
pub use pool::connect;
pub use repository::{
    CreatedAtWindow, ListTargetsParams, NewEvent, NewQueue, NewTarget, Repository, SortField, TargetOutcome, TargetWithMessage,
};
