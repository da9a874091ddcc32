//! # notify-publisher
//!
//! The Publisher (§4.1), the enqueue pipeline it drives (§4.2),
//! cancellation (§4.5), and the paged listing read (§4.6). Request
//! validation (§6) lives alongside as the shared input-shaping layer all
//! three entry points use.

pub mod cancellation;
pub mod enqueue;
pub mod listing;
pub mod publisher;
pub mod validation;

pub use cancellation::cancel_scheduled_by_message_id;
pub use listing::{list_status_with_paging, ListedPage, ListedTarget};
pub use publisher::Publisher;
pub use validation::{
    CancelScheduledByMessageIdRequest, ListStatusWithPagingRequest, PageRequest, SendMailRequest, SendSmsRequest, SortOrder,
};
