//! Cart and order workflow for the bookstore.
//!
//! [`CartService`] and [`OrderWorkflow`] sit between the HTTP layer and a
//! [`store::CommerceStore`]. They check who is calling, record metrics, and
//! hand lifecycle events to the [`NotificationDispatcher`], which delivers
//! them on a background task. Delivery failures never reach the caller.

pub mod cart;
pub mod error;
pub mod notify;
pub mod orders;

pub use cart::CartService;
pub use error::{Result, WorkflowError};
pub use notify::{
    LogNotifier, Notification, NotificationDispatcher, NotificationKind, Notifier, NotifyError,
    RecordingNotifier,
};
pub use orders::{OrderWorkflow, StatusUpdate};
