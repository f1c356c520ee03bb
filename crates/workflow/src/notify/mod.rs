//! Order lifecycle notifications.
//!
//! The workflow builds a [`Notification`] for each lifecycle event and hands it
//! to a [`NotificationDispatcher`]. The dispatcher queues it for a background
//! task that calls the configured [`Notifier`].

mod dispatcher;
mod log;
mod message;
mod recording;

use async_trait::async_trait;
use thiserror::Error;

pub use dispatcher::NotificationDispatcher;
pub use log::LogNotifier;
pub use message::{Notification, NotificationKind};
pub use recording::RecordingNotifier;

/// A delivery attempt that did not go through.
#[derive(Debug, Clone, Error)]
#[error("Failed to notify {recipient}: {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub reason: String,
}

/// Delivers notifications to customers.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}
