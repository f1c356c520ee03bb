use async_trait::async_trait;

use super::{Notification, Notifier, NotifyError};

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notification.recipient,
            subject = %notification.subject(),
            "sending notification"
        );
        tracing::debug!(body = %notification.body(), "notification body");
        Ok(())
    }
}
