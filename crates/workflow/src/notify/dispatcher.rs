use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::{Notification, Notifier};

/// Handle for queueing notifications onto the background delivery task.
///
/// Cloning is cheap; all clones feed the same queue. The task stops once
/// every handle has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Starts the delivery task with a queue of `capacity` messages.
    pub fn spawn<N: Notifier>(notifier: N, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                match notifier.deliver(&notification).await {
                    Ok(()) => {
                        metrics::counter!("notifications_sent_total").increment(1);
                        tracing::debug!(
                            order_id = %notification.order_id,
                            recipient = %notification.recipient,
                            "notification delivered"
                        );
                    }
                    Err(e) => {
                        metrics::counter!("notifications_failed_total").increment(1);
                        tracing::warn!(
                            order_id = %notification.order_id,
                            error = %e,
                            "notification delivery failed"
                        );
                    }
                }
            }
            tracing::debug!("notification queue closed");
        });

        (Self { tx }, handle)
    }

    /// Queues a notification without waiting. A full or closed queue drops it.
    pub fn dispatch(&self, notification: Notification) {
        let (notification, reason) = match self.tx.try_send(notification) {
            Ok(()) => return,
            Err(TrySendError::Full(n)) => (n, "queue full"),
            Err(TrySendError::Closed(n)) => (n, "queue closed"),
        };
        metrics::counter!("notifications_dropped_total").increment(1);
        tracing::warn!(
            order_id = %notification.order_id,
            reason,
            "notification dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationKind, RecordingNotifier};
    use common::{Money, OrderId};

    fn notification() -> Notification {
        Notification {
            order_id: OrderId::new(),
            recipient: "ada@example.com".to_string(),
            total: Money::from_dollars(20),
            kind: NotificationKind::PaymentApproved,
        }
    }

    #[tokio::test]
    async fn delivers_in_queue_order() {
        let notifier = RecordingNotifier::new();
        let (dispatcher, handle) = NotificationDispatcher::spawn(notifier.clone(), 8);

        let (first, second) = (notification(), notification());
        dispatcher.dispatch(first.clone());
        dispatcher.dispatch(second.clone());
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(notifier.delivered().await, vec![first, second]);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_task() {
        let notifier = RecordingNotifier::new();
        notifier.set_fail(true);
        let (dispatcher, handle) = NotificationDispatcher::spawn(notifier.clone(), 8);

        dispatcher.dispatch(notification());
        dispatcher.dispatch(notification());
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(notifier.attempts(), 2);
        assert!(notifier.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_is_dropped() {
        let (dispatcher, handle) = NotificationDispatcher::spawn(RecordingNotifier::new(), 1);
        handle.abort();
        let _ = handle.await;

        dispatcher.dispatch(notification());
    }
}
