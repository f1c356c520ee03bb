//! The order workflow: checkout, payment verification and status updates.

use std::time::Instant;

use common::{Identity, OrderId};
use domain::{
    CheckoutForm, CommerceError, Order, OrderStatus, ShippingInfo, TransitionRequest,
    VerificationAction,
};
use store::{CommerceStore, CommerceStoreExt};

use crate::notify::{Notification, NotificationDispatcher};
use crate::{Result, WorkflowError};

/// Outcome of a back-office status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order: Order,
    pub previous: OrderStatus,
    /// Whether a status-change notification was queued.
    pub notified: bool,
}

/// Drives orders from checkout to delivery.
///
/// Every mutation is a single store call, so it commits or rolls back as a
/// whole. Notifications are queued after the commit and never affect the
/// result.
pub struct OrderWorkflow<S: CommerceStore> {
    store: S,
    notifications: NotificationDispatcher,
}

fn require_admin(identity: &Identity) -> Result<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden)
    }
}

impl<S: CommerceStore> OrderWorkflow<S> {
    pub fn new(store: S, notifications: NotificationDispatcher) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Turns the caller's cart into an order.
    ///
    /// Validates the form first, then lets the store lock the cart and stock,
    /// snapshot prices and drain the cart in one transaction.
    #[tracing::instrument(skip(self, form), fields(user_id = %identity.user_id))]
    pub async fn checkout(&self, identity: &Identity, form: CheckoutForm) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let result = self.place(identity, form).await;
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!(
                    "orders_created_total",
                    "payment_method" => order.payment_method.as_str()
                )
                .increment(1);
                tracing::info!(
                    order_id = %order.id,
                    status = %order.status,
                    total = %order.total,
                    "order placed"
                );
                self.notifications.dispatch(Notification::order_placed(order));
            }
            Err(e) => {
                metrics::counter!("checkout_rejected_total", "reason" => e.kind()).increment(1);
                tracing::info!(reason = e.kind(), error = %e, "checkout rejected");
            }
        }
        result
    }

    async fn place(&self, identity: &Identity, form: CheckoutForm) -> Result<Order> {
        let draft = form.validate()?;
        Ok(self.store.place_order(identity.user_id, draft).await?)
    }

    /// Orders awaiting screenshot review, newest first.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn pending_verification(&self, identity: &Identity) -> Result<Vec<Order>> {
        require_admin(identity)?;
        Ok(self
            .store
            .orders_with_status(OrderStatus::PendingVerification)
            .await?)
    }

    /// Approves or rejects a screenshot payment.
    ///
    /// Approval moves the order to `paid` and takes its quantities out of
    /// stock; rejection moves it to `payment_rejected` and touches no stock.
    /// Orders not in `pending_verification` fail with `AlreadyProcessed`.
    #[tracing::instrument(skip(self, admin_notes), fields(user_id = %identity.user_id))]
    pub async fn verify_payment(
        &self,
        identity: &Identity,
        order_id: OrderId,
        action: VerificationAction,
        admin_notes: Option<String>,
    ) -> Result<Order> {
        require_admin(identity)?;

        let transitioned = self
            .store
            .transition_order(order_id, TransitionRequest::verify(action))
            .await?;
        let order = transitioned.order;

        metrics::counter!("order_transitions_total", "to" => order.status.as_str()).increment(1);
        tracing::info!(
            %order_id,
            from = %transitioned.previous,
            to = %order.status,
            notes = admin_notes.as_deref().unwrap_or(""),
            "payment verified"
        );

        self.notifications
            .dispatch(Notification::payment_verified(&order, action, admin_notes));
        Ok(order)
    }

    /// Moves an order along the status table.
    ///
    /// Reaching `paid` takes the order's quantities out of stock and empties
    /// the owner's cart. Setting the current status again changes nothing and
    /// sends nothing.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn update_status(
        &self,
        identity: &Identity,
        order_id: OrderId,
        status: OrderStatus,
        notify_user: bool,
    ) -> Result<StatusUpdate> {
        require_admin(identity)?;

        let transitioned = self
            .store
            .transition_order(order_id, TransitionRequest::admin(status))
            .await?;

        let changed = transitioned.changed();
        if changed {
            metrics::counter!("order_transitions_total", "to" => status.as_str()).increment(1);
            tracing::info!(
                %order_id,
                from = %transitioned.previous,
                to = %status,
                "order status updated"
            );
        }

        let notified = changed && notify_user;
        if notified {
            self.notifications.dispatch(Notification::status_changed(
                &transitioned.order,
                transitioned.previous,
            ));
        }

        Ok(StatusUpdate {
            order: transitioned.order,
            previous: transitioned.previous,
            notified,
        })
    }

    /// The caller's orders, newest first.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn orders_for(&self, identity: &Identity) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_user(identity.user_id).await?)
    }

    /// One of the caller's orders. Other users' orders are reported as missing.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn order_for(&self, identity: &Identity, order_id: OrderId) -> Result<Order> {
        self.store
            .order_for_user(identity.user_id, order_id)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id).into())
    }

    /// Every order, newest first.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn all_orders(&self, identity: &Identity) -> Result<Vec<Order>> {
        require_admin(identity)?;
        Ok(self.store.all_orders().await?)
    }

    /// Contact details from the caller's most recent order, for auto-fill.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn shipping_info(&self, identity: &Identity) -> Result<Option<ShippingInfo>> {
        Ok(self.store.latest_shipping_info(identity.user_id).await?)
    }
}
