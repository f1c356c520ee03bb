use common::{Money, OrderId};
use domain::{Order, OrderStatus, VerificationAction};

/// What happened to the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    OrderPlaced { status: OrderStatus },
    PaymentApproved,
    PaymentRejected { notes: Option<String> },
    StatusChanged { from: OrderStatus, to: OrderStatus },
}

/// A message for the customer who placed an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub order_id: OrderId,
    /// The contact email captured at checkout.
    pub recipient: String,
    pub total: Money,
    pub kind: NotificationKind,
}

impl Notification {
    fn for_order(order: &Order, kind: NotificationKind) -> Self {
        Self {
            order_id: order.id,
            recipient: order.contact.email.clone(),
            total: order.total,
            kind,
        }
    }

    pub fn order_placed(order: &Order) -> Self {
        Self::for_order(
            order,
            NotificationKind::OrderPlaced {
                status: order.status,
            },
        )
    }

    pub fn payment_verified(
        order: &Order,
        action: VerificationAction,
        notes: Option<String>,
    ) -> Self {
        let kind = match action {
            VerificationAction::Approve => NotificationKind::PaymentApproved,
            VerificationAction::Reject => NotificationKind::PaymentRejected { notes },
        };
        Self::for_order(order, kind)
    }

    pub fn status_changed(order: &Order, from: OrderStatus) -> Self {
        Self::for_order(
            order,
            NotificationKind::StatusChanged {
                from,
                to: order.status,
            },
        )
    }

    pub fn subject(&self) -> String {
        let id = self.order_id;
        match &self.kind {
            NotificationKind::OrderPlaced { .. } => format!("Order #{id} Received"),
            NotificationKind::PaymentApproved => format!("Order #{id} Payment Verified"),
            NotificationKind::PaymentRejected { .. } => format!("Order #{id} Payment Rejected"),
            NotificationKind::StatusChanged { .. } => format!("Order #{id} Status Update"),
        }
    }

    pub fn body(&self) -> String {
        let details = format!(
            "Order ID: #{}\nTotal Amount: {}",
            self.order_id, self.total
        );
        match &self.kind {
            NotificationKind::OrderPlaced { status } => {
                let next = if *status == OrderStatus::PendingVerification {
                    "We will review your payment screenshot and let you know once it is verified."
                } else {
                    "Your order will be confirmed once payment is received."
                };
                format!("Thank you for your order.\n\n{details}\nStatus: {status}\n\n{next}")
            }
            NotificationKind::PaymentApproved => format!(
                "Great news! Your payment has been verified.\n\n{details}\nStatus: paid\n\n\
                 Your order is now being processed and will be shipped soon."
            ),
            NotificationKind::PaymentRejected { notes } => {
                let reason = notes
                    .as_deref()
                    .unwrap_or("The payment screenshot provided could not be verified.");
                format!(
                    "We could not verify your payment.\n\n{details}\nStatus: payment_rejected\n\n\
                     Reason: {reason}\n\nPlease contact support if you believe this is an error, \
                     or place a new order with correct payment details."
                )
            }
            NotificationKind::StatusChanged { to, .. } => format!(
                "Your order status has been updated.\n\n{details}\nNew Status: {to}\n\n\
                 Your order {}.",
                status_phrase(*to)
            ),
        }
    }
}

fn status_phrase(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Processing => "is now being processed",
        OrderStatus::Shipped => "has been shipped",
        OrderStatus::Delivered => "has been delivered",
        OrderStatus::Cancelled => "has been cancelled",
        _ => "status has been updated",
    }
}
