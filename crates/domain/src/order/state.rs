//! Order status machine.

use serde::{Deserialize, Serialize};

use crate::error::CommerceError;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending              ──► Paid | Cancelled
/// PendingVerification  ──► Paid | PaymentRejected | Cancelled
/// PaymentRejected      ──► PendingVerification | Cancelled
/// Paid                 ──► Processing | Shipped | Cancelled
/// Processing           ──► Shipped | Cancelled
/// Shipped              ──► Delivered
/// ```
///
/// `Paid` is the only status that commits stock, and it can only be entered
/// from the two unpaid statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Cash order awaiting confirmation.
    #[default]
    Pending,

    /// Screenshot order awaiting manual payment review.
    PendingVerification,

    /// Payment confirmed; stock has been decremented.
    Paid,

    /// Screenshot payment was reviewed and refused.
    PaymentRejected,

    /// Order is being prepared.
    Processing,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::PendingVerification,
        OrderStatus::Paid,
        OrderStatus::PaymentRejected,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Statuses that may follow this one.
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Paid, Cancelled],
            PendingVerification => &[Paid, PaymentRejected, Cancelled],
            Paid => &[Processing, Shipped, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            PaymentRejected => &[PendingVerification, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    /// Returns true if `target` is a legal next status.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Returns true if an order in this status holds its quantities against
    /// on-hand stock without having decremented it yet.
    pub fn reserves_stock(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PendingVerification)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Returns the status name as stored and exchanged on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PendingVerification => "pending_verification",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentRejected => "payment_rejected",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
                CommerceError::Validation(format!(
                    "Invalid status. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}
