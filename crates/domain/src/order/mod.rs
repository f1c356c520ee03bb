//! Orders, the checkout rules that create them and the status machine that
//! moves them.

mod checkout;
mod payment;
mod state;
mod transition;

pub use checkout::{
    CheckoutForm, CheckoutPlan, ContactDetails, LockedCartLine, OrderDraft, ShippingInfo,
    is_valid_email, plan_checkout,
};
pub use payment::{PaymentMethod, VerificationAction};
pub use state::OrderStatus;
pub use transition::{
    TransitionOrigin, TransitionPlan, TransitionRequest, Transitioned, plan_transition,
};

use chrono::{DateTime, Utc};
use common::{BookId, Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

/// One immutable line of a placed order. The unit price is the catalog price
/// at the moment of checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A placed order.
///
/// Everything except `status` and `updated_at` is fixed at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Money,
    pub contact: ContactDetails,
    pub payment_method: PaymentMethod,
    pub payment_screenshot: Option<String>,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new order from a validated draft and a checkout plan.
    pub fn place(user_id: UserId, draft: OrderDraft, plan: CheckoutPlan, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            status: draft.initial_status(),
            total: plan.total,
            contact: draft.contact,
            payment_method: draft.payment_method,
            payment_screenshot: draft.payment_screenshot,
            lines: plan.lines,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of line totals at their snapshotted prices.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    /// Quantity of `book_id` this order holds.
    pub fn quantity_of(&self, book_id: BookId) -> u32 {
        self.lines
            .iter()
            .filter(|line| line.book_id == book_id)
            .map(|line| line.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(method: PaymentMethod) -> OrderDraft {
        OrderDraft {
            contact: ContactDetails {
                full_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone_number: "1".to_string(),
                shipping_address: "Street".to_string(),
                billing_address: "Street".to_string(),
                city: "London".to_string(),
                zip_code: String::new(),
            },
            payment_method: method,
            payment_screenshot: None,
        }
    }

    #[test]
    fn placed_order_total_matches_lines() {
        let book = BookId::new();
        let plan = CheckoutPlan {
            lines: vec![OrderLine {
                book_id: book,
                title: "Dune".to_string(),
                quantity: 2,
                unit_price: Money::from_dollars(10),
            }],
            total: Money::from_dollars(20),
        };
        let order = Order::place(UserId::new(), draft(PaymentMethod::Cash), plan, Utc::now());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, order.lines_total());
        assert_eq!(order.quantity_of(book), 2);
        assert_eq!(order.quantity_of(BookId::new()), 0);
        assert_eq!(order.created_at, order.updated_at);
    }
}
