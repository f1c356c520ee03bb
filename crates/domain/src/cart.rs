//! Cart entries and quantity rules.

use chrono::{DateTime, Utc};
use common::{BookId, CartItemId, Money, UserId};
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;

/// A cart quantity: at least 1, and small enough to store as a SQL `INTEGER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const MAX: u32 = i32::MAX as u32;

    pub fn new(value: i64) -> Result<Self, CommerceError> {
        if value <= 0 {
            return Err(CommerceError::Validation(
                "Quantity must be greater than 0".to_string(),
            ));
        }
        u32::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Self)
            .ok_or_else(|| CommerceError::Validation(format!("Quantity {value} is too large")))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// One stored cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with the live catalog entry.
///
/// Price and stock are read at list time, so they may be stale by the time the
/// cart is checked out; checkout re-validates under lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub cart_item_id: CartItemId,
    pub book_id: BookId,
    pub title: String,
    pub cover_url: Option<String>,
    pub unit_price: Money,
    pub stock: u32,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Whether an add created a new row or grew an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    Added,
    Updated,
}

/// Result of adding a book to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUpsert {
    pub item: CartItem,
    pub title: String,
    pub action: CartAction,
}

impl CartUpsert {
    pub fn message(&self, added: Quantity) -> String {
        match self.action {
            CartAction::Added => format!("\"{}\" added to cart", self.title),
            CartAction::Updated => format!(
                "Added {} more to \"{}\" in cart",
                added.get(),
                self.title
            ),
        }
    }
}

/// Total quantity an add would leave in the cart.
pub fn requested_total(existing: Option<u32>, added: Quantity) -> u32 {
    existing.unwrap_or(0).saturating_add(added.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert_eq!(Quantity::new(4).unwrap().get(), 4);
    }

    #[test]
    fn quantity_fits_sql_integer() {
        assert!(Quantity::new(i64::from(i32::MAX)).is_ok());
        assert!(Quantity::new(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn requested_total_adds_existing() {
        let two = Quantity::new(2).unwrap();
        assert_eq!(requested_total(None, two), 2);
        assert_eq!(requested_total(Some(3), two), 5);
    }

    #[test]
    fn line_total_multiplies_live_price() {
        let line = CartLine {
            cart_item_id: CartItemId::new(),
            book_id: BookId::new(),
            title: "Dune".to_string(),
            cover_url: None,
            unit_price: Money::from_cents(1250),
            stock: 4,
            quantity: 3,
        };
        assert_eq!(line.line_total().cents(), 3750);
    }
}
