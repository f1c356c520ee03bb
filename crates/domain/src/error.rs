//! Business rule rejections.

use common::{BookId, CartItemId, OrderId};
use serde::Serialize;
use thiserror::Error;

use crate::order::OrderStatus;

/// One line that cannot be satisfied from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortfall {
    pub book_id: BookId,
    pub title: String,
    pub requested: u32,
    pub available: u32,
}

impl std::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\": only {} available", self.title, self.available)
    }
}

/// Reasons a cart or order operation is refused.
///
/// These are expected outcomes the caller can act on, as opposed to storage
/// failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommerceError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    #[error("Cart item not found: {0}")]
    CartItemNotFound(CartItemId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order exists but is no longer in the status the operation requires.
    #[error("Order {order_id} not found or already processed (status: {status})")]
    AlreadyProcessed {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("Cart is empty")]
    EmptyCart,

    /// Carries every offending line, not just the first.
    #[error("Insufficient stock")]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl CommerceError {
    /// Short stable label, used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CommerceError::Validation(_) => "validation",
            CommerceError::BookNotFound(_)
            | CommerceError::CartItemNotFound(_)
            | CommerceError::OrderNotFound(_) => "not_found",
            CommerceError::AlreadyProcessed { .. } => "already_processed",
            CommerceError::EmptyCart => "empty_cart",
            CommerceError::InsufficientStock(_) => "insufficient_stock",
            CommerceError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// The offending lines of an `InsufficientStock` rejection.
    pub fn shortfalls(&self) -> &[StockShortfall] {
        match self {
            CommerceError::InsufficientStock(lines) => lines,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_display_names_title_and_available() {
        let shortfall = StockShortfall {
            book_id: BookId::new(),
            title: "Dune".to_string(),
            requested: 3,
            available: 1,
        };
        assert_eq!(shortfall.to_string(), "\"Dune\": only 1 available");
    }

    #[test]
    fn shortfalls_only_for_insufficient_stock() {
        assert!(CommerceError::EmptyCart.shortfalls().is_empty());
        let err = CommerceError::InsufficientStock(vec![StockShortfall {
            book_id: BookId::new(),
            title: "Dune".to_string(),
            requested: 2,
            available: 0,
        }]);
        assert_eq!(err.shortfalls().len(), 1);
        assert_eq!(err.kind(), "insufficient_stock");
    }
}
