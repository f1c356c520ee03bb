//! Inventory ledger rules.
//!
//! Stock is an on-hand counter per book. It only ever goes down, and only when
//! an order is paid. Unpaid open orders hold their quantities as reservations
//! so checkout can refuse lines that are already spoken for.

use std::collections::BTreeMap;

use common::{BookId, Money};
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, StockShortfall};

/// A catalog item as seen by the cart and checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub price: Money,
    pub stock: u32,
    pub cover_url: Option<String>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: BookId::new(),
            title: title.into(),
            author: author.into(),
            price,
            stock,
            cover_url: None,
        }
    }

    /// Refuses a cart quantity the on-hand stock cannot cover.
    pub fn ensure_stock_for(&self, requested: u32) -> Result<(), CommerceError> {
        if requested > self.stock {
            return Err(CommerceError::InsufficientStock(vec![StockShortfall {
                book_id: self.id,
                title: self.title.clone(),
                requested,
                available: self.stock,
            }]));
        }
        Ok(())
    }
}

/// One order line about to be paid, with the on-hand stock read under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecrementLine {
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    pub on_hand: u32,
}

/// New on-hand level for one book after a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdate {
    pub book_id: BookId,
    pub new_stock: u32,
}

/// Computes the stock levels after paying for `lines`.
///
/// Lines for the same book are summed. Fails with every short line rather
/// than letting any counter go below zero.
pub fn plan_decrements(lines: &[DecrementLine]) -> Result<Vec<StockUpdate>, CommerceError> {
    let mut per_book: BTreeMap<BookId, (u32, u32, &str)> = BTreeMap::new();
    for line in lines {
        let entry = per_book
            .entry(line.book_id)
            .or_insert((0, line.on_hand, line.title.as_str()));
        entry.0 = entry.0.saturating_add(line.quantity);
    }

    let mut shortfalls = Vec::new();
    let mut updates = Vec::with_capacity(per_book.len());
    for (book_id, (quantity, on_hand, title)) in per_book {
        match on_hand.checked_sub(quantity) {
            Some(new_stock) => updates.push(StockUpdate { book_id, new_stock }),
            None => shortfalls.push(StockShortfall {
                book_id,
                title: title.to_string(),
                requested: quantity,
                available: on_hand,
            }),
        }
    }

    if shortfalls.is_empty() {
        Ok(updates)
    } else {
        Err(CommerceError::InsufficientStock(shortfalls))
    }
}
