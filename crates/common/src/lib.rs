//! Shared types for the bookstore checkout service.
//!
//! Everything here is plain data: strongly typed identifiers, integer-cent
//! money and the request-scoped identity handed to every core operation.

mod ids;
mod identity;
mod money;

pub use identity::{Identity, Role};
pub use ids::{BookId, CartItemId, OrderId, UserId};
pub use money::Money;
