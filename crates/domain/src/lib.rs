//! Domain layer for the bookstore checkout service.
//!
//! This crate holds the business rules only, with no I/O:
//! - cart quantities and the live cart view
//! - the inventory ledger (on-hand stock, reservations, decrements)
//! - checkout validation and cart-to-order planning
//! - the order status machine and the side effects of each transition
//!
//! Stores call into these rules while they hold their locks, so every backend
//! enforces the same invariants.

pub mod cart;
pub mod error;
pub mod inventory;
pub mod order;

pub use cart::{CartAction, CartItem, CartLine, CartUpsert, Quantity, requested_total};
pub use error::{CommerceError, StockShortfall};
pub use inventory::{Book, DecrementLine, StockUpdate, plan_decrements};
pub use order::{
    CheckoutForm, CheckoutPlan, ContactDetails, LockedCartLine, Order, OrderDraft, OrderLine,
    OrderStatus, PaymentMethod, ShippingInfo, TransitionOrigin, TransitionPlan, TransitionRequest,
    Transitioned, VerificationAction, is_valid_email, plan_checkout, plan_transition,
};
