//! HTTP handlers, shared state and response shapes.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use chrono::{DateTime, Utc};
use common::{BookId, Money, OrderId, UserId};
use domain::{ContactDetails, Order, OrderLine, OrderStatus, PaymentMethod};
use serde::Serialize;
use store::CommerceStore;
use workflow::{CartService, OrderWorkflow};

use crate::auth::IdentityProvider;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CommerceStore> {
    pub cart: CartService<S>,
    pub orders: OrderWorkflow<S>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// `{"success": true, ...body}`
#[derive(Serialize)]
pub struct Success<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

pub fn success<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        body,
    })
}

#[derive(Serialize)]
pub struct Data<T: Serialize> {
    pub data: T,
}

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}

/// Money as a two-decimal string, e.g. `"20.00"`.
pub(crate) fn price(money: Money) -> String {
    money.to_decimal_string()
}

#[derive(Serialize)]
pub struct OrderItemView {
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    pub price: String,
}

#[derive(Serialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_screenshot: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl From<&OrderLine> for OrderItemView {
    fn from(line: &OrderLine) -> Self {
        Self {
            book_id: line.book_id,
            title: line.title.clone(),
            quantity: line.quantity,
            price: price(line.unit_price),
        }
    }
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            status: order.status,
            total_price: price(order.total),
            items: order.lines.iter().map(OrderItemView::from).collect(),
            contact: order.contact,
            payment_method: order.payment_method,
            payment_screenshot: order.payment_screenshot,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

pub(crate) fn order_views(orders: Vec<Order>) -> Vec<OrderView> {
    orders.into_iter().map(OrderView::from).collect()
}
