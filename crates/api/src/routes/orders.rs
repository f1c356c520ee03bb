//! Customer order endpoints: checkout and order history.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{CheckoutForm, OrderStatus, PaymentMethod, ShippingInfo};
use serde::Serialize;
use store::CommerceStore;

use super::{AppState, Data, OrderView, Success, order_views, parse_id, price, success};
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub order_id: OrderId,
    pub total_price: String,
    pub status: OrderStatus,
}

fn checkout_message(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Screenshot => {
            "Order submitted for verification. We will review your payment screenshot."
        }
        PaymentMethod::Cash => "Order created successfully",
    }
}

/// POST /checkout
#[tracing::instrument(skip(state, body))]
pub async fn checkout<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    body: Result<Json<CheckoutForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Success<CheckoutResponse>>), ApiError> {
    let Json(form) = body?;
    let order = state.orders.checkout(&identity, form).await?;

    Ok((
        StatusCode::CREATED,
        success(CheckoutResponse {
            message: checkout_message(order.payment_method),
            order_id: order.id,
            total_price: price(order.total),
            status: order.status,
        }),
    ))
}

/// GET /orders
#[tracing::instrument(skip(state))]
pub async fn list<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Success<Data<Vec<OrderView>>>>, ApiError> {
    let orders = state.orders.orders_for(&identity).await?;
    Ok(success(Data {
        data: order_views(orders),
    }))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<Success<Data<OrderView>>>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let order = state.orders.order_for(&identity, order_id).await?;
    Ok(success(Data { data: order.into() }))
}

/// GET /orders/shipping-info
///
/// `data` is `null` for a customer who has never checked out.
#[tracing::instrument(skip(state))]
pub async fn shipping_info<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Success<Data<Option<ShippingInfo>>>>, ApiError> {
    let info = state.orders.shipping_info(&identity).await?;
    Ok(success(Data { data: info }))
}
