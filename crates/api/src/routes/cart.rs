//! Cart endpoints. Every route acts on the authenticated caller's cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::{BookId, CartItemId, Money};
use domain::{CartAction, CartItem, CartLine, Quantity};
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use super::{AppState, Message, Success, parse_id, price, success};
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub book_id: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: Option<i64>,
}

#[derive(Serialize)]
pub struct CartLineView {
    pub cart_item_id: CartItemId,
    pub book_id: BookId,
    pub title: String,
    pub price: String,
    pub cover_url: Option<String>,
    pub stock: u32,
    pub quantity: u32,
    pub item_total: String,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        Self {
            item_total: price(line.line_total()),
            price: price(line.unit_price),
            cart_item_id: line.cart_item_id,
            book_id: line.book_id,
            title: line.title,
            cover_url: line.cover_url,
            stock: line.stock,
            quantity: line.quantity,
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub data: Vec<CartLineView>,
    pub total: String,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub message: String,
    pub action: CartAction,
    pub data: CartItem,
}

#[derive(Serialize)]
pub struct UpdatedItemResponse {
    pub message: String,
    pub data: CartItem,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub message: String,
    pub removed: u64,
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn list<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Success<CartResponse>>, ApiError> {
    let lines = state.cart.list(&identity).await?;
    let total: Money = lines.iter().map(CartLine::line_total).sum();

    Ok(success(CartResponse {
        data: lines.into_iter().map(CartLineView::from).collect(),
        total: price(total),
    }))
}

/// POST /cart
#[tracing::instrument(skip(state, body))]
pub async fn add<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    body: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<Success<CartItemResponse>>, ApiError> {
    let Json(req) = body?;
    let raw_id = req
        .book_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Book ID is required".to_string()))?;
    let book_id: BookId = parse_id(raw_id.trim(), "book")?;
    let quantity = Quantity::new(req.quantity.unwrap_or(1))?;

    let upsert = state.cart.add(&identity, book_id, quantity).await?;
    Ok(success(CartItemResponse {
        message: upsert.message(quantity),
        action: upsert.action,
        data: upsert.item,
    }))
}

/// PUT /cart/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    body: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<Success<UpdatedItemResponse>>, ApiError> {
    let cart_item_id: CartItemId = parse_id(&id, "cart item")?;
    let Json(req) = body?;
    let quantity = req
        .quantity
        .and_then(|q| Quantity::new(q).ok())
        .ok_or_else(|| ApiError::BadRequest("Valid quantity required (minimum 1)".to_string()))?;

    let item = state
        .cart
        .update_quantity(&identity, cart_item_id, quantity)
        .await?;
    Ok(success(UpdatedItemResponse {
        message: "Cart updated".to_string(),
        data: item,
    }))
}

/// DELETE /cart/{id}
#[tracing::instrument(skip(state))]
pub async fn remove<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<Success<Message>>, ApiError> {
    let cart_item_id: CartItemId = parse_id(&id, "cart item")?;
    state.cart.remove(&identity, cart_item_id).await?;
    Ok(success(Message {
        message: "Item removed from cart".to_string(),
    }))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Success<ClearedResponse>>, ApiError> {
    let removed = state.cart.clear(&identity).await?;
    Ok(success(ClearedResponse {
        message: "Cart cleared".to_string(),
        removed,
    }))
}
