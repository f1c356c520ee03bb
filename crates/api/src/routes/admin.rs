//! Back-office endpoints. Non-admin callers are refused before their input is validated.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::{Identity, OrderId};
use domain::{OrderStatus, VerificationAction};
use serde::{Deserialize, Serialize};
use store::CommerceStore;
use workflow::WorkflowError;

use super::{AppState, Data, OrderView, Success, order_views, parse_id, success};
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub action: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    #[serde(default = "default_notify")]
    pub notify_user: bool,
}

fn default_notify() -> bool {
    true
}

fn require_admin(identity: &Identity) -> Result<(), ApiError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden.into())
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub message: &'static str,
    pub data: OrderView,
}

#[derive(Serialize)]
pub struct StatusUpdateResponse {
    pub message: &'static str,
    pub previous_status: OrderStatus,
    pub notified: bool,
    pub data: OrderView,
}

/// GET /pending-verification
#[tracing::instrument(skip(state))]
pub async fn pending_verification<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Success<Data<Vec<OrderView>>>>, ApiError> {
    let orders = state.orders.pending_verification(&identity).await?;
    Ok(success(Data {
        data: order_views(orders),
    }))
}

/// PUT /verify-payment/{id}
#[tracing::instrument(skip(state, body))]
pub async fn verify_payment<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    body: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<Success<OrderResponse>>, ApiError> {
    require_admin(&identity)?;
    let order_id: OrderId = parse_id(&id, "order")?;
    let Json(req) = body?;
    let action: VerificationAction = req.action.as_deref().unwrap_or_default().parse()?;
    let notes = req.admin_notes.filter(|n| !n.trim().is_empty());

    let order = state
        .orders
        .verify_payment(&identity, order_id, action, notes)
        .await?;

    let message = match action {
        VerificationAction::Approve => "Payment verified and order approved",
        VerificationAction::Reject => "Payment verification rejected",
    };
    Ok(success(OrderResponse {
        message,
        data: order.into(),
    }))
}

/// PUT /admin/update-status/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update_status<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Success<StatusUpdateResponse>>, ApiError> {
    require_admin(&identity)?;
    let order_id: OrderId = parse_id(&id, "order")?;
    let Json(req) = body?;
    let status: OrderStatus = req.status.as_deref().unwrap_or_default().parse()?;

    let update = state
        .orders
        .update_status(&identity, order_id, status, req.notify_user)
        .await?;

    Ok(success(StatusUpdateResponse {
        message: "Order status updated successfully",
        previous_status: update.previous,
        notified: update.notified,
        data: update.order.into(),
    }))
}

/// GET /admin/orders
#[tracing::instrument(skip(state))]
pub async fn all_orders<S: CommerceStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Success<Data<Vec<OrderView>>>>, ApiError> {
    let orders = state.orders.all_orders(&identity).await?;
    Ok(success(Data {
        data: order_views(orders),
    }))
}
