//! HTTP API for the bookstore checkout service.
//!
//! Exposes the cart, checkout, order history and back-office routes over
//! axum, with bearer-token identities, structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{CartService, NotificationDispatcher, OrderWorkflow};

use auth::IdentityProvider;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CommerceStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    max_body_bytes: usize,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::list::<S>)
                .post(routes::cart::add::<S>)
                .delete(routes::cart::clear::<S>),
        )
        .route(
            "/cart/{id}",
            put(routes::cart::update::<S>).delete(routes::cart::remove::<S>),
        )
        .route("/checkout", post(routes::orders::checkout::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route(
            "/orders/shipping-info",
            get(routes::orders::shipping_info::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/pending-verification",
            get(routes::admin::pending_verification::<S>),
        )
        .route(
            "/verify-payment/{id}",
            put(routes::admin::verify_payment::<S>),
        )
        .route(
            "/admin/update-status/{id}",
            put(routes::admin::update_status::<S>),
        )
        .route("/admin/orders", get(routes::admin::all_orders::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the cart and order services over one store.
pub fn create_state<S: CommerceStore + Clone + 'static>(
    store: S,
    identity: Arc<dyn IdentityProvider>,
    notifications: NotificationDispatcher,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        cart: CartService::new(store.clone()),
        orders: OrderWorkflow::new(store, notifications),
        identity,
    })
}
