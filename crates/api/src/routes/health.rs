//! Liveness probe.

use axum::Json;
use serde::Serialize;

use super::{Success, success};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn check() -> Json<Success<HealthResponse>> {
    success(HealthResponse { status: "ok" })
}
