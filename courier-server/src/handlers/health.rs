//! Health check handlers
//!
//! Liveness and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::Database;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    pub service: &'static str,
}

/// GET /health - Liveness check
///
/// Does not touch the database.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is alive", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "courier-server",
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Readiness check
///
/// Ready once the database answers a trivial query.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = ReadyResponse),
        (status = 503, description = "Database unreachable", body = ReadyResponse)
    )
)]
pub async fn ready(State(db): State<Database>) -> (StatusCode, Json<ReadyResponse>) {
    match db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    message: Some("database unavailable"),
                }),
            )
        }
    }
}
