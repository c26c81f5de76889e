//! Router configuration module
//!
//! Wraps the registrar's router with the built-in routes and middleware layers.

use std::{sync::Arc, time::Duration};

use axum::{http::StatusCode, routing::get, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::bootstrap::Application;
use crate::error::BootstrapError;
use crate::handlers::{health, ready};

/// Build the servable router for a bootstrapped application
pub fn build_router(app: &Application) -> Result<Router, BootstrapError> {
    let settings = app.settings();

    let builtin = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(app.db().clone());

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(settings.body_limit_bytes());

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(settings.timeout_secs),
    );

    let router = app
        .api()
        .router()
        .merge(builtin)
        .layer(app.cors().clone())
        .layer(body_limit)
        .layer(timeout);

    // Rate limiting needs the peer address, so only serve it with connect info
    if settings.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(settings.rate_limit_per_sec)
            .burst_size(settings.rate_limit_burst)
            .finish()
            .ok_or_else(|| {
                BootstrapError::Config(
                    "rate limit per second and burst must both be non-zero".to_string(),
                )
            })?;

        tracing::info!(
            "Rate limiting: {} req/s (burst: {})",
            settings.rate_limit_per_sec,
            settings.rate_limit_burst
        );

        Ok(router
            .layer(GovernorLayer::new(Arc::new(governor_conf)))
            .layer(TraceLayer::new_for_http()))
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        Ok(router.layer(TraceLayer::new_for_http()))
    }
}
