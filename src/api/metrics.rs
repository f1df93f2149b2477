//! Prometheus metrics endpoint
//!
//! Login, store and error counters in Prometheus text format.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::auth::require_login;
use crate::metrics::REGISTRY;

/// Metrics endpoint handler
///
/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// Create metrics router
///
/// Exposes the `/metrics` endpoint to logged-in users.
pub fn metrics_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(state, require_login))
}
