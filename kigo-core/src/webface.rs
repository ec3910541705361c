//! The tiny administrative HTTP surface.
//!
//! One readiness route, `GET /api/ping`, answering 200 when the database is
//! reachable and 503 with a JSON error body otherwise. Workers mount it on
//! their admin listener; the standalone webface binary serves it on its own
//! port.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::timeout::TimeoutLayer;

use crate::store::Store;

/// Default bind address for the standalone webface. Workers bind their admin
/// listener on port 32600 instead.
pub const DEFAULT_WEBFACE_ADDRESS: &str = "0.0.0.0:32601";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Mount the admin API routes onto a router.
pub fn add_routes(router: Router, store: Store) -> Router {
    router
        .route("/api/ping", get(ping).with_state(store))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

async fn ping(State(store): State<Store>) -> Response {
    match store.ping().await {
        Ok(()) => (StatusCode::OK, "{}\n").into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": error.to_string() })),
        )
            .into_response(),
    }
}
