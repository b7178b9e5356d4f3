//! HTTP handlers.
//!
//! `structure` serves the organizational-structure resource; `root` and `health`
//! describe the service itself.

pub mod structure;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::api::STRUCTURE_PATH;
use crate::AppState;

/// GET / - service description
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Organizational Structure API",
        "version": version,
        "backend": state.service.store().backend(),
        "endpoints": {
            "tree": format!("GET {}", STRUCTURE_PATH),
            "element": format!("GET|PUT|DELETE {}/:id", STRUCTURE_PATH),
            "create": format!("POST {}", STRUCTURE_PATH),
            "health": "GET /health",
        }
    }))
}

/// GET /health - 503 while the store is unreachable
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let store = state.service.store();

    match store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "backend": store.backend(),
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "backend": store.backend(),
                    "error": e.to_string(),
                })),
            )
        }
    }
}
