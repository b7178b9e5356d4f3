pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod params;
pub mod services;
pub mod tree;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::API_PREFIX;
use crate::services::TreeService;
use crate::tree::{MemoryTreeStore, TreeStore};

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: TreeService,
}

impl AppState {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self {
            service: TreeService::new(store),
        }
    }

    /// Fresh in-process structure holding only the root
    pub fn memory(root_name: &str) -> Self {
        Self::new(Arc::new(MemoryTreeStore::new(root_name)))
    }
}

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest(API_PREFIX, structure_routes())
        .with_state(state)
        .layer(CorsLayer::permissive());

    if config::config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn structure_routes() -> Router<AppState> {
    use handlers::structure;

    Router::new()
        .route(
            "/organizational-structure",
            get(structure::tree_get).post(structure::element_post),
        )
        .route(
            "/organizational-structure/:id",
            get(structure::element_get)
                .put(structure::element_put)
                .delete(structure::element_delete),
        )
}

/// Serves `app` on an already bound listener until the process stops
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn routes_are_nested_under_the_version_prefix() {
        let app = app(AppState::memory("Company"));

        let (status, body) = call(app.clone(), Method::GET, "/API/v1.0.0/organizational-structure").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"][0]["name"], "Company");
        assert_eq!(body["responseType"], "Success");

        let (status, body) = call(app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn errors_use_the_envelope() {
        let app = app(AppState::memory("Company"));

        let (status, body) = call(app.clone(), Method::GET, "/API/v1.0.0/organizational-structure/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["responseType"], "Error");

        let (_, body) = call(
            app.clone(),
            Method::DELETE,
            "/API/v1.0.0/organizational-structure/1?dbg=false",
        )
        .await;
        assert!(body.get("debugInfo").is_none());

        let (status, body) = call(
            app,
            Method::DELETE,
            "/API/v1.0.0/organizational-structure/1?dbg=true",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], 403);
        assert!(body["debugInfo"].as_str().unwrap().contains("RootProtected"));
    }
}
