//! HTTP router construction.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;
use crate::{api, live};

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/ws", get(live::ws_upgrade))
        .route("/api/v1", get(api::index))
        .route("/api/v1/", get(api::index))
        .route(
            "/api/v1/messages",
            get(api::messages_list).post(api::messages_create),
        )
        .route(
            "/api/v1/messages/{id}",
            get(api::messages_get)
                .put(api::messages_update)
                .delete(api::messages_delete),
        )
        .route("/api/v1/scheduler", get(api::scheduler_status))
        .fallback(not_found)
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 - Not Found")
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-requested-with")])
        .max_age(std::time::Duration::from_secs(86400));

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}
